//! The message-transport seam.
//!
//! The actual client (Telegram or otherwise) lives outside this crate and is
//! reached through [`Transport`]. Error conditions the delivery pipeline must
//! distinguish are modeled as [`TransportError`] variants.

use std::time::Duration;

use {async_trait::async_trait, thiserror::Error};

use crate::types::{ChannelRef, UserId};

/// Distinguishable transport failure conditions.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("channel is private or inaccessible")]
    PrivateChannel,

    #[error("admin privileges required")]
    AdminRequired,

    #[error("request timed out")]
    Timeout,

    #[error("rate limited, wait {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("message not found")]
    NotFound,

    #[error("not supported by this transport")]
    Unsupported,

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Whether a fetched message carries an attachment.
///
/// Transports that cannot inspect content (the Bot API cannot read channel
/// history) report `Unknown`; the delivery pipeline then tries the full
/// stage chain rather than the text-only subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    None,
    Present,
    Unknown,
}

/// Handle to a source message, resolved by [`Transport::fetch_message`].
#[derive(Debug, Clone)]
pub struct MessageContent {
    pub channel: ChannelRef,
    pub id: i64,
    pub text: Option<String>,
    pub attachment: Attachment,
}

impl MessageContent {
    /// True unless the message is known to be text-only.
    #[must_use]
    pub fn may_have_attachment(&self) -> bool {
        !matches!(self.attachment, Attachment::None)
    }
}

/// Raw payload pulled for the clone stage.
#[derive(Debug, Clone)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub caption: Option<String>,
}

/// Message-transport client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Resolve a content handle for `channel`/`id`.
    async fn fetch_message(&self, channel: &ChannelRef, id: i64)
    -> TransportResult<MessageContent>;

    /// Optimized direct forward, preserving original formatting and
    /// attribution.
    async fn forward(&self, to: UserId, message: &MessageContent) -> TransportResult<()>;

    /// Forward using an explicit source peer + message ID; bypasses
    /// restrictions the direct form cannot.
    async fn forward_from_peer(
        &self,
        to: UserId,
        channel: &ChannelRef,
        message_id: i64,
    ) -> TransportResult<()>;

    /// Re-send the same content as a new message. Loses "forwarded"
    /// attribution and may strip restricted-forward flags.
    async fn copy_content(&self, to: UserId, message: &MessageContent) -> TransportResult<()>;

    /// Plain text message.
    async fn send_text(&self, to: UserId, text: &str) -> TransportResult<()>;

    /// Download the raw payload for a full clone. Expensive.
    async fn fetch_payload(&self, message: &MessageContent) -> TransportResult<Payload>;

    /// Re-upload a downloaded payload under the relay's own identity.
    async fn send_file(&self, to: UserId, payload: Payload) -> TransportResult<()>;

    /// Lightweight health probe; also used by the keep-alive task.
    async fn self_id(&self) -> TransportResult<UserId>;

    fn is_connected(&self) -> bool;
}

/// Opaque handle back to the originating conversation.
///
/// `reply` may itself be rate limited; callers honor the wait with the same
/// backoff discipline as delivery stages.
#[async_trait]
pub trait ReplyContext: Send + Sync {
    async fn reply(&self, text: &str) -> TransportResult<()>;
}

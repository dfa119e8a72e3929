//! Bot API implementation of the delivery transport.
//!
//! The Bot API cannot read channel history, so `fetch_message` resolves a
//! handle without a network round-trip and reports the attachment state as
//! unknown; the delivery pipeline then walks the full stage chain and lets
//! the forward and copy calls find out. Payload download is likewise not
//! available to bots, so the clone stage reports unsupported and the chain
//! falls through to the user-facing exhaustion message.

use {
    async_trait::async_trait,
    teloxide::{
        ApiError, Bot, RequestError,
        payloads::SendDocumentSetters,
        prelude::*,
        types::{ChatId, InputFile, MessageId, Recipient},
    },
};

use courier_core::{
    ChannelRef, UserId,
    transport::{
        Attachment, MessageContent, Payload, Transport, TransportError, TransportResult,
    },
};

/// Marked channel IDs (`t.me/c/<id>`) address supergroups and channels as
/// `-100<id>` on the wire.
const CHANNEL_ID_BASE: i64 = -1_000_000_000_000;

pub struct RelayTransport {
    bot: Bot,
}

impl RelayTransport {
    #[must_use]
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn source(channel: &ChannelRef) -> Recipient {
        match channel {
            ChannelRef::Public(name) => Recipient::ChannelUsername(format!("@{name}")),
            ChannelRef::Private(id) => Recipient::Id(ChatId(CHANNEL_ID_BASE - id)),
        }
    }

    fn recipient(user: UserId) -> Recipient {
        Recipient::Id(ChatId(user.0))
    }
}

#[async_trait]
impl Transport for RelayTransport {
    async fn fetch_message(
        &self,
        channel: &ChannelRef,
        id: i64,
    ) -> TransportResult<MessageContent> {
        Ok(MessageContent {
            channel: channel.clone(),
            id,
            text: None,
            attachment: Attachment::Unknown,
        })
    }

    async fn forward(&self, to: UserId, message: &MessageContent) -> TransportResult<()> {
        self.bot
            .forward_message(
                Self::recipient(to),
                Self::source(&message.channel),
                wire_message_id(message.id)?,
            )
            .await
            .map_err(map_error)?;
        Ok(())
    }

    async fn forward_from_peer(
        &self,
        to: UserId,
        channel: &ChannelRef,
        message_id: i64,
    ) -> TransportResult<()> {
        self.bot
            .forward_message(
                Self::recipient(to),
                Self::source(channel),
                wire_message_id(message_id)?,
            )
            .await
            .map_err(map_error)?;
        Ok(())
    }

    async fn copy_content(&self, to: UserId, message: &MessageContent) -> TransportResult<()> {
        self.bot
            .copy_message(
                Self::recipient(to),
                Self::source(&message.channel),
                wire_message_id(message.id)?,
            )
            .await
            .map_err(map_error)?;
        Ok(())
    }

    async fn send_text(&self, to: UserId, text: &str) -> TransportResult<()> {
        self.bot
            .send_message(Self::recipient(to), text)
            .await
            .map_err(map_error)?;
        Ok(())
    }

    async fn fetch_payload(&self, _message: &MessageContent) -> TransportResult<Payload> {
        // Bots cannot download arbitrary channel media.
        Err(TransportError::Unsupported)
    }

    async fn send_file(&self, to: UserId, payload: Payload) -> TransportResult<()> {
        let document = InputFile::memory(payload.bytes).file_name(payload.file_name);
        let request = self.bot.send_document(Self::recipient(to), document);
        match payload.caption {
            Some(caption) => request.caption(caption).await,
            None => request.await,
        }
        .map_err(map_error)?;
        Ok(())
    }

    async fn self_id(&self) -> TransportResult<UserId> {
        let me = self.bot.get_me().await.map_err(map_error)?;
        Ok(UserId(i64::try_from(me.id.0).unwrap_or_default()))
    }

    fn is_connected(&self) -> bool {
        // Bot API is stateless HTTP; there is no persistent session to lose.
        true
    }
}

/// Message IDs are 32-bit on the wire; anything wider cannot name an
/// existing message.
fn wire_message_id(id: i64) -> TransportResult<MessageId> {
    i32::try_from(id)
        .map(MessageId)
        .map_err(|_| TransportError::NotFound)
}

/// Map teloxide errors onto the conditions the delivery pipeline
/// distinguishes.
pub(crate) fn map_error(error: RequestError) -> TransportError {
    match error {
        RequestError::RetryAfter(secs) => TransportError::RateLimited {
            retry_after: secs.duration(),
        },
        RequestError::Api(ApiError::MessageToForwardNotFound | ApiError::MessageIdInvalid) => {
            TransportError::NotFound
        },
        RequestError::Api(ApiError::ChatNotFound) => TransportError::PrivateChannel,
        RequestError::Api(ApiError::NotEnoughRightsToPostMessages) => {
            TransportError::AdminRequired
        },
        RequestError::Network(e) if e.is_timeout() => TransportError::Timeout,
        other => TransportError::other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_channels_address_by_username() {
        let recipient = RelayTransport::source(&ChannelRef::Public("somechannel".into()));
        assert_eq!(
            recipient,
            Recipient::ChannelUsername("@somechannel".into())
        );
    }

    #[test]
    fn private_channels_address_by_marked_id() {
        let recipient = RelayTransport::source(&ChannelRef::Private(1234567890));
        assert_eq!(recipient, Recipient::Id(ChatId(-1_001_234_567_890)));
    }

    #[test]
    fn oversized_message_ids_are_not_found() {
        assert!(wire_message_id(42).is_ok());
        assert!(matches!(
            wire_message_id(i64::from(i32::MAX) + 1),
            Err(TransportError::NotFound)
        ));
    }

    #[test]
    fn api_errors_map_to_pipeline_conditions() {
        assert!(matches!(
            map_error(RequestError::Api(ApiError::ChatNotFound)),
            TransportError::PrivateChannel
        ));
        assert!(matches!(
            map_error(RequestError::Api(ApiError::MessageIdInvalid)),
            TransportError::NotFound
        ));
        assert!(matches!(
            map_error(RequestError::Api(ApiError::NotEnoughRightsToPostMessages)),
            TransportError::AdminRequired
        ));
    }
}

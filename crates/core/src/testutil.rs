//! Shared mocks for queue, worker, delivery and service tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    transport::{
        Attachment, MessageContent, Payload, ReplyContext, Transport, TransportError,
        TransportResult,
    },
    types::{ChannelRef, UserId},
};

/// Scriptable in-memory transport. Records every call; each stage can be
/// configured to fail with a specific error.
pub(crate) struct MockTransport {
    pub calls: Mutex<Vec<String>>,
    pub text: Option<String>,
    pub attachment: Attachment,
    pub fetch_error: Option<TransportError>,
    pub direct_error: Option<TransportError>,
    pub from_peer_error: Option<TransportError>,
    pub copy_error: Option<TransportError>,
    pub payload_error: Option<TransportError>,
    pub send_text_error: Option<TransportError>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            text: Some("hello".into()),
            attachment: Attachment::None,
            fetch_error: None,
            direct_error: None,
            from_peer_error: None,
            copy_error: None,
            payload_error: None,
            send_text_error: None,
        }
    }
}

impl MockTransport {
    pub fn record(&self, call: impl Into<String>) {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn outcome(error: &Option<TransportError>) -> TransportResult<()> {
        match error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch_message(
        &self,
        channel: &ChannelRef,
        id: i64,
    ) -> TransportResult<MessageContent> {
        self.record(format!("fetch {channel}/{id}"));
        if let Some(e) = &self.fetch_error {
            return Err(e.clone());
        }
        Ok(MessageContent {
            channel: channel.clone(),
            id,
            text: self.text.clone(),
            attachment: self.attachment,
        })
    }

    async fn forward(&self, _to: UserId, message: &MessageContent) -> TransportResult<()> {
        self.record(format!("forward {}/{}", message.channel, message.id));
        Self::outcome(&self.direct_error)
    }

    async fn forward_from_peer(
        &self,
        _to: UserId,
        channel: &ChannelRef,
        message_id: i64,
    ) -> TransportResult<()> {
        self.record(format!("forward_from_peer {channel}/{message_id}"));
        Self::outcome(&self.from_peer_error)
    }

    async fn copy_content(&self, _to: UserId, message: &MessageContent) -> TransportResult<()> {
        self.record(format!("copy {}/{}", message.channel, message.id));
        Self::outcome(&self.copy_error)
    }

    async fn send_text(&self, _to: UserId, text: &str) -> TransportResult<()> {
        self.record(format!("send_text {text}"));
        Self::outcome(&self.send_text_error)
    }

    async fn fetch_payload(&self, message: &MessageContent) -> TransportResult<Payload> {
        self.record(format!("fetch_payload {}/{}", message.channel, message.id));
        if let Some(e) = &self.payload_error {
            return Err(e.clone());
        }
        Ok(Payload {
            bytes: vec![0xCA, 0xFE],
            file_name: "payload.bin".into(),
            caption: message.text.clone(),
        })
    }

    async fn send_file(&self, _to: UserId, payload: Payload) -> TransportResult<()> {
        self.record(format!("send_file {}", payload.file_name));
        Ok(())
    }

    async fn self_id(&self) -> TransportResult<UserId> {
        self.record("self_id".to_string());
        Ok(UserId(0))
    }

    fn is_connected(&self) -> bool {
        true
    }
}

/// Reply context that captures everything sent back to the user.
#[derive(Default)]
pub(crate) struct CapturingReply {
    pub messages: Mutex<Vec<String>>,
    pub rate_limit_once: Mutex<Option<std::time::Duration>>,
}

impl CapturingReply {
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ReplyContext for CapturingReply {
    async fn reply(&self, text: &str) -> TransportResult<()> {
        let pending = self
            .rate_limit_once
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(retry_after) = pending {
            return Err(TransportError::RateLimited { retry_after });
        }
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(text.to_string());
        Ok(())
    }
}

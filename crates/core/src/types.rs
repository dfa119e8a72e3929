use serde::{Deserialize, Serialize};

/// Opaque numeric identity of a chat user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a source channel, either by public name or private numeric ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelRef {
    /// Public channel, addressed by username (`t.me/<name>`).
    Public(String),
    /// Private channel, addressed by internal numeric ID (`t.me/c/<id>`).
    Private(i64),
}

impl std::fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Public(name) => write!(f, "{name}"),
            Self::Private(id) => write!(f, "c/{id}"),
        }
    }
}

impl ChannelRef {
    /// Composite key for the dedup ledger: `channel/message-id`.
    #[must_use]
    pub fn job_key(&self, message_id: i64) -> String {
        format!("{self}/{message_id}")
    }
}

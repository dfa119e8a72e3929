//! Unified free-text classification: blocked check, secret authentication,
//! daily quota, link parsing.
//!
//! This is the decision half of the inbound path. The channel handler runs
//! the blanket flood gate first, dispatches slash commands, and feeds
//! everything else through [`classify_text`], then acts on the verdict
//! (enqueue, reply, or stay silent).

use crate::{
    limits::{self, QuotaVerdict},
    links,
    roles::{Role, RoleStore, Secrets, epoch_secs},
    types::{ChannelRef, UserId},
};

/// What to do with one inbound free-text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextVerdict {
    /// Sender is blocked; drop silently.
    Blocked,
    /// Unauthorized and the text is not a valid secret; drop silently (the
    /// /start prompt already asked for the secret once).
    SilentIgnore,
    /// The text matched a configured secret; the role was granted.
    Authenticated(Role),
    /// Daily quota reached for a non-owner.
    QuotaExhausted,
    /// A parseable message link; enqueue a relay job.
    Relay { channel: ChannelRef, message_id: i64 },
    /// A channel link, not a message link; suggest the right format.
    ChannelHint { channel: String },
    /// Contains `t.me/` but neither form parsed.
    InvalidLink,
    /// Not a Telegram link at all.
    NotALink,
}

/// Classify one free-text message from `user`.
///
/// Mutates the role store: successful authentication grants membership, and
/// the quota check may lazily roll the daily counter over.
pub fn classify_text(
    roles: &mut RoleStore,
    secrets: &Secrets,
    user: UserId,
    name: &str,
    text: &str,
) -> TextVerdict {
    if roles.is_blocked(user) {
        return TextVerdict::Blocked;
    }

    if !roles.is_authorized(user) {
        return match roles.authenticate(user, name, text, secrets) {
            Role::Unauthorized => TextVerdict::SilentIgnore,
            role => TextVerdict::Authenticated(role),
        };
    }

    let is_owner = roles.is_owner(user);
    let record = roles.ensure_record(user, name);
    if limits::check_quota(record, is_owner, epoch_secs()) == QuotaVerdict::Exhausted {
        return TextVerdict::QuotaExhausted;
    }

    if !text.contains("t.me/") {
        return TextVerdict::NotALink;
    }

    if let Some((channel, message_id)) = links::parse_message_link(text) {
        return TextVerdict::Relay { channel, message_id };
    }
    match links::parse_channel_link(text) {
        Some(channel) => TextVerdict::ChannelHint { channel },
        None => TextVerdict::InvalidLink,
    }
}

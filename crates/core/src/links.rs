//! Message- and channel-link parsing.
//!
//! Pure functions, no side effects. Malformed input is a parse miss
//! (`None`), never an error.

use crate::types::ChannelRef;

/// Extract `(channel, message id)` from a message link.
///
/// Two shapes are recognized after stripping an optional `http(s)://t.me/`
/// prefix:
///
/// - private form `c/<numeric>/<id>` → `ChannelRef::Private(<numeric>)`
/// - public form `<name>/<id>` → `ChannelRef::Public(<name>)`
///
/// Anything else (non-numeric IDs, missing segments) yields `None`.
#[must_use]
pub fn parse_message_link(text: &str) -> Option<(ChannelRef, i64)> {
    let link = strip_link_prefix(text.trim());
    let parts: Vec<&str> = link.split('/').collect();

    if parts.first() == Some(&"c") {
        // Private channel format: c/1234567890/123
        if parts.len() < 3 {
            return None;
        }
        let channel_id: i64 = parts[1].parse().ok()?;
        let message_id: i64 = parts[2].parse().ok()?;
        Some((ChannelRef::Private(channel_id), message_id))
    } else {
        // Public channel format: channel_name/123
        if parts.len() < 2 || parts[0].is_empty() {
            return None;
        }
        let message_id: i64 = parts[1].parse().ok()?;
        Some((ChannelRef::Public(parts[0].to_string()), message_id))
    }
}

/// Extract a channel username or invite hash from a channel link.
///
/// Invite forms (`t.me/+<hash>`, `t.me/joinchat/<hash>`) yield the hash with
/// any leading `+` stripped. Bare public links yield the last path segment,
/// falling back to the second-to-last when the URL ends with a slash.
///
/// Only used to produce a friendlier hint when a full message link could not
/// be parsed.
#[must_use]
pub fn parse_channel_link(text: &str) -> Option<String> {
    let link = text.trim();
    if !link.contains("t.me/") {
        return None;
    }

    if link.contains("t.me/+") || link.contains("t.me/joinchat/") {
        let hash = link.split('/').next_back()?;
        let hash = hash.strip_prefix('+').unwrap_or(hash);
        if hash.is_empty() {
            return None;
        }
        return Some(hash.to_string());
    }

    let mut parts = link.split('/').rev();
    let last = parts.next()?;
    let name = if last.is_empty() { parts.next()? } else { last };
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn strip_link_prefix(link: &str) -> &str {
    let link = link.strip_prefix("https://").unwrap_or(link);
    let link = link.strip_prefix("http://").unwrap_or(link);
    link.strip_prefix("t.me/").unwrap_or(link)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("https://t.me/somechannel/42", ChannelRef::Public("somechannel".into()), 42)]
    #[case("http://t.me/somechannel/42", ChannelRef::Public("somechannel".into()), 42)]
    #[case("t.me/somechannel/42", ChannelRef::Public("somechannel".into()), 42)]
    #[case("somechannel/42", ChannelRef::Public("somechannel".into()), 42)]
    #[case("  https://t.me/somechannel/42  ", ChannelRef::Public("somechannel".into()), 42)]
    fn public_message_links(#[case] input: &str, #[case] channel: ChannelRef, #[case] id: i64) {
        assert_eq!(parse_message_link(input), Some((channel, id)));
    }

    #[rstest]
    #[case("https://t.me/c/1234567890/123", 1234567890, 123)]
    #[case("c/555/42", 555, 42)]
    fn private_message_links(#[case] input: &str, #[case] channel_id: i64, #[case] id: i64) {
        assert_eq!(
            parse_message_link(input),
            Some((ChannelRef::Private(channel_id), id))
        );
    }

    #[rstest]
    #[case("")]
    #[case("https://t.me/")]
    #[case("https://t.me/somechannel")]
    #[case("https://t.me/somechannel/notanumber")]
    #[case("https://t.me/c/notanumber/42")]
    #[case("https://t.me/c/123")]
    #[case("/42")]
    #[case("just some text")]
    fn malformed_message_links(#[case] input: &str) {
        assert_eq!(parse_message_link(input), None);
    }

    #[test]
    fn invite_hash_links() {
        assert_eq!(
            parse_channel_link("https://t.me/+AbCdEf123"),
            Some("AbCdEf123".into())
        );
        assert_eq!(
            parse_channel_link("https://t.me/joinchat/AbCdEf123"),
            Some("AbCdEf123".into())
        );
    }

    #[test]
    fn public_channel_links() {
        assert_eq!(
            parse_channel_link("https://t.me/somechannel"),
            Some("somechannel".into())
        );
        // Trailing slash falls back to the previous segment.
        assert_eq!(
            parse_channel_link("https://t.me/somechannel/"),
            Some("somechannel".into())
        );
    }

    #[test]
    fn non_telegram_links_are_misses() {
        assert_eq!(parse_channel_link("https://example.com/foo"), None);
        assert_eq!(parse_channel_link("plain text"), None);
    }
}

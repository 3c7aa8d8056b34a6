//! Topic names and unicast protocol ids.

/// Gossip topic carrying presence announcements.
pub const PRESENCE_TOPIC: &str = "/ordernet/presence/1.0.0";

/// Prefix of per-channel chat topics.
pub const CHAT_TOPIC_PREFIX: &str = "/ordernet/chat/1.0.0/";

/// Unicast protocol id for join requests and vouches.
pub const VOUCH_PROTOCOL: &str = "/ordernet/vouch/1.0.0";

/// Unicast protocol id for group-key delivery.
pub const KEYEX_PROTOCOL: &str = "/ordernet/keyex/1.0.0";

/// Builds the chat topic for a channel id.
pub fn chat_topic(channel_id: &str) -> String {
    format!("{CHAT_TOPIC_PREFIX}{channel_id}")
}

/// Recovers the channel id from a chat topic, if it is one.
pub fn channel_from_topic(topic: &str) -> Option<&str> {
    topic
        .strip_prefix(CHAT_TOPIC_PREFIX)
        .filter(|id| !id.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_topic_roundtrip() {
        let topic = chat_topic("general");
        assert_eq!(topic, "/ordernet/chat/1.0.0/general");
        assert_eq!(channel_from_topic(&topic), Some("general"));
    }

    #[test]
    fn presence_topic_is_not_a_chat_topic() {
        assert_eq!(channel_from_topic(PRESENCE_TOPIC), None);
    }

    #[test]
    fn empty_channel_suffix_rejected() {
        assert_eq!(channel_from_topic(CHAT_TOPIC_PREFIX), None);
    }
}

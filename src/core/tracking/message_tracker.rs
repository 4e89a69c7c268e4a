// Message snapshot cache and ghost-ping detection.
//
// The gateway only hands us IDs on delete events, so we keep our own snapshot
// of recent messages. That makes delete/edit handling reliable even when the
// client library's cache misses the message.

use dashmap::DashMap;

// Cap how many messages we keep in memory so we don't grow unbounded.
const MAX_TRACKED_MESSAGES: usize = 5_000;

/// Snapshot of a message at the time it was sent.
#[derive(Debug, Clone)]
pub struct TrackedMessage {
    pub message_id: u64,
    pub guild_id: u64,
    pub channel_id: u64,
    pub author_id: u64,
    pub author_name: String,
    pub author_is_bot: bool,
    pub content: String,
    pub user_mentions: Vec<u64>,
    pub role_mentions: Vec<u64>,
    pub mentions_everyone: bool,
}

impl TrackedMessage {
    /// Users this message pinged, not counting the author pinging themselves.
    fn pinged_users(&self) -> impl Iterator<Item = &u64> {
        self.user_mentions.iter().filter(move |id| **id != self.author_id)
    }

    fn pings_anyone(&self) -> bool {
        self.pinged_users().next().is_some()
            || !self.role_mentions.is_empty()
            || self.mentions_everyone
    }
}

/// A deleted message is a ghost ping when it pinged somebody and then
/// vanished. Bot-authored messages are ignored, and a message that only
/// mentioned its own author never pinged anyone else.
pub fn is_ghost_ping(deleted: &TrackedMessage) -> bool {
    if deleted.author_is_bot {
        return false;
    }
    deleted.pings_anyone()
}

/// An edit counts as a ghost ping when it silently dropped mentions that the
/// original message carried.
pub fn edit_removed_mentions(old: &TrackedMessage, new: &TrackedMessage) -> bool {
    if old.author_is_bot {
        return false;
    }

    let dropped_user = old
        .pinged_users()
        .any(|id| !new.user_mentions.contains(id));
    let dropped_role = old
        .role_mentions
        .iter()
        .any(|id| !new.role_mentions.contains(id));
    let dropped_everyone = old.mentions_everyone && !new.mentions_everyone;

    dropped_user || dropped_role || dropped_everyone
}

/// Bounded store of recent message snapshots.
pub struct MessageTracker {
    messages: DashMap<u64, TrackedMessage>,
}

impl MessageTracker {
    pub fn new() -> Self {
        Self {
            messages: DashMap::new(),
        }
    }

    /// Store a snapshot so delete/edit events can be resolved later.
    pub fn remember(&self, message: TrackedMessage) {
        self.messages.insert(message.message_id, message);

        // Simple eviction: drop an arbitrary entry once we cross the cap.
        if self.messages.len() > MAX_TRACKED_MESSAGES {
            if let Some(first_key) = self.messages.iter().next().map(|entry| *entry.key()) {
                self.messages.remove(&first_key);
            }
        }
    }

    /// Get a snapshot without removing it (used for edits).
    pub fn get(&self, message_id: u64) -> Option<TrackedMessage> {
        self.messages.get(&message_id).map(|m| m.clone())
    }

    /// Remove and return a snapshot (used for deletions).
    pub fn take(&self, message_id: u64) -> Option<TrackedMessage> {
        self.messages.remove(&message_id).map(|(_, m)| m)
    }
}

impl Default for MessageTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(author_id: u64, user_mentions: Vec<u64>) -> TrackedMessage {
        TrackedMessage {
            message_id: 1,
            guild_id: 10,
            channel_id: 20,
            author_id,
            author_name: "tester".into(),
            author_is_bot: false,
            content: "hello".into(),
            user_mentions,
            role_mentions: Vec::new(),
            mentions_everyone: false,
        }
    }

    #[test]
    fn test_ghost_ping_requires_a_mention() {
        assert!(!is_ghost_ping(&message(1, vec![])));
        assert!(is_ghost_ping(&message(1, vec![2])));
    }

    #[test]
    fn test_self_mention_is_not_a_ghost_ping() {
        assert!(!is_ghost_ping(&message(1, vec![1])));
        // ...but mentioning yourself AND someone else still is.
        assert!(is_ghost_ping(&message(1, vec![1, 2])));
    }

    #[test]
    fn test_bot_messages_ignored() {
        let mut msg = message(1, vec![2]);
        msg.author_is_bot = true;
        assert!(!is_ghost_ping(&msg));
    }

    #[test]
    fn test_role_and_everyone_mentions_count() {
        let mut msg = message(1, vec![]);
        msg.role_mentions = vec![99];
        assert!(is_ghost_ping(&msg));

        let mut msg = message(1, vec![]);
        msg.mentions_everyone = true;
        assert!(is_ghost_ping(&msg));
    }

    #[test]
    fn test_edit_dropping_a_mention_is_a_ghost_ping() {
        let old = message(1, vec![2, 3]);
        let new = message(1, vec![2]);
        assert!(edit_removed_mentions(&old, &new));

        // Keeping all mentions is fine.
        assert!(!edit_removed_mentions(&old, &message(1, vec![2, 3])));
        // Dropping only a self-mention is fine.
        assert!(!edit_removed_mentions(
            &message(1, vec![1, 2]),
            &message(1, vec![2])
        ));
    }

    #[test]
    fn test_tracker_remember_and_take() {
        let tracker = MessageTracker::new();
        tracker.remember(message(1, vec![2]));

        assert!(tracker.get(1).is_some());
        assert!(tracker.take(1).is_some());
        assert!(tracker.take(1).is_none());
    }
}

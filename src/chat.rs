//! Chat log store.
//!
//! Bounded in-memory message logs: one public log per room, one private log
//! per conversation. A private conversation is keyed by the unordered pair
//! of connection ids — the message is stored once under a canonical sorted
//! key and both lookup directions resolve to it, so either participant can
//! read the conversation from their own perspective.
//!
//! Logs keep at most `cap` messages in arrival order, evicting the oldest.
//! Public appends are idempotent by message id, which guards against
//! duplicate delivery from at-least-once transports.

use dashmap::DashMap;

use crate::protocol::{ChatMessage, MessageKind};

/// Default bound on every chat log.
pub const DEFAULT_CHAT_HISTORY_LIMIT: usize = 100;

/// Key of one logical conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConversationKey {
    /// The room-wide public log.
    Room(String),
    /// A private conversation between two connections, pair sorted so both
    /// orderings resolve to the same log.
    Direct {
        room_id: String,
        low: String,
        high: String,
    },
}

impl ConversationKey {
    fn public(room_id: &str) -> Self {
        ConversationKey::Room(room_id.to_string())
    }

    fn direct(room_id: &str, a: &str, b: &str) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        ConversationKey::Direct {
            room_id: room_id.to_string(),
            low: low.to_string(),
            high: high.to_string(),
        }
    }

    fn room_id(&self) -> &str {
        match self {
            ConversationKey::Room(room_id) => room_id,
            ConversationKey::Direct { room_id, .. } => room_id,
        }
    }
}

/// Conversation key → bounded ordered message log.
pub struct ChatStore {
    logs: DashMap<ConversationKey, Vec<ChatMessage>>,
    cap: usize,
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new(DEFAULT_CHAT_HISTORY_LIMIT)
    }
}

impl ChatStore {
    pub fn new(cap: usize) -> Self {
        Self {
            logs: DashMap::new(),
            cap,
        }
    }

    /// Append a message to a room's public log. Returns false (no-op) if a
    /// message with the same id is already present.
    pub fn append_public(&self, room_id: &str, message: ChatMessage) -> bool {
        let mut log = self.logs.entry(ConversationKey::public(room_id)).or_default();
        if log.iter().any(|existing| existing.id == message.id) {
            return false;
        }
        log.push(message);
        Self::truncate(&mut log, self.cap);
        true
    }

    /// Append a private message between two participants. The log is shared
    /// between both directions of the conversation.
    pub fn append_private(&self, room_id: &str, a: &str, b: &str, message: ChatMessage) {
        let mut log = self
            .logs
            .entry(ConversationKey::direct(room_id, a, b))
            .or_default();
        log.push(message);
        Self::truncate(&mut log, self.cap);
    }

    /// A room's public history filtered to global messages, `None` when no
    /// public log exists for the room yet.
    pub fn public_history(&self, room_id: &str) -> Option<Vec<ChatMessage>> {
        self.logs.get(&ConversationKey::public(room_id)).map(|log| {
            log.iter()
                .filter(|message| message.kind == MessageKind::Global)
                .cloned()
                .collect()
        })
    }

    /// The private conversation between two connections, sorted ascending by
    /// the numeric prefix of the message id (the canonical ordering — ids
    /// are millisecond-timestamp prefixed).
    pub fn private_history(&self, room_id: &str, self_id: &str, other_id: &str) -> Vec<ChatMessage> {
        let mut conversation: Vec<ChatMessage> = self
            .logs
            .get(&ConversationKey::direct(room_id, self_id, other_id))
            .map(|log| log.clone())
            .unwrap_or_default();
        conversation.sort_by_key(|message| numeric_prefix(&message.id));
        conversation
    }

    /// Drop every log belonging to a room — the public log and all private
    /// conversations held in it. Invoked by the room-deletion path.
    pub fn remove_room(&self, room_id: &str) {
        self.logs.retain(|key, _| key.room_id() != room_id);
    }

    /// Number of live conversation logs.
    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    fn truncate(log: &mut Vec<ChatMessage>, cap: usize) {
        if log.len() > cap {
            let overflow = log.len() - cap;
            log.drain(..overflow);
        }
    }
}

/// Leading-digits prefix of a message id, 0 when the id has none.
fn numeric_prefix(id: &str) -> i64 {
    let digits: String = id.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, sender_id: &str, kind: MessageKind) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            sender: format!("user-{}", sender_id),
            sender_id: sender_id.to_string(),
            recipient_id: None,
            content: format!("message {}", id),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            kind,
        }
    }

    #[test]
    fn test_append_and_read_public_history() {
        let store = ChatStore::default();

        assert!(store.append_public("abc123", message("1", "conn-1", MessageKind::Global)));
        assert!(store.append_public("abc123", message("2", "conn-2", MessageKind::Global)));

        let history = store.public_history("abc123").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, "1");
        assert_eq!(history[1].id, "2");
    }

    #[test]
    fn test_public_history_absent_until_first_message() {
        let store = ChatStore::default();
        assert!(store.public_history("abc123").is_none());
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let store = ChatStore::default();
        store.append_public("abc123", message("1", "conn-1", MessageKind::Global));
        store.append_public("abc123", message("2", "conn-1", MessageKind::Global));

        assert!(!store.append_public("abc123", message("1", "conn-2", MessageKind::Global)));

        let history = store.public_history("abc123").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, "1");
        assert_eq!(history[1].id, "2");
    }

    #[test]
    fn test_cap_evicts_oldest_first() {
        let store = ChatStore::default();

        for i in 1..=101 {
            store.append_public(
                "abc123",
                message(&i.to_string(), "conn-1", MessageKind::Global),
            );
        }

        let history = store.public_history("abc123").unwrap();
        assert_eq!(history.len(), 100);
        assert_eq!(history[0].id, "2");
        assert_eq!(history[99].id, "101");
        assert!(!history.iter().any(|m| m.id == "1"));
    }

    #[test]
    fn test_private_log_is_symmetric() {
        let store = ChatStore::default();
        let mut msg = message("100", "conn-a", MessageKind::Private);
        msg.recipient_id = Some("conn-b".to_string());

        store.append_private("abc123", "conn-a", "conn-b", msg.clone());

        let from_a = store.private_history("abc123", "conn-a", "conn-b");
        let from_b = store.private_history("abc123", "conn-b", "conn-a");
        assert_eq!(from_a, vec![msg.clone()]);
        assert_eq!(from_b, vec![msg]);
    }

    #[test]
    fn test_private_history_sorted_by_numeric_id_prefix() {
        let store = ChatStore::default();
        store.append_private(
            "abc123",
            "conn-a",
            "conn-b",
            message("200-b", "conn-b", MessageKind::Private),
        );
        store.append_private(
            "abc123",
            "conn-b",
            "conn-a",
            message("100-a", "conn-a", MessageKind::Private),
        );
        store.append_private(
            "abc123",
            "conn-a",
            "conn-b",
            message("150-a", "conn-a", MessageKind::Private),
        );

        let conversation = store.private_history("abc123", "conn-a", "conn-b");
        let ids: Vec<&str> = conversation.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["100-a", "150-a", "200-b"]);
    }

    #[test]
    fn test_private_cap_applies() {
        let store = ChatStore::new(5);

        for i in 0..7 {
            store.append_private(
                "abc123",
                "conn-a",
                "conn-b",
                message(&format!("{}", i), "conn-a", MessageKind::Private),
            );
        }

        let conversation = store.private_history("abc123", "conn-a", "conn-b");
        assert_eq!(conversation.len(), 5);
        assert_eq!(conversation[0].id, "2");
    }

    #[test]
    fn test_conversations_are_scoped_per_room() {
        let store = ChatStore::default();
        store.append_private(
            "room-a",
            "conn-a",
            "conn-b",
            message("1", "conn-a", MessageKind::Private),
        );

        assert!(store.private_history("room-b", "conn-a", "conn-b").is_empty());
    }

    #[test]
    fn test_public_history_filters_to_global() {
        let store = ChatStore::default();
        store.append_public("abc123", message("1", "conn-1", MessageKind::Global));
        store.append_public("abc123", message("2", "conn-1", MessageKind::Private));

        let history = store.public_history("abc123").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, "1");
    }

    #[test]
    fn test_remove_room_drops_public_and_private_logs() {
        let store = ChatStore::default();
        store.append_public("abc123", message("1", "conn-1", MessageKind::Global));
        store.append_private(
            "abc123",
            "conn-a",
            "conn-b",
            message("2", "conn-a", MessageKind::Private),
        );
        store.append_public("other", message("3", "conn-1", MessageKind::Global));

        store.remove_room("abc123");

        assert!(store.public_history("abc123").is_none());
        assert!(store.private_history("abc123", "conn-a", "conn-b").is_empty());
        assert!(store.public_history("other").is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_numeric_prefix_parsing() {
        assert_eq!(numeric_prefix("1700000000000-abc"), 1_700_000_000_000);
        assert_eq!(numeric_prefix("42"), 42);
        assert_eq!(numeric_prefix("no-digits"), 0);
    }
}

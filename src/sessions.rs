//! Session deduplication table.
//!
//! A browser refresh produces a brand-new transport connection carrying the
//! same display name. Without this table a rejoin would look like a second
//! participant: a duplicate roster entry and a spurious "X joined" notice.
//! The table maps `(room, display name)` to the connection currently
//! considered "the" session for that identity, so a fresh connection can
//! supersede and evict its stale predecessor.

use dashmap::DashMap;

/// The unit of reconnection identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub room_id: String,
    pub username: String,
}

impl SessionKey {
    fn new(room_id: &str, username: &str) -> Self {
        Self {
            room_id: room_id.to_string(),
            username: username.to_string(),
        }
    }
}

/// Outcome of claiming a session key.
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    /// True when an entry existed for this exact session key, whether or not
    /// the connection id changed — "name seen before" rather than "first
    /// time seeing this name".
    pub is_reconnect: bool,
    /// The superseded connection, if the key previously mapped to a
    /// different one. The caller must evict it from the presence registry.
    pub evicted_connection_id: Option<String>,
}

/// Session key → current connection id.
#[derive(Default)]
pub struct SessionTable {
    sessions: DashMap<SessionKey, String>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a session key for a connection, overwriting any prior mapping.
    pub fn claim(&self, room_id: &str, username: &str, connection_id: &str) -> Claim {
        let previous = self
            .sessions
            .insert(SessionKey::new(room_id, username), connection_id.to_string());

        match previous {
            Some(old) if old != connection_id => Claim {
                is_reconnect: true,
                evicted_connection_id: Some(old),
            },
            Some(_) => Claim {
                is_reconnect: true,
                evicted_connection_id: None,
            },
            None => Claim {
                is_reconnect: false,
                evicted_connection_id: None,
            },
        }
    }

    /// Drop the mapping for a session key. Used on explicit leave.
    pub fn release(&self, room_id: &str, username: &str) {
        self.sessions.remove(&SessionKey::new(room_id, username));
    }

    /// Drop every mapping held by a connection. Used on disconnect, where
    /// only the connection id is known.
    pub fn release_by_connection(&self, connection_id: &str) {
        self.sessions.retain(|_, current| current != connection_id);
    }

    /// The connection currently holding a session key.
    pub fn current(&self, room_id: &str, username: &str) -> Option<String> {
        self.sessions
            .get(&SessionKey::new(room_id, username))
            .map(|entry| entry.clone())
    }

    /// Number of live session mappings.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_claim_is_not_a_reconnect() {
        let table = SessionTable::new();

        let claim = table.claim("abc123", "Alice", "conn-1");

        assert!(!claim.is_reconnect);
        assert_eq!(claim.evicted_connection_id, None);
        assert_eq!(table.current("abc123", "Alice"), Some("conn-1".to_string()));
    }

    #[test]
    fn test_new_connection_supersedes_old_one() {
        let table = SessionTable::new();
        table.claim("abc123", "Alice", "conn-1");

        let claim = table.claim("abc123", "Alice", "conn-2");

        assert!(claim.is_reconnect);
        assert_eq!(claim.evicted_connection_id, Some("conn-1".to_string()));
        assert_eq!(table.current("abc123", "Alice"), Some("conn-2".to_string()));
    }

    #[test]
    fn test_reclaim_by_same_connection_evicts_nothing() {
        let table = SessionTable::new();
        table.claim("abc123", "Alice", "conn-1");

        let claim = table.claim("abc123", "Alice", "conn-1");

        assert!(claim.is_reconnect);
        assert_eq!(claim.evicted_connection_id, None);
    }

    #[test]
    fn test_same_name_in_different_rooms_are_distinct_sessions() {
        let table = SessionTable::new();
        table.claim("room-a", "Alice", "conn-1");

        let claim = table.claim("room-b", "Alice", "conn-2");

        assert!(!claim.is_reconnect);
        assert_eq!(table.current("room-a", "Alice"), Some("conn-1".to_string()));
        assert_eq!(table.current("room-b", "Alice"), Some("conn-2".to_string()));
    }

    #[test]
    fn test_release_drops_mapping() {
        let table = SessionTable::new();
        table.claim("abc123", "Alice", "conn-1");

        table.release("abc123", "Alice");

        assert_eq!(table.current("abc123", "Alice"), None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_release_by_connection_drops_only_that_connection() {
        let table = SessionTable::new();
        table.claim("abc123", "Alice", "conn-1");
        table.claim("abc123", "Bob", "conn-2");

        table.release_by_connection("conn-1");

        assert_eq!(table.current("abc123", "Alice"), None);
        assert_eq!(table.current("abc123", "Bob"), Some("conn-2".to_string()));
        assert_eq!(table.len(), 1);
    }
}

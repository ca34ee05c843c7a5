//! Presence registry.
//!
//! Tracks which connections are participants of which room. Rosters keep
//! insertion order — the frontend renders them as the display order. A
//! connection is a participant of at most one room at a time; joining a new
//! room implies removal from the old one.

use dashmap::DashMap;

use crate::protocol::Participant;

/// Result of removing a connection from a room.
#[derive(Debug, Clone, PartialEq)]
pub struct Departure {
    pub room_id: String,
    pub participant: Participant,
    /// True when the room has no participants left after the removal. The
    /// lifecycle handler uses this to garbage-collect ephemeral room state.
    pub room_now_empty: bool,
}

/// Room id → ordered roster of participants.
#[derive(Default)]
pub struct PresenceRegistry {
    rooms: DashMap<String, Vec<Participant>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant in a room. Returns false (no-op) if the
    /// connection is already a participant of that room.
    ///
    /// Enforces the single-room invariant: any membership the connection
    /// holds in another room is dropped before insertion.
    pub fn join(&self, room_id: &str, participant: Participant) -> bool {
        let stale: Vec<String> = self
            .rooms
            .iter()
            .filter(|entry| {
                entry.key() != room_id && entry.value().iter().any(|p| p.id == participant.id)
            })
            .map(|entry| entry.key().clone())
            .collect();
        for room in stale {
            self.remove_from(&room, &participant.id);
        }

        let mut roster = self.rooms.entry(room_id.to_string()).or_default();
        if roster.iter().any(|p| p.id == participant.id) {
            return false;
        }
        roster.push(participant);
        true
    }

    /// Whether a connection is a participant of a room.
    pub fn is_member(&self, room_id: &str, connection_id: &str) -> bool {
        self.rooms
            .get(room_id)
            .map(|roster| roster.iter().any(|p| p.id == connection_id))
            .unwrap_or(false)
    }

    /// Remove a connection from a specific room. Empty rosters are dropped
    /// so `room_size` reports 0 for rooms nobody occupies.
    pub fn remove_from(&self, room_id: &str, connection_id: &str) -> Option<Departure> {
        let participant = {
            let mut roster = self.rooms.get_mut(room_id)?;
            let index = roster.iter().position(|p| p.id == connection_id)?;
            roster.remove(index)
        };
        // The emptiness check and the delete must be a single atomic step: a
        // join landing between them would have its fresh entry deleted.
        let room_now_empty = self
            .rooms
            .remove_if(room_id, |_, roster| roster.is_empty())
            .is_some();
        Some(Departure {
            room_id: room_id.to_string(),
            participant,
            room_now_empty,
        })
    }

    /// Remove a connection from every room it occupies. Removing a connection
    /// that is tracked nowhere is a no-op and returns an empty list.
    pub fn remove(&self, connection_id: &str) -> Vec<Departure> {
        let room_ids: Vec<String> = self
            .rooms
            .iter()
            .filter(|entry| entry.value().iter().any(|p| p.id == connection_id))
            .map(|entry| entry.key().clone())
            .collect();

        room_ids
            .into_iter()
            .filter_map(|room_id| self.remove_from(&room_id, connection_id))
            .collect()
    }

    /// The room's roster in join order.
    pub fn participants(&self, room_id: &str) -> Vec<Participant> {
        self.rooms
            .get(room_id)
            .map(|roster| roster.clone())
            .unwrap_or_default()
    }

    /// Number of participants in a room, 0 if the room is untracked.
    pub fn room_size(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map(|roster| roster.len()).unwrap_or(0)
    }

    /// Number of rooms with at least one participant.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

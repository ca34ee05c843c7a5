//! Ephemeral room state store.
//!
//! Per-room in-memory state with no durability guarantee: the active tool
//! and the latest whiteboard snapshot. Entries are created lazily on first
//! write and deleted by the lifecycle handler when a room's participant
//! count reaches zero, so a later rejoin starts from a clean slate.
//!
//! Whiteboard undo works by the client re-sending a full snapshot — only the
//! latest snapshot is kept, never deltas.

use dashmap::DashMap;
use serde_json::Value;

use crate::protocol::Tool;

#[derive(Debug, Default)]
struct RoomEphemeral {
    active_tool: Option<Tool>,
    whiteboard_paths: Option<Vec<Value>>,
}

/// Room id → {active tool, whiteboard snapshot}.
#[derive(Default)]
pub struct RoomStateStore {
    rooms: DashMap<String, RoomEphemeral>,
}

impl RoomStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_tool(&self, room_id: &str) -> Option<Tool> {
        self.rooms
            .get(room_id)
            .and_then(|state| state.active_tool.clone())
    }

    pub fn set_active_tool(&self, room_id: &str, tool: Tool) {
        self.rooms.entry(room_id.to_string()).or_default().active_tool = Some(tool);
    }

    pub fn whiteboard_paths(&self, room_id: &str) -> Option<Vec<Value>> {
        self.rooms
            .get(room_id)
            .and_then(|state| state.whiteboard_paths.clone())
    }

    pub fn set_whiteboard_paths(&self, room_id: &str, paths: Vec<Value>) {
        self.rooms
            .entry(room_id.to_string())
            .or_default()
            .whiteboard_paths = Some(paths);
    }

    /// Drop the whiteboard snapshot, keeping the active tool.
    pub fn clear_whiteboard(&self, room_id: &str) {
        if let Some(mut state) = self.rooms.get_mut(room_id) {
            state.whiteboard_paths = None;
        }
    }

    /// Number of stored whiteboard paths, 0 if no snapshot exists.
    pub fn whiteboard_path_count(&self, room_id: &str) -> usize {
        self.rooms
            .get(room_id)
            .and_then(|state| state.whiteboard_paths.as_ref().map(|paths| paths.len()))
            .unwrap_or(0)
    }

    pub fn has_whiteboard(&self, room_id: &str) -> bool {
        self.rooms
            .get(room_id)
            .map(|state| state.whiteboard_paths.is_some())
            .unwrap_or(false)
    }

    /// Delete all ephemeral state for a room.
    pub fn remove(&self, room_id: &str) {
        self.rooms.remove(room_id);
    }

    /// Number of rooms with any ephemeral state.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_is_created_lazily() {
        let store = RoomStateStore::new();
        assert_eq!(store.active_tool("abc123"), None);
        assert!(store.is_empty());

        store.set_active_tool("abc123", Tool::Whiteboard);

        assert_eq!(store.active_tool("abc123"), Some(Tool::Whiteboard));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_whiteboard_snapshot_is_replaced_not_merged() {
        let store = RoomStateStore::new();
        store.set_whiteboard_paths("abc123", vec![json!({"tool": "pen"})]);

        store.set_whiteboard_paths("abc123", vec![json!({"tool": "eraser"}), json!({"x": 1})]);

        assert_eq!(store.whiteboard_path_count("abc123"), 2);
        let paths = store.whiteboard_paths("abc123").unwrap();
        assert_eq!(paths[0], json!({"tool": "eraser"}));
    }

    #[test]
    fn test_clear_whiteboard_keeps_active_tool() {
        let store = RoomStateStore::new();
        store.set_active_tool("abc123", Tool::Whiteboard);
        store.set_whiteboard_paths("abc123", vec![json!({"tool": "pen"})]);

        store.clear_whiteboard("abc123");

        assert!(!store.has_whiteboard("abc123"));
        assert_eq!(store.whiteboard_path_count("abc123"), 0);
        assert_eq!(store.active_tool("abc123"), Some(Tool::Whiteboard));
    }

    #[test]
    fn test_remove_deletes_everything_for_the_room() {
        let store = RoomStateStore::new();
        store.set_active_tool("abc123", Tool::Editor);
        store.set_whiteboard_paths("abc123", vec![json!({})]);
        store.set_active_tool("other", Tool::Whiteboard);

        store.remove("abc123");

        assert_eq!(store.active_tool("abc123"), None);
        assert!(!store.has_whiteboard("abc123"));
        assert_eq!(store.active_tool("other"), Some(Tool::Whiteboard));
    }

    #[test]
    fn test_clear_whiteboard_on_unknown_room_is_noop() {
        let store = RoomStateStore::new();
        store.clear_whiteboard("nowhere");
        assert!(store.is_empty());
    }
}

//! Broadcast dispatcher.
//!
//! Thin fan-out layer over the WebSocket transport: connection id → sender
//! channel, plus per-room broadcast groups (the set of connections that
//! receive room-wide emissions). Broadcast groups are deliberately distinct
//! from the presence registry — `whiteboard-join` attaches a connection to a
//! room's group without it ever appearing on the roster.
//!
//! Delivery is fire-and-forget: an emission to a connection that is gone is
//! silently dropped, never surfaced to the caller as an error.

use std::collections::HashSet;

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::protocol::ServerEvent;

/// A connected client's sender channel.
pub type ClientSender = mpsc::UnboundedSender<ServerEvent>;

/// Connection registry and room broadcast groups.
#[derive(Default)]
pub struct Dispatcher {
    clients: DashMap<String, ClientSender>,
    groups: DashMap<String, HashSet<String>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Connection Registry ───────────────────────────────────────────────

    /// Register a connection's sender channel.
    pub fn register(&self, connection_id: &str, sender: ClientSender) {
        self.clients.insert(connection_id.to_string(), sender);
    }

    /// Unregister a connection when it disconnects.
    pub fn unregister(&self, connection_id: &str) {
        self.clients.remove(connection_id);
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.clients.len()
    }

    // ── Broadcast Groups ──────────────────────────────────────────────────

    /// Attach a connection to a room's broadcast group.
    pub fn join_group(&self, room_id: &str, connection_id: &str) {
        self.groups
            .entry(room_id.to_string())
            .or_default()
            .insert(connection_id.to_string());
    }

    /// Detach a connection from a room's broadcast group.
    pub fn leave_group(&self, room_id: &str, connection_id: &str) {
        {
            let Some(mut group) = self.groups.get_mut(room_id) else {
                return;
            };
            group.remove(connection_id);
        }
        // Atomic check-and-delete, so a concurrent join_group cannot slip a
        // member into a group this call then deletes.
        self.groups.remove_if(room_id, |_, group| group.is_empty());
    }

    /// Detach a connection from every broadcast group it occupies.
    pub fn leave_all_groups(&self, connection_id: &str) {
        let room_ids: Vec<String> = self
            .groups
            .iter()
            .filter(|entry| entry.value().contains(connection_id))
            .map(|entry| entry.key().clone())
            .collect();
        for room_id in room_ids {
            self.leave_group(&room_id, connection_id);
        }
    }

    /// Size of a room's broadcast group, 0 if absent.
    pub fn group_size(&self, room_id: &str) -> usize {
        self.groups.get(room_id).map(|group| group.len()).unwrap_or(0)
    }

    // ── Emission ──────────────────────────────────────────────────────────

    /// Send an event to one connection. Returns true if it was handed to the
    /// transport; a missing or closed connection drops the event.
    pub fn emit_to(&self, connection_id: &str, event: ServerEvent) -> bool {
        if let Some(sender) = self.clients.get(connection_id) {
            sender.send(event).is_ok()
        } else {
            false
        }
    }

    /// Send an event to every connection in a room's group, sender included.
    pub fn emit_to_room(&self, room_id: &str, event: &ServerEvent) {
        for connection_id in self.group_members(room_id) {
            self.emit_to(&connection_id, event.clone());
        }
    }

    /// Send an event to every connection in a room's group except one.
    pub fn emit_to_room_except(&self, room_id: &str, sender_id: &str, event: &ServerEvent) {
        for connection_id in self.group_members(room_id) {
            if connection_id != sender_id {
                self.emit_to(&connection_id, event.clone());
            }
        }
    }

    fn group_members(&self, room_id: &str) -> Vec<String> {
        self.groups
            .get(room_id)
            .map(|group| group.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn connect(dispatcher: &Dispatcher, id: &str) -> UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        dispatcher.register(id, tx);
        rx
    }

    fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn left(username: &str) -> ServerEvent {
        ServerEvent::UserLeft {
            username: username.to_string(),
        }
    }

    #[test]
    fn test_emit_to_registered_connection() {
        let dispatcher = Dispatcher::new();
        let mut rx = connect(&dispatcher, "conn-1");

        assert!(dispatcher.emit_to("conn-1", left("Alice")));
        assert_eq!(drain(&mut rx), vec![left("Alice")]);
    }

    #[test]
    fn test_emit_to_missing_connection_is_dropped() {
        let dispatcher = Dispatcher::new();
        assert!(!dispatcher.emit_to("conn-9", left("Alice")));
    }

    #[test]
    fn test_emit_to_closed_connection_is_dropped() {
        let dispatcher = Dispatcher::new();
        let rx = connect(&dispatcher, "conn-1");
        drop(rx);

        assert!(!dispatcher.emit_to("conn-1", left("Alice")));
    }

    #[test]
    fn test_room_broadcast_includes_every_member() {
        let dispatcher = Dispatcher::new();
        let mut rx1 = connect(&dispatcher, "conn-1");
        let mut rx2 = connect(&dispatcher, "conn-2");
        let mut rx3 = connect(&dispatcher, "conn-3");
        dispatcher.join_group("abc123", "conn-1");
        dispatcher.join_group("abc123", "conn-2");

        dispatcher.emit_to_room("abc123", &left("Alice"));

        assert_eq!(drain(&mut rx1).len(), 1);
        assert_eq!(drain(&mut rx2).len(), 1);
        assert!(drain(&mut rx3).is_empty());
    }

    #[test]
    fn test_room_broadcast_except_sender() {
        let dispatcher = Dispatcher::new();
        let mut rx1 = connect(&dispatcher, "conn-1");
        let mut rx2 = connect(&dispatcher, "conn-2");
        dispatcher.join_group("abc123", "conn-1");
        dispatcher.join_group("abc123", "conn-2");

        dispatcher.emit_to_room_except("abc123", "conn-1", &left("Alice"));

        assert!(drain(&mut rx1).is_empty());
        assert_eq!(drain(&mut rx2).len(), 1);
    }

    #[test]
    fn test_leave_group_stops_delivery() {
        let dispatcher = Dispatcher::new();
        let mut rx = connect(&dispatcher, "conn-1");
        dispatcher.join_group("abc123", "conn-1");

        dispatcher.leave_group("abc123", "conn-1");
        dispatcher.emit_to_room("abc123", &left("Alice"));

        assert!(drain(&mut rx).is_empty());
        assert_eq!(dispatcher.group_size("abc123"), 0);
    }

    #[test]
    fn test_leave_all_groups() {
        let dispatcher = Dispatcher::new();
        let _rx = connect(&dispatcher, "conn-1");
        dispatcher.join_group("room-a", "conn-1");
        dispatcher.join_group("room-b", "conn-1");

        dispatcher.leave_all_groups("conn-1");

        assert_eq!(dispatcher.group_size("room-a"), 0);
        assert_eq!(dispatcher.group_size("room-b"), 0);
    }

    #[test]
    fn test_concurrent_leave_and_join_group_keeps_new_member() {
        use std::sync::Arc;

        let dispatcher = Arc::new(Dispatcher::new());
        for i in 0..1000 {
            dispatcher.join_group("abc123", "conn-1");

            let leaver = {
                let dispatcher = Arc::clone(&dispatcher);
                std::thread::spawn(move || {
                    dispatcher.leave_group("abc123", "conn-1");
                })
            };
            let joiner = {
                let dispatcher = Arc::clone(&dispatcher);
                std::thread::spawn(move || {
                    dispatcher.join_group("abc123", "conn-2");
                })
            };
            leaver.join().unwrap();
            joiner.join().unwrap();

            assert_eq!(
                dispatcher.group_size("abc123"),
                1,
                "joining member lost at iteration {}",
                i
            );
            dispatcher.leave_group("abc123", "conn-2");
        }
    }

    #[test]
    fn test_group_membership_is_idempotent() {
        let dispatcher = Dispatcher::new();
        let mut rx = connect(&dispatcher, "conn-1");
        dispatcher.join_group("abc123", "conn-1");
        dispatcher.join_group("abc123", "conn-1");

        dispatcher.emit_to_room("abc123", &left("Alice"));

        assert_eq!(dispatcher.group_size("abc123"), 1);
        assert_eq!(drain(&mut rx).len(), 1);
    }
}

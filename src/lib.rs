//! Tandem Session Coordinator
//!
//! The live session coordinator for the Tandem collaborative workspace. It
//! tracks which connections occupy which room, and keeps everyone's view of
//! the shared editor, whiteboard, and chat in sync:
//!
//! 1. **Presence**: per-room participant rosters with a single-room-per-
//!    connection invariant, broadcast to the room on every change.
//!
//! 2. **Reconnect dedup**: a browser refresh produces a new connection with
//!    the same display name; the session table supersedes the stale
//!    connection instead of showing a duplicate participant.
//!
//! 3. **Ephemeral room state**: the active tool and the latest whiteboard
//!    snapshot, garbage-collected when the room empties.
//!
//! 4. **Bounded chat logs**: public and private conversations capped at the
//!    most recent 100 messages, append idempotent by message id.
//!
//! Durable room documents (saved code and language) live behind the
//! [`store::DocumentStore`] trait; everything else is in-memory only.

pub mod chat;
pub mod dispatch;
pub mod handler;
pub mod presence;
pub mod protocol;
pub mod room_state;
pub mod server;
pub mod sessions;
pub mod state;
pub mod store;

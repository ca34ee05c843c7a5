//! Coordinator state.
//!
//! One `CoordinatorState` is built at startup and cloned into every
//! connection handler and HTTP route. It composes the per-concern stores;
//! each store is internally concurrent (DashMap) so handlers never take an
//! outer lock.

use std::sync::Arc;

use crate::chat::{ChatStore, DEFAULT_CHAT_HISTORY_LIMIT};
use crate::dispatch::Dispatcher;
use crate::presence::PresenceRegistry;
use crate::room_state::RoomStateStore;
use crate::sessions::SessionTable;
use crate::store::DocumentStore;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub port: u16,
    /// Bound on every chat log (public and private alike).
    pub chat_history_limit: usize,
    /// Exact origin allowed by CORS; `None` allows any origin.
    pub frontend_origin: Option<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            chat_history_limit: DEFAULT_CHAT_HISTORY_LIMIT,
            frontend_origin: None,
        }
    }
}

/// Shared server state.
#[derive(Clone)]
pub struct CoordinatorState {
    // ── Transport ─────────────────────────────────────────────────────────
    /// Connection senders and room broadcast groups.
    pub dispatcher: Arc<Dispatcher>,

    // ── Live Session State ────────────────────────────────────────────────
    /// Room id → ordered participant roster.
    pub presence: Arc<PresenceRegistry>,

    /// (room, display name) → current connection. Reconnect dedup.
    pub sessions: Arc<SessionTable>,

    /// Room id → active tool + whiteboard snapshot.
    pub room_state: Arc<RoomStateStore>,

    /// Bounded public and private chat logs.
    pub chat: Arc<ChatStore>,

    // ── Persistence ───────────────────────────────────────────────────────
    /// Durable room documents (saved code and language).
    pub documents: Arc<dyn DocumentStore>,

    pub config: CoordinatorConfig,
}

impl CoordinatorState {
    pub fn new(config: CoordinatorConfig, documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new()),
            presence: Arc::new(PresenceRegistry::new()),
            sessions: Arc::new(SessionTable::new()),
            room_state: Arc::new(RoomStateStore::new()),
            chat: Arc::new(ChatStore::new(config.chat_history_limit)),
            documents,
            config,
        }
    }

    /// Drop every in-memory trace of a room: chat logs and ephemeral state.
    /// Presence and sessions are cleaned per-connection by the lifecycle
    /// handler, not here.
    pub fn purge_room(&self, room_id: &str) {
        self.chat.remove_room(room_id);
        self.room_state.remove(room_id);
    }
}

//! Session protocol message definitions.
//!
//! The coordinator speaks a simple JSON-over-WebSocket protocol. Every frame
//! is an envelope of the form `{"event": "<name>", "data": <payload>}`; the
//! event names are the wire contract shared with the Tandem frontend and must
//! not change. Whiteboard path objects are opaque to the coordinator and are
//! carried as raw JSON values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Client → Coordinator ──────────────────────────────────────────────────────

/// Events sent from a client to the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Join a room under a display name. The room must already exist in the
    /// document store; joining an unknown room yields `room-error`.
    JoinRoom { room_id: String, username: String },

    /// Replace the shared editor content and persist it.
    CodeChange { room_id: String, content: String },

    /// Switch the shared editor language and persist it.
    LanguageChange { room_id: String, language: String },

    /// Report the sender's cursor position to the rest of the room.
    CursorChange {
        room_id: String,
        cursor: Value,
        #[serde(default)]
        user_id: Option<String>,
        username: String,
    },

    /// Switch the room's active tool. A forced switch is authoritative —
    /// every participant's view must follow it.
    SwitchTool {
        room_id: String,
        tool: Tool,
        username: String,
        #[serde(default)]
        is_forced: bool,
    },

    /// Post a public chat message to the room.
    SendChatMessage { room_id: String, message: ChatMessage },

    /// Send a private chat message to another participant.
    SendPrivateMessage { room_id: String, message: ChatMessage },

    /// Fetch the private conversation with another participant.
    LoadPrivateConversation { room_id: String, other_user_id: String },

    /// Fetch the room's public chat history.
    LoadPublicMessages { room_id: String },

    /// Replace the room's whiteboard snapshot and relay it.
    WhiteboardDraw { room_id: String, data: WhiteboardFrame },

    /// Clear the room's whiteboard.
    WhiteboardClear { room_id: String },

    /// Attach to the room's broadcast group for whiteboard updates without
    /// registering as a tracked participant.
    WhiteboardJoin { room_id: String },

    /// Request a summary of the room's live state.
    GetRoomInfo { room_id: String },

    /// Diagnostic: inspect the stored whiteboard snapshot.
    GetWhiteboardState { room_id: String },

    /// Leave a room explicitly (navigation away, not a dropped connection).
    LeaveRoom { room_id: String, username: String },
}

// ── Coordinator → Client ──────────────────────────────────────────────────────

/// Events sent from the coordinator to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Transport handshake, sent once immediately after the upgrade. Carries
    /// the connection id clients use in cursor and private-message payloads.
    SessionInit { connection_id: String },

    /// A join was rejected (unknown room or document store failure).
    RoomError { message: String },

    /// The room's current active tool, sent to a joiner. Always forced: the
    /// joiner must adopt it.
    ToolState { tool: Tool, is_forced: bool },

    /// Full roster of the room, in join order.
    UsersUpdate(Vec<Participant>),

    /// A new participant joined the room.
    UserJoined { username: String },

    /// A participant left the room.
    UserLeft { username: String },

    /// Persisted editor content and language, sent to a joiner.
    RestoreState { code: String, language: String },

    /// The room's whiteboard snapshot, sent to a joiner.
    WhiteboardState { paths: Vec<Value> },

    /// The room's public chat history, sent to a joiner.
    PublicChatHistory(Vec<ChatMessage>),

    /// Editor content changed.
    UpdateCode { content: String },

    /// Editor language changed.
    UpdateLanguage { language: String },

    /// A participant's cursor moved.
    UserCursorUpdate {
        cursor: Value,
        user_id: String,
        username: String,
    },

    /// A participant switched the room's tool.
    ToolSwitched {
        room_id: String,
        tool: Tool,
        username: String,
        is_forced: bool,
    },

    /// A public chat message.
    PublicMessage(ChatMessage),

    /// A private chat message addressed to this connection.
    PrivateMessageReceived(ChatMessage),

    /// Response to `load-private-conversation`.
    PrivateConversationHistory(Vec<ChatMessage>),

    /// Response to `load-public-messages`.
    PublicMessagesHistory(Vec<ChatMessage>),

    /// The whiteboard snapshot changed.
    WhiteboardUpdate { paths: Vec<Value> },

    /// The whiteboard was cleared.
    WhiteboardCleared,

    /// Response to `get-room-info`.
    RoomInfo {
        room_id: String,
        user_count: usize,
        tracked_users: Vec<String>,
        whiteboard_paths: usize,
        current_tool: String,
    },

    /// Response to `get-whiteboard-state`.
    WhiteboardDebug {
        has_state: bool,
        path_count: usize,
        state: Option<Vec<Value>>,
    },
}

// ── Supporting Types ──────────────────────────────────────────────────────────

/// A tracked room participant. The id is the connection id; the name is the
/// user-supplied display name (not unique).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
}

/// The workspace tool a room is focused on. The tool set is open: names the
/// coordinator does not know are carried through verbatim rather than
/// rejecting the whole frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Editor,
    Whiteboard,
    #[serde(untagged)]
    Other(String),
}

impl Tool {
    pub fn as_str(&self) -> &str {
        match self {
            Tool::Editor => "editor",
            Tool::Whiteboard => "whiteboard",
            Tool::Other(name) => name,
        }
    }
}

/// A chat message, immutable once stored.
///
/// The `id` is caller-supplied and doubles as the dedup key and the sort key
/// for private conversations — clients prefix it with a millisecond
/// timestamp, so it is monotonically increasing per sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender: String,
    pub sender_id: String,
    #[serde(default)]
    pub recipient_id: Option<String>,
    pub content: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

/// Chat message visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Global,
    Private,
}

/// Whiteboard payload of a `whiteboard-draw` event. `paths` carries the full
/// snapshot; a frame without paths is relayed but not stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WhiteboardFrame {
    #[serde(default)]
    pub paths: Option<Vec<Value>>,
}

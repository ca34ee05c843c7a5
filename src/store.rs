//! Room document store.
//!
//! The durable half of a room: its identity and the last saved editor
//! contents. Everything else (presence, chat, whiteboard) is ephemeral and
//! lives in the coordinator's in-memory stores. The store is behind a trait
//! so the coordinator never cares what backs it; the bundled implementation
//! keeps documents in memory.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

/// A room's durable record.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomDocument {
    pub room_id: String,
    pub room_name: Option<String>,
    pub code: Option<String>,
    pub language: Option<String>,
}

impl RoomDocument {
    pub fn new(room_id: &str) -> Self {
        Self {
            room_id: room_id.to_string(),
            room_name: None,
            code: None,
            language: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("room {0} not found")]
    RoomNotFound(String),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Persistence seam for room documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a room's document, `None` when the room does not exist.
    async fn get_room(&self, room_id: &str) -> Result<Option<RoomDocument>, StoreError>;

    /// Create a room with no saved contents yet.
    async fn create_room(&self, room_id: &str) -> Result<RoomDocument, StoreError>;

    /// Save the latest editor contents, creating the document if the room is
    /// unknown (upsert).
    async fn upsert_code(&self, room_id: &str, code: &str) -> Result<(), StoreError>;

    /// Save the room's editor language (upsert).
    async fn upsert_language(&self, room_id: &str, language: &str) -> Result<(), StoreError>;

    /// Delete a room's document.
    async fn delete_room(&self, room_id: &str) -> Result<(), StoreError>;
}

/// In-memory `DocumentStore`.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    rooms: DashMap<String, RoomDocument>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_room(&self, room_id: &str) -> Result<Option<RoomDocument>, StoreError> {
        Ok(self.rooms.get(room_id).map(|doc| doc.clone()))
    }

    async fn create_room(&self, room_id: &str) -> Result<RoomDocument, StoreError> {
        let document = RoomDocument::new(room_id);
        self.rooms.insert(room_id.to_string(), document.clone());
        Ok(document)
    }

    async fn upsert_code(&self, room_id: &str, code: &str) -> Result<(), StoreError> {
        self.rooms
            .entry(room_id.to_string())
            .or_insert_with(|| RoomDocument::new(room_id))
            .code = Some(code.to_string());
        Ok(())
    }

    async fn upsert_language(&self, room_id: &str, language: &str) -> Result<(), StoreError> {
        self.rooms
            .entry(room_id.to_string())
            .or_insert_with(|| RoomDocument::new(room_id))
            .language = Some(language.to_string());
        Ok(())
    }

    async fn delete_room(&self, room_id: &str) -> Result<(), StoreError> {
        self.rooms.remove(room_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_get_room() {
        let store = InMemoryDocumentStore::new();

        store.create_room("abc123").await.unwrap();

        let document = store.get_room("abc123").await.unwrap().unwrap();
        assert_eq!(document.room_id, "abc123");
        assert_eq!(document.code, None);
        assert_eq!(document.language, None);
    }

    #[tokio::test]
    async fn test_get_unknown_room_is_none() {
        let store = InMemoryDocumentStore::new();
        assert!(store.get_room("nowhere").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_code_creates_missing_document() {
        let store = InMemoryDocumentStore::new();

        store.upsert_code("abc123", "fn main() {}").await.unwrap();

        let document = store.get_room("abc123").await.unwrap().unwrap();
        assert_eq!(document.code.as_deref(), Some("fn main() {}"));
    }

    #[tokio::test]
    async fn test_upserts_do_not_clobber_each_other() {
        let store = InMemoryDocumentStore::new();
        store.create_room("abc123").await.unwrap();

        store.upsert_code("abc123", "print('hi')").await.unwrap();
        store.upsert_language("abc123", "python").await.unwrap();

        let document = store.get_room("abc123").await.unwrap().unwrap();
        assert_eq!(document.code.as_deref(), Some("print('hi')"));
        assert_eq!(document.language.as_deref(), Some("python"));
    }

    #[tokio::test]
    async fn test_delete_room() {
        let store = InMemoryDocumentStore::new();
        store.create_room("abc123").await.unwrap();

        store.delete_room("abc123").await.unwrap();

        assert!(store.get_room("abc123").await.unwrap().is_none());
    }
}

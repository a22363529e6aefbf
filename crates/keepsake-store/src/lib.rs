//! Backend client adapter.
//!
//! Everything the application reads or writes goes through [`Backend`]: rows
//! for the three tables, blob storage for images, and a change feed that
//! tells live views when to re-fetch. The backend is built once at startup
//! and shared as a [`SharedBackend`].

pub mod feed;
pub mod hosted;
pub mod local;
pub mod storage;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

use keepsake_types::events::Table;
use keepsake_types::models::{Memory, NewMemory, NewNote, NewPhoto, Note, Photo};

pub use feed::{ChangeFeed, Notification, Subscription};

pub const PHOTOS_BUCKET: &str = "photos";
pub const MEMORIES_BUCKET: &str = "memories";

#[derive(Debug, Error)]
pub enum BackendError {
    /// The call itself failed: network, server or database error.
    #[error("backend request failed: {0}")]
    Transport(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// A constraint was violated (duplicate object, missing parent row).
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("invalid response: {0}")]
    Decode(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn is_ascending(self) -> bool {
        self == Self::Ascending
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Photos ordered by `created_at`.
    async fn list_photos(&self, order: SortOrder) -> BackendResult<Vec<Photo>>;
    async fn insert_photo(&self, photo: NewPhoto) -> BackendResult<Photo>;

    /// Memories ordered by `memory_date`, ties by `created_at`.
    async fn list_memories(&self, order: SortOrder) -> BackendResult<Vec<Memory>>;
    async fn insert_memory(&self, memory: NewMemory) -> BackendResult<Memory>;

    /// Notes ordered by `created_at`.
    async fn list_notes(&self, order: SortOrder) -> BackendResult<Vec<Note>>;
    async fn get_note(&self, id: Uuid) -> BackendResult<Option<Note>>;
    async fn insert_note(&self, note: NewNote) -> BackendResult<Note>;
    async fn update_note_message(&self, id: Uuid, message: &str) -> BackendResult<Note>;
    async fn delete_note(&self, id: Uuid) -> BackendResult<()>;

    /// Store an object. Never overwrites an existing one.
    async fn upload_blob(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> BackendResult<()>;

    fn public_url(&self, bucket: &str, path: &str) -> String;

    /// Register interest in changes to `tables`. Dropping the subscription
    /// releases it.
    fn subscribe(&self, tables: &[Table]) -> Subscription;
}

pub type SharedBackend = Arc<dyn Backend>;

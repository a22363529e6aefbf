use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{error, warn};
use uuid::Uuid;

use keepsake_db::Database;
use keepsake_db::models::{MemoryRow, NoteRow, PhotoRow};
use keepsake_types::events::{ChangeEvent, ChangeKind, Table};
use keepsake_types::models::{Memory, NewMemory, NewNote, NewPhoto, Note, Photo, Sender};

use crate::feed::{ChangeFeed, Subscription};
use crate::storage::Storage;
use crate::{Backend, BackendError, BackendResult, SortOrder};

/// Self-hosted backend: SQLite rows, blobs on local disk, in-process change
/// feed. Blobs are expected to be served under `{public_base}/storage/`.
pub struct LocalBackend {
    db: Arc<Database>,
    storage: Storage,
    feed: ChangeFeed,
    public_base: String,
}

impl LocalBackend {
    pub async fn open(
        db_path: &Path,
        storage_dir: PathBuf,
        public_base: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let db = Database::open(db_path)?;
        let storage = Storage::new(storage_dir).await?;
        Ok(Self::from_parts(db, storage, public_base))
    }

    pub fn from_parts(db: Database, storage: Storage, public_base: impl Into<String>) -> Self {
        Self {
            db: Arc::new(db),
            storage,
            feed: ChangeFeed::new(),
            public_base: public_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn storage_root(&self) -> &Path {
        self.storage.root()
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Run blocking DB work off the async runtime.
    async fn blocking<F, T>(&self, f: F) -> BackendResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                BackendError::Transport(e.to_string())
            })?
            .map_err(db_error)
    }

    fn changed(&self, table: Table, kind: ChangeKind) {
        self.feed.publish(ChangeEvent { table, kind });
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn list_photos(&self, order: SortOrder) -> BackendResult<Vec<Photo>> {
        let rows = self.blocking(move |db| db.get_photos(order.is_ascending())).await?;
        Ok(rows.into_iter().filter_map(photo_from_row).collect())
    }

    async fn insert_photo(&self, photo: NewPhoto) -> BackendResult<Photo> {
        let id = Uuid::new_v4().to_string();
        let row = self
            .blocking(move |db| {
                db.insert_photo(&id, &photo.file_path, &photo.file_name, photo.caption.as_deref())
            })
            .await?;
        let photo = photo_from_row(row).ok_or_else(|| corrupt("photos"))?;
        self.changed(Table::Photos, ChangeKind::Insert);
        Ok(photo)
    }

    async fn list_memories(&self, order: SortOrder) -> BackendResult<Vec<Memory>> {
        let rows = self.blocking(move |db| db.get_memories(order.is_ascending())).await?;
        Ok(rows.into_iter().filter_map(memory_from_row).collect())
    }

    async fn insert_memory(&self, memory: NewMemory) -> BackendResult<Memory> {
        let id = Uuid::new_v4().to_string();
        let date = memory.memory_date.format("%Y-%m-%d").to_string();
        let row = self
            .blocking(move |db| {
                db.insert_memory(
                    &id,
                    &memory.photo_url,
                    &memory.caption,
                    memory.description.as_deref(),
                    &date,
                )
            })
            .await?;
        let memory = memory_from_row(row).ok_or_else(|| corrupt("memories"))?;
        self.changed(Table::Memories, ChangeKind::Insert);
        Ok(memory)
    }

    async fn list_notes(&self, order: SortOrder) -> BackendResult<Vec<Note>> {
        let rows = self.blocking(move |db| db.get_notes(order.is_ascending())).await?;
        Ok(rows.into_iter().filter_map(note_from_row).collect())
    }

    async fn get_note(&self, id: Uuid) -> BackendResult<Option<Note>> {
        let row = self.blocking(move |db| db.get_note(&id.to_string())).await?;
        Ok(row.and_then(note_from_row))
    }

    async fn insert_note(&self, note: NewNote) -> BackendResult<Note> {
        let id = Uuid::new_v4().to_string();
        let row = self
            .blocking(move |db| {
                let parent = note.parent_id.map(|p| p.to_string());
                db.insert_note(&id, note.sender.as_str(), &note.message, parent.as_deref())
            })
            .await?;
        let note = note_from_row(row).ok_or_else(|| corrupt("notes"))?;
        self.changed(Table::Notes, ChangeKind::Insert);
        Ok(note)
    }

    async fn update_note_message(&self, id: Uuid, message: &str) -> BackendResult<Note> {
        let message = message.to_string();
        let row = self
            .blocking(move |db| db.update_note_message(&id.to_string(), &message))
            .await?
            .ok_or_else(|| BackendError::NotFound(format!("note {}", id)))?;
        let note = note_from_row(row).ok_or_else(|| corrupt("notes"))?;
        self.changed(Table::Notes, ChangeKind::Update);
        Ok(note)
    }

    async fn delete_note(&self, id: Uuid) -> BackendResult<()> {
        let removed = self.blocking(move |db| db.delete_note(&id.to_string())).await?;
        if !removed {
            return Err(BackendError::NotFound(format!("note {}", id)));
        }
        self.changed(Table::Notes, ChangeKind::Delete);
        Ok(())
    }

    async fn upload_blob(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        _content_type: &str,
    ) -> BackendResult<()> {
        self.storage
            .put_object(bucket, path, &bytes)
            .await
            .map(|_| ())
            .map_err(|e| match e.downcast_ref::<std::io::Error>() {
                Some(io) if io.kind() == std::io::ErrorKind::AlreadyExists => {
                    BackendError::Conflict(format!("object {}/{} already exists", bucket, path))
                }
                _ => BackendError::Storage(e.to_string()),
            })
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/{}/{}", self.public_base, bucket, path)
    }

    fn subscribe(&self, tables: &[Table]) -> Subscription {
        self.feed.subscribe(tables)
    }
}

/// Constraint violations become conflicts; everything else is a failed call.
fn db_error(e: anyhow::Error) -> BackendError {
    match e.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            BackendError::Conflict(e.to_string())
        }
        _ => {
            error!("Database error: {}", e);
            BackendError::Transport(e.to_string())
        }
    }
}

fn corrupt(table: &str) -> BackendError {
    BackendError::Decode(format!("unreadable row written to {}", table))
}

fn parse_timestamp(raw: &str, id: &str) -> Option<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by hand may use SQLite's "YYYY-MM-DD HH:MM:SS" without timezone.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| warn!("Corrupt created_at '{}' on row '{}': {}", raw, id, e))
        .ok()
}

fn parse_id(raw: &str, column: &str) -> Option<Uuid> {
    raw.parse::<Uuid>()
        .map_err(|e| warn!("Corrupt {} '{}': {}", column, raw, e))
        .ok()
}

fn photo_from_row(row: PhotoRow) -> Option<Photo> {
    Some(Photo {
        id: parse_id(&row.id, "photo id")?,
        created_at: parse_timestamp(&row.created_at, &row.id)?,
        file_path: row.file_path,
        file_name: row.file_name,
        caption: row.caption,
    })
}

fn memory_from_row(row: MemoryRow) -> Option<Memory> {
    let memory_date = NaiveDate::parse_from_str(&row.memory_date, "%Y-%m-%d")
        .map_err(|e| warn!("Corrupt memory_date '{}' on memory '{}': {}", row.memory_date, row.id, e))
        .ok()?;
    Some(Memory {
        id: parse_id(&row.id, "memory id")?,
        created_at: parse_timestamp(&row.created_at, &row.id)?,
        memory_date,
        photo_url: row.photo_url,
        caption: row.caption,
        description: row.description,
    })
}

fn note_from_row(row: NoteRow) -> Option<Note> {
    let sender = row
        .sender
        .parse::<Sender>()
        .map_err(|_| warn!("Unknown sender '{}' on note '{}'", row.sender, row.id))
        .ok()?;
    let parent_id = match row.parent_id.as_deref() {
        Some(raw) => Some(parse_id(raw, "parent_id")?),
        None => None,
    };
    Some(Note {
        id: parse_id(&row.id, "note id")?,
        created_at: parse_timestamp(&row.created_at, &row.id)?,
        sender,
        message: row.message,
        parent_id,
    })
}

use crate::models::{MemoryRow, NoteRow, PhotoRow};
use crate::Database;
use anyhow::{Result, anyhow};
use rusqlite::{Connection, Row};

const PHOTO_COLUMNS: &str = "id, file_path, file_name, caption, created_at";
const MEMORY_COLUMNS: &str = "id, photo_url, caption, description, memory_date, created_at";
const NOTE_COLUMNS: &str = "id, sender, message, parent_id, created_at";

impl Database {
    // -- Photos --

    pub fn insert_photo(
        &self,
        id: &str,
        file_path: &str,
        file_name: &str,
        caption: Option<&str>,
    ) -> Result<PhotoRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO photos (id, file_path, file_name, caption) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, file_path, file_name, caption],
            )?;
            query_one(conn, &format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ?1"), id, photo_row)?
                .ok_or_else(|| anyhow!("Photo vanished after insert: {}", id))
        })
    }

    pub fn get_photos(&self, ascending: bool) -> Result<Vec<PhotoRow>> {
        let sql = format!(
            "SELECT {PHOTO_COLUMNS} FROM photos ORDER BY created_at {dir}, rowid {dir}",
            dir = direction(ascending)
        );
        self.with_conn(|conn| query_all(conn, &sql, photo_row))
    }

    // -- Memories --

    pub fn insert_memory(
        &self,
        id: &str,
        photo_url: &str,
        caption: &str,
        description: Option<&str>,
        memory_date: &str,
    ) -> Result<MemoryRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO memories (id, photo_url, caption, description, memory_date)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, photo_url, caption, description, memory_date],
            )?;
            query_one(conn, &format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?1"), id, memory_row)?
                .ok_or_else(|| anyhow!("Memory vanished after insert: {}", id))
        })
    }

    /// Memories ordered by the day they happened, then by creation time.
    pub fn get_memories(&self, ascending: bool) -> Result<Vec<MemoryRow>> {
        let sql = format!(
            "SELECT {MEMORY_COLUMNS} FROM memories
             ORDER BY memory_date {dir}, created_at {dir}, rowid {dir}",
            dir = direction(ascending)
        );
        self.with_conn(|conn| query_all(conn, &sql, memory_row))
    }

    // -- Notes --

    pub fn insert_note(
        &self,
        id: &str,
        sender: &str,
        message: &str,
        parent_id: Option<&str>,
    ) -> Result<NoteRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notes (id, sender, message, parent_id) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, sender, message, parent_id],
            )?;
            query_one(conn, &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"), id, note_row)?
                .ok_or_else(|| anyhow!("Note vanished after insert: {}", id))
        })
    }

    pub fn get_notes(&self, ascending: bool) -> Result<Vec<NoteRow>> {
        let sql = format!(
            "SELECT {NOTE_COLUMNS} FROM notes ORDER BY created_at {dir}, rowid {dir}",
            dir = direction(ascending)
        );
        self.with_conn(|conn| query_all(conn, &sql, note_row))
    }

    pub fn get_note(&self, id: &str) -> Result<Option<NoteRow>> {
        self.with_conn(|conn| {
            query_one(conn, &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"), id, note_row)
        })
    }

    /// Edit a note in place. Returns `None` when no such note exists.
    pub fn update_note_message(&self, id: &str, message: &str) -> Result<Option<NoteRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notes SET message = ?2 WHERE id = ?1",
                rusqlite::params![id, message],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_one(conn, &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"), id, note_row)
        })
    }

    /// Delete a single note. Fails with a constraint error while replies still
    /// reference it. Returns whether a row was removed.
    pub fn delete_note(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM notes WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }
}

fn direction(ascending: bool) -> &'static str {
    if ascending { "ASC" } else { "DESC" }
}

fn query_all<T>(
    conn: &Connection,
    sql: &str,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], map)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_one<T>(
    conn: &Connection,
    sql: &str,
    id: &str,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    stmt.query_row([id], map).optional()
}

fn photo_row(row: &Row<'_>) -> rusqlite::Result<PhotoRow> {
    Ok(PhotoRow {
        id: row.get(0)?,
        file_path: row.get(1)?,
        file_name: row.get(2)?,
        caption: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn memory_row(row: &Row<'_>) -> rusqlite::Result<MemoryRow> {
    Ok(MemoryRow {
        id: row.get(0)?,
        photo_url: row.get(1)?,
        caption: row.get(2)?,
        description: row.get(3)?,
        memory_date: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn note_row(row: &Row<'_>) -> rusqlite::Result<NoteRow> {
    Ok(NoteRow {
        id: row.get(0)?,
        sender: row.get(1)?,
        message: row.get(2)?,
        parent_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn id() -> String {
        Uuid::new_v4().to_string()
    }

    #[test]
    fn notes_come_back_in_insert_order() {
        let db = Database::open_in_memory().unwrap();
        let ids: Vec<String> = (0..5).map(|_| id()).collect();
        for (i, nid) in ids.iter().enumerate() {
            db.insert_note(nid, "harini", &format!("note {}", i), None).unwrap();
        }

        let asc: Vec<String> = db.get_notes(true).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(asc, ids);

        let mut desc: Vec<String> = db.get_notes(false).unwrap().into_iter().map(|r| r.id).collect();
        desc.reverse();
        assert_eq!(desc, ids);
    }

    #[test]
    fn reply_requires_existing_parent() {
        let db = Database::open_in_memory().unwrap();
        let err = db.insert_note(&id(), "deva", "orphan", Some(&id()));
        assert!(err.is_err());
    }

    #[test]
    fn sender_is_constrained() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_note(&id(), "stranger", "hi", None).is_err());
    }

    #[test]
    fn delete_is_blocked_while_replies_exist() {
        let db = Database::open_in_memory().unwrap();
        let root = id();
        let reply = id();
        db.insert_note(&root, "harini", "root", None).unwrap();
        db.insert_note(&reply, "deva", "reply", Some(&root)).unwrap();

        assert!(db.delete_note(&root).is_err());
        assert!(db.delete_note(&reply).unwrap());
        assert!(db.delete_note(&root).unwrap());
        assert!(!db.delete_note(&root).unwrap());
    }

    #[test]
    fn update_missing_note_returns_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.update_note_message(&id(), "edited").unwrap().is_none());

        let nid = id();
        db.insert_note(&nid, "deva", "first", None).unwrap();
        let row = db.update_note_message(&nid, "edited").unwrap().unwrap();
        assert_eq!(row.message, "edited");
    }

    #[test]
    fn memories_sort_by_memory_date() {
        let db = Database::open_in_memory().unwrap();
        db.insert_memory(&id(), "u1", "older", None, "2023-05-01").unwrap();
        db.insert_memory(&id(), "u2", "newer", Some("beach"), "2024-01-09").unwrap();
        db.insert_memory(&id(), "u3", "middle", None, "2023-11-30").unwrap();

        let captions: Vec<String> = db
            .get_memories(false)
            .unwrap()
            .into_iter()
            .map(|r| r.caption)
            .collect();
        assert_eq!(captions, vec!["newer", "middle", "older"]);
    }

    #[test]
    fn photo_roundtrip_keeps_null_caption() {
        let db = Database::open_in_memory().unwrap();
        let row = db.insert_photo(&id(), "http://x/p.jpg", "p.jpg", None).unwrap();
        assert!(row.caption.is_none());
        assert!(row.created_at.ends_with('Z'));
        assert_eq!(db.get_photos(false).unwrap().len(), 1);
    }

    #[test]
    fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keepsake.db");
        {
            let db = Database::open(&path).unwrap();
            db.insert_note(&id(), "harini", "persisted", None).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.get_notes(true).unwrap().len(), 1);
    }
}

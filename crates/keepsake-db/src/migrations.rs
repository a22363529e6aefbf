use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Millisecond UTC timestamps in RFC 3339 form, so rows created within the
/// same second still sort in creation order.
const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (photos, memories, notes)");
        conn.execute_batch(&format!(
            "
            CREATE TABLE photos (
                id          TEXT PRIMARY KEY,
                file_path   TEXT NOT NULL,
                file_name   TEXT NOT NULL,
                caption     TEXT,
                created_at  TEXT NOT NULL DEFAULT ({NOW})
            );

            CREATE INDEX idx_photos_created ON photos(created_at);

            CREATE TABLE memories (
                id           TEXT PRIMARY KEY,
                photo_url    TEXT NOT NULL,
                caption      TEXT NOT NULL,
                description  TEXT,
                memory_date  TEXT NOT NULL,
                created_at   TEXT NOT NULL DEFAULT ({NOW})
            );

            CREATE INDEX idx_memories_date ON memories(memory_date, created_at);

            CREATE TABLE notes (
                id          TEXT PRIMARY KEY,
                sender      TEXT NOT NULL CHECK (sender IN ('harini', 'deva')),
                message     TEXT NOT NULL,
                parent_id   TEXT REFERENCES notes(id),
                created_at  TEXT NOT NULL DEFAULT ({NOW})
            );

            CREATE INDEX idx_notes_created ON notes(created_at);
            CREATE INDEX idx_notes_parent ON notes(parent_id);

            INSERT INTO schema_version (version) VALUES (1);
            "
        ))?;
    }

    info!("Database migrations complete");
    Ok(())
}

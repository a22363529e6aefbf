/// Database row types. These map directly to SQLite rows.
/// Distinct from keepsake-types models to keep the DB layer independent.

#[derive(Debug, Clone)]
pub struct PhotoRow {
    pub id: String,
    pub file_path: String,
    pub file_name: String,
    pub caption: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MemoryRow {
    pub id: String,
    pub photo_url: String,
    pub caption: String,
    pub description: Option<String>,
    pub memory_date: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NoteRow {
    pub id: String,
    pub sender: String,
    pub message: String,
    pub parent_id: Option<String>,
    pub created_at: String,
}

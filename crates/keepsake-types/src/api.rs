use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Note, Photo};

// -- Notes --

/// `sender` stays a plain optional string so an unknown, null or missing
/// value surfaces as a validation error instead of a deserialization failure.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendNoteRequest {
    #[serde(default)]
    pub sender: Option<String>,
    pub message: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditNoteRequest {
    pub message: String,
}

/// One note of the flattened thread, in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadedNote {
    #[serde(flatten)]
    pub note: Note,
    pub depth: usize,
    pub reply_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadResponse {
    pub notes: Vec<ThreadedNote>,
    /// Notes whose parent no longer exists; they are not part of `notes`.
    pub dropped: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteNoteResponse {
    pub deleted: usize,
}

// -- Uploads --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadFailure {
    pub file_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadReport {
    pub uploaded: usize,
    pub photos: Vec<Photo>,
    pub failures: Vec<UploadFailure>,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

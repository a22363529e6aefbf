use chrono::NaiveDate;
use thiserror::Error;

use crate::models::Sender;

/// Longest accepted note, in characters (not bytes).
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Input rejected before anything is written to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("sender must be selected")]
    SenderNotSelected,
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message is too long")]
    MessageTooLong,
    #[error("caption cannot be empty")]
    EmptyCaption,
    #[error("memory date must be YYYY-MM-DD")]
    InvalidDate,
    #[error("select at least one photo")]
    NoFiles,
    #[error("missing field: {0}")]
    MissingField(&'static str),
}

/// A note that passed validation: known sender, trimmed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    pub sender: Sender,
    pub message: String,
}

pub fn validate_note(sender: &str, message: &str) -> Result<NoteDraft, ValidationError> {
    let sender = sender.parse::<Sender>()?;
    let message = validate_message(message)?;
    Ok(NoteDraft { sender, message })
}

/// Trim and length-check a message body.
pub fn validate_message(message: &str) -> Result<String, ValidationError> {
    let trimmed = message.trim();
    match trimmed.chars().count() {
        0 => Err(ValidationError::EmptyMessage),
        n if n > MAX_MESSAGE_CHARS => Err(ValidationError::MessageTooLong),
        _ => Ok(trimmed.to_string()),
    }
}

pub fn validate_caption(caption: &str) -> Result<String, ValidationError> {
    let trimmed = caption.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyCaption);
    }
    Ok(trimmed.to_string())
}

pub fn parse_memory_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate)
}

/// Empty or whitespace-only optional text becomes `None`.
pub fn optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

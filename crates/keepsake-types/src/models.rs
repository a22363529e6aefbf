use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validate::ValidationError;

/// The two people who write notes to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Harini,
    Deva,
}

impl Sender {
    pub const ALL: [Sender; 2] = [Sender::Harini, Sender::Deva];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Harini => "harini",
            Self::Deva => "deva",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sender {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|sender| sender.as_str() == s)
            .ok_or(ValidationError::SenderNotSelected)
    }
}

/// A gallery photo. Created on upload, never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: Uuid,
    /// Public URL of the stored image.
    pub file_path: String,
    pub file_name: String,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub photo_url: String,
    pub caption: String,
    pub description: Option<String>,
    /// The day the memory happened, picked by the user.
    pub memory_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// A single chat message. `parent_id` of `None` means a root note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub sender: Sender,
    pub message: String,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// -- Insert payloads --

#[derive(Debug, Clone, Serialize)]
pub struct NewPhoto {
    pub file_path: String,
    pub file_name: String,
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewMemory {
    pub photo_url: String,
    pub caption: String,
    pub description: Option<String>,
    pub memory_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewNote {
    pub sender: Sender,
    pub message: String,
    pub parent_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_parses_only_known_names() {
        assert_eq!("harini".parse::<Sender>(), Ok(Sender::Harini));
        assert_eq!("deva".parse::<Sender>(), Ok(Sender::Deva));
        assert_eq!("Deva".parse::<Sender>(), Err(ValidationError::SenderNotSelected));
        assert_eq!("".parse::<Sender>(), Err(ValidationError::SenderNotSelected));
    }

    #[test]
    fn note_serializes_sender_lowercase() {
        let note = Note {
            id: Uuid::nil(),
            sender: Sender::Deva,
            message: "hi".into(),
            parent_id: None,
            created_at: DateTime::default(),
        };
        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["sender"], "deva");
        assert!(json["parent_id"].is_null());
    }
}

use serde::{Deserialize, Serialize};

use crate::api::ThreadResponse;
use crate::models::{Memory, Photo};

/// Backend tables that emit change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Photos,
    Memories,
    Notes,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photos => "photos",
            Self::Memories => "memories",
            Self::Notes => "notes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// "Something in `table` changed." Carries no row data; consumers re-fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
}

/// A list a client can keep live over the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Gallery,
    Memories,
    Notes,
}

impl View {
    pub const ALL: [View; 3] = [View::Gallery, View::Memories, View::Notes];

    /// The table whose changes invalidate this view.
    pub fn table(&self) -> Table {
        match self {
            Self::Gallery => Table::Photos,
            Self::Memories => Table::Memories,
            Self::Notes => Table::Notes,
        }
    }
}

/// Full contents of a view, replacing whatever the client had.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "items", rename_all = "lowercase")]
pub enum ViewData {
    Gallery(Vec<Photo>),
    Memories(Vec<Memory>),
    Notes(ThreadResponse),
}

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Connection accepted; lists the views that can be watched
    Ready { views: Vec<View> },

    /// Fresh contents of a watched view
    Snapshot { view: View, data: ViewData },

    /// Loading a watched view failed; the previous snapshot is still current
    ViewError { view: View, message: String },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Start receiving snapshots for a view
    Watch { view: View },

    /// Stop receiving snapshots for a view
    Unwatch { view: View },
}

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use keepsake_store::{Backend, BackendError, SortOrder};
use keepsake_types::api::{DeleteNoteResponse, EditNoteRequest, SendNoteRequest, ThreadResponse};
use keepsake_types::models::{NewNote, Note};
use keepsake_types::validate::{validate_message, validate_note};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::thread::{Forest, subtree_ids};

/// Fetch every note and arrange them into threads, oldest first.
pub async fn load_thread(backend: &dyn Backend) -> ApiResult<ThreadResponse> {
    let notes = backend.list_notes(SortOrder::Ascending).await?;
    let forest = Forest::organize(notes);
    debug!("Loaded {} notes ({} dropped)", forest.len(), forest.dropped().len());
    Ok(forest.into_response())
}

/// Post a root note, or a reply when `parent_id` is set.
pub async fn send_note(backend: &dyn Backend, req: SendNoteRequest) -> ApiResult<Note> {
    let draft = validate_note(req.sender.as_deref().unwrap_or_default(), &req.message)?;

    if let Some(parent) = req.parent_id {
        if backend.get_note(parent).await?.is_none() {
            return Err(ApiError::NotFound("parent note"));
        }
    }

    let note = backend
        .insert_note(NewNote {
            sender: draft.sender,
            message: draft.message,
            parent_id: req.parent_id,
        })
        .await?;
    info!("{} posted note {}", note.sender, note.id);
    Ok(note)
}

/// Replace a note's message. Sender, parent and timestamp stay as they were.
pub async fn edit_note(backend: &dyn Backend, id: Uuid, message: &str) -> ApiResult<Note> {
    let message = validate_message(message)?;
    Ok(backend.update_note_message(id, &message).await?)
}

/// Delete a note and all of its replies, leaves first. Returns how many
/// notes were removed.
pub async fn delete_note(backend: &dyn Backend, id: Uuid) -> ApiResult<usize> {
    if backend.get_note(id).await?.is_none() {
        return Err(ApiError::NotFound("note"));
    }

    let notes = backend.list_notes(SortOrder::Ascending).await?;
    let mut deleted: usize = 0;
    for target in subtree_ids(&notes, id).into_iter().rev() {
        match backend.delete_note(target).await {
            Ok(()) => deleted += 1,
            // Someone else got there first
            Err(BackendError::NotFound(_)) => warn!("Note {} already gone", target),
            Err(e) => return Err(e.into()),
        }
    }
    info!("Deleted note {} with {} replies", id, deleted.saturating_sub(1));
    Ok(deleted)
}

// -- Handlers --

pub async fn get_notes(State(state): State<AppState>) -> ApiResult<Json<ThreadResponse>> {
    Ok(Json(load_thread(state.backend.as_ref()).await?))
}

pub async fn post_note(
    State(state): State<AppState>,
    Json(req): Json<SendNoteRequest>,
) -> ApiResult<impl IntoResponse> {
    let note = send_note(state.backend.as_ref(), req).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn patch_note(
    State(state): State<AppState>,
    Path(note_id): Path<Uuid>,
    Json(req): Json<EditNoteRequest>,
) -> ApiResult<Json<Note>> {
    Ok(Json(edit_note(state.backend.as_ref(), note_id, &req.message).await?))
}

pub async fn remove_note(
    State(state): State<AppState>,
    Path(note_id): Path<Uuid>,
) -> ApiResult<Json<DeleteNoteResponse>> {
    let deleted = delete_note(state.backend.as_ref(), note_id).await?;
    Ok(Json(DeleteNoteResponse { deleted }))
}

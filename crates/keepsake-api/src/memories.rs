use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, info};

use keepsake_store::{Backend, MEMORIES_BUCKET, SortOrder};
use keepsake_types::models::{Memory, NewMemory};
use keepsake_types::validate::{
    ValidationError, optional_text, parse_memory_date, validate_caption,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::upload::{UploadFile, check_image, multipart_error, read_file, store_image};

/// Fields of the memory form, as sent.
#[derive(Debug, Default)]
pub struct MemoryForm {
    pub photo: Option<UploadFile>,
    pub caption: Option<String>,
    pub description: Option<String>,
    pub memory_date: Option<String>,
}

/// Memories, most recent `memory_date` first.
pub async fn list_memories(backend: &dyn Backend) -> ApiResult<Vec<Memory>> {
    Ok(backend.list_memories(SortOrder::Descending).await?)
}

/// Validate the form, upload its photo, then record the memory. Nothing is
/// written when the form is invalid.
pub async fn create_memory(backend: &dyn Backend, form: MemoryForm) -> ApiResult<Memory> {
    let caption = validate_caption(
        form.caption
            .as_deref()
            .ok_or(ValidationError::MissingField("caption"))?,
    )?;
    let memory_date = parse_memory_date(
        form.memory_date
            .as_deref()
            .ok_or(ValidationError::MissingField("memory_date"))?,
    )?;
    let photo = form.photo.ok_or(ValidationError::MissingField("photo"))?;
    check_image(&photo).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let photo_url = store_image(backend, MEMORIES_BUCKET, &photo).await?;
    let memory = backend
        .insert_memory(NewMemory {
            photo_url,
            caption,
            description: optional_text(form.description.as_deref()),
            memory_date,
        })
        .await?;
    info!("Created memory {} for {}", memory.id, memory.memory_date);
    Ok(memory)
}

async fn read_memory_form(mut multipart: Multipart) -> ApiResult<MemoryForm> {
    let mut form = MemoryForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("photo") => form.photo = Some(read_file(field).await?),
            Some("caption") => form.caption = Some(field.text().await.map_err(multipart_error)?),
            Some("description") => {
                form.description = Some(field.text().await.map_err(multipart_error)?)
            }
            Some("memory_date") => {
                form.memory_date = Some(field.text().await.map_err(multipart_error)?)
            }
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }
    Ok(form)
}

pub async fn get_memories(State(state): State<AppState>) -> ApiResult<Json<Vec<Memory>>> {
    Ok(Json(list_memories(state.backend.as_ref()).await?))
}

/// POST /memories
pub async fn post_memory(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let form = read_memory_form(multipart).await?;
    let memory = create_memory(state.backend.as_ref(), form).await?;
    Ok((StatusCode::CREATED, Json(memory)))
}

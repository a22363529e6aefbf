use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, info, warn};

use keepsake_store::{Backend, BackendError, PHOTOS_BUCKET};
use keepsake_types::api::{UploadFailure, UploadReport};
use keepsake_types::models::{NewPhoto, Photo};
use keepsake_types::validate::{ValidationError, optional_text};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// 50 MB per image
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

/// One file taken from an upload form.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
    pub caption: Option<String>,
}

/// Why a single file of a batch was not stored.
#[derive(Debug, Error)]
pub enum RejectedFile {
    #[error("only image files are allowed")]
    NotAnImage,
    #[error("file is empty")]
    Empty,
    #[error("file exceeds 50 MB")]
    TooLarge,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub fn check_image(file: &UploadFile) -> Result<(), RejectedFile> {
    if !file.content_type.starts_with("image/") {
        return Err(RejectedFile::NotAnImage);
    }
    if file.bytes.is_empty() {
        return Err(RejectedFile::Empty);
    }
    if file.bytes.len() > MAX_IMAGE_BYTES {
        return Err(RejectedFile::TooLarge);
    }
    Ok(())
}

/// Keep `[A-Za-z0-9.-]`, replace everything else with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    // A name made only of dots would resolve to a directory
    if cleaned.chars().all(|c| c == '.') {
        "image".to_string()
    } else {
        cleaned
    }
}

/// Collision-resistant object name: `{unix_millis}-{8 hex}-{sanitized}`.
pub fn storage_name(file_name: &str) -> String {
    format!(
        "{}-{:08x}-{}",
        chrono::Utc::now().timestamp_millis(),
        rand::random::<u32>(),
        sanitize_file_name(file_name)
    )
}

/// Upload the bytes under a fresh name and return their public URL.
pub async fn store_image(
    backend: &dyn Backend,
    bucket: &str,
    file: &UploadFile,
) -> Result<String, BackendError> {
    let path = storage_name(&file.file_name);
    backend
        .upload_blob(bucket, &path, file.bytes.clone(), &file.content_type)
        .await?;
    Ok(backend.public_url(bucket, &path))
}

async fn upload_one(backend: &dyn Backend, file: &UploadFile) -> Result<Photo, RejectedFile> {
    check_image(file)?;
    let url = store_image(backend, PHOTOS_BUCKET, file).await?;
    let photo = backend
        .insert_photo(NewPhoto {
            file_path: url,
            file_name: file.file_name.clone(),
            caption: optional_text(file.caption.as_deref()),
        })
        .await?;
    Ok(photo)
}

/// Store every file that can be stored. A failing file is recorded in the
/// report and the rest of the batch carries on; nothing already stored is
/// rolled back.
pub async fn upload_photos(backend: &dyn Backend, files: Vec<UploadFile>) -> ApiResult<UploadReport> {
    if files.is_empty() {
        return Err(ValidationError::NoFiles.into());
    }

    let mut report = UploadReport::default();
    for file in &files {
        match upload_one(backend, file).await {
            Ok(photo) => {
                debug!("Stored {} as photo {}", file.file_name, photo.id);
                report.photos.push(photo);
            }
            Err(e) => {
                warn!("Upload of {} failed: {}", file.file_name, e);
                report.failures.push(UploadFailure {
                    file_name: file.file_name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    report.uploaded = report.photos.len();

    info!(
        "Photo batch: {} uploaded, {} failed",
        report.uploaded,
        report.failures.len()
    );
    Ok(report)
}

pub(crate) fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::BadRequest(e.body_text())
}

/// Read an uploaded file part.
pub(crate) async fn read_file(
    field: axum::extract::multipart::Field<'_>,
) -> ApiResult<UploadFile> {
    let file_name = field.file_name().unwrap_or("image").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field.bytes().await.map_err(multipart_error)?;
    Ok(UploadFile {
        file_name,
        content_type,
        bytes,
        caption: None,
    })
}

/// Collect `file` parts; a `caption` part belongs to the file before it.
async fn read_photo_form(mut multipart: Multipart) -> ApiResult<Vec<UploadFile>> {
    let mut files: Vec<UploadFile> = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => files.push(read_file(field).await?),
            Some("caption") => {
                let caption = field.text().await.map_err(multipart_error)?;
                match files.last_mut() {
                    Some(file) => file.caption = Some(caption),
                    None => debug!("Ignoring caption sent before any file"),
                }
            }
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }
    Ok(files)
}

/// POST /photos
pub async fn post_photos(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Response> {
    let files = read_photo_form(multipart).await?;
    let report = upload_photos(state.backend.as_ref(), files).await?;
    let status = if report.uploaded > 0 {
        StatusCode::CREATED
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    Ok((status, Json(report)).into_response())
}

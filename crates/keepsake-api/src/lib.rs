//! HTTP surface of keepsake: gallery, memories, threaded notes and uploads.

pub mod error;
pub mod gallery;
pub mod memories;
pub mod notes;
pub mod state;
pub mod thread;
pub mod upload;
pub mod views;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch},
};

pub use error::{ApiError, ApiResult};
pub use state::{AppState, AppStateInner};

/// Whole upload request: several images plus form overhead.
pub const MAX_UPLOAD_REQUEST_BYTES: usize = 200 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/photos",
            get(gallery::get_photos)
                .post(upload::post_photos)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_REQUEST_BYTES)),
        )
        .route(
            "/memories",
            get(memories::get_memories)
                .post(memories::post_memory)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_REQUEST_BYTES)),
        )
        .route("/notes", get(notes::get_notes).post(notes::post_note))
        .route(
            "/notes/{note_id}",
            patch(notes::patch_note).delete(notes::remove_note),
        )
        .with_state(state)
}

use axum::{
    Json,
    extract::{Query, State},
};
use rand::seq::SliceRandom;
use serde::Deserialize;

use keepsake_store::{Backend, SortOrder};
use keepsake_types::models::Photo;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct GalleryQuery {
    #[serde(default)]
    pub shuffle: bool,
}

/// All photos, newest first, or in random order when `shuffle` is set.
pub async fn list_photos(backend: &dyn Backend, shuffle: bool) -> ApiResult<Vec<Photo>> {
    let mut photos = backend.list_photos(SortOrder::Descending).await?;
    if shuffle {
        photos.shuffle(&mut rand::rng());
    }
    Ok(photos)
}

pub async fn get_photos(
    State(state): State<AppState>,
    Query(query): Query<GalleryQuery>,
) -> ApiResult<Json<Vec<Photo>>> {
    Ok(Json(list_photos(state.backend.as_ref(), query.shuffle).await?))
}

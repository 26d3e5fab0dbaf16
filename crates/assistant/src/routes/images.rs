//! Serves cached reply images to LINE.

use axum::{
    Router,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::imaging::JPEG_MIME;
use crate::state::AppState;

/// Create image routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/images/{id}", get(get_image))
}

/// Return a cached JPEG by ID.
///
/// Malformed and expired IDs are both reported as not found.
async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = Uuid::parse_str(&id).map_err(|_| AppError::NotFound("image".into()))?;

    let bytes = state
        .images()
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound("image".into()))?;

    Ok(([(header::CONTENT_TYPE, JPEG_MIME)], bytes))
}

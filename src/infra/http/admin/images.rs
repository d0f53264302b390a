use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::domain::entities::ImageRecord;
use crate::domain::images::ImageDraft;

use super::AdminState;
use crate::infra::http::error::ApiError;
use crate::infra::http::middleware::StaffIdentity;

/// Stored image plus the format derived from its file name.
#[derive(Debug, Serialize)]
pub(super) struct ImageView {
    #[serde(flatten)]
    image: ImageRecord,
    format: &'static str,
    mime_type: &'static str,
}

impl From<ImageRecord> for ImageView {
    fn from(image: ImageRecord) -> Self {
        let format = image.format();
        Self {
            format: format.name(),
            mime_type: format.mime_type(),
            image,
        }
    }
}

pub(super) async fn create_image(
    State(state): State<AdminState>,
    Extension(identity): Extension<StaffIdentity>,
    Json(draft): Json<ImageDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = identity.name().unwrap_or_default();
    let image = state.editorial.save_image(actor, None, draft).await?;
    Ok((StatusCode::CREATED, Json(ImageView::from(image))))
}

pub(super) async fn update_image(
    State(state): State<AdminState>,
    Extension(identity): Extension<StaffIdentity>,
    Path(id): Path<i64>,
    Json(draft): Json<ImageDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = identity.name().unwrap_or_default();
    let image = state.editorial.save_image(actor, Some(id), draft).await?;
    Ok(Json(ImageView::from(image)))
}

pub(super) async fn delete_image(
    State(state): State<AdminState>,
    Extension(identity): Extension<StaffIdentity>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = identity.name().unwrap_or_default();
    state.editorial.delete_image(actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

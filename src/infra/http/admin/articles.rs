use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::domain::articles::ArticleDraft;
use crate::domain::types::ContentStatus;

use super::AdminState;
use crate::infra::http::error::ApiError;
use crate::infra::http::middleware::StaffIdentity;

#[derive(Debug, Deserialize)]
pub(super) struct StatusChange {
    ids: Vec<i64>,
    status: ContentStatus,
}

pub(super) async fn create_article(
    State(state): State<AdminState>,
    Extension(identity): Extension<StaffIdentity>,
    Json(draft): Json<ArticleDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = identity.name().unwrap_or_default();
    let article = state.editorial.save_article(actor, None, draft).await?;
    Ok((StatusCode::CREATED, Json(article)))
}

pub(super) async fn update_article(
    State(state): State<AdminState>,
    Extension(identity): Extension<StaffIdentity>,
    Path(id): Path<i64>,
    Json(draft): Json<ArticleDraft>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = identity.name().unwrap_or_default();
    let article = state.editorial.save_article(actor, Some(id), draft).await?;
    Ok(Json(article))
}

pub(super) async fn delete_article(
    State(state): State<AdminState>,
    Extension(identity): Extension<StaffIdentity>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = identity.name().unwrap_or_default();
    state.editorial.delete_article(actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Bulk make-public / make-draft.
pub(super) async fn set_article_status(
    State(state): State<AdminState>,
    Extension(identity): Extension<StaffIdentity>,
    Json(change): Json<StatusChange>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = identity.name().unwrap_or_default();
    let updated = state
        .editorial
        .set_article_status(actor, &change.ids, change.status)
        .await?;
    Ok(Json(updated))
}

use axum::Json;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::application::editorial::CreateCategoryCommand;

use super::AdminState;
use crate::infra::http::error::ApiError;
use crate::infra::http::middleware::StaffIdentity;

#[derive(Debug, Deserialize)]
pub(super) struct NewCategory {
    name: String,
    #[serde(default)]
    parent_id: Option<i64>,
}

pub(super) async fn create_category(
    State(state): State<AdminState>,
    Extension(identity): Extension<StaffIdentity>,
    Json(body): Json<NewCategory>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = identity.name().unwrap_or_default();
    let category = state
        .editorial
        .create_category(
            actor,
            CreateCategoryCommand {
                name: body.name,
                parent_id: body.parent_id,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

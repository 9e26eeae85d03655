use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{middleware::AuthUser, AppState};

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.users.get_user_by_id(user_id).await?;
    Ok(Json(profile))
}

/// Profile of the caller.
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.users.get_user_by_id(user_id).await?;
    Ok(Json(profile))
}

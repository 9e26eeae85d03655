use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::auth::{LoginRequest, MessageResponse, RefreshRequest, RegisterRequest},
    models::ClientInfo,
    utils::ValidatedJson,
    AppState,
};

/// Login with email or phone and password
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.auth.login(req, &client).await?;
    Ok((StatusCode::OK, Json(res)))
}

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.auth.register(req).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn refresh(
    State(state): State<AppState>,
    client: ClientInfo,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let res = state.auth.refresh(req, &client).await?;
    Ok((StatusCode::OK, Json(res)))
}

/// End the session named by the bearer token
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::unauthorized("MISSING_TOKEN", "Missing or invalid Authorization header")
        })?;

    state.auth.logout(bearer).await?;
    Ok((StatusCode::OK, Json(MessageResponse::new("Logged out successfully"))))
}

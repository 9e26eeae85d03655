use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::auth::MessageResponse,
    dtos::policy::{
        AssignRoleRequest, IdsRequest, PermissionRequest, ReloadResponse, ResourceRequest,
        RoleRequest, UserPermissionsResponse,
    },
    middleware::AuthUser,
    utils::ValidatedJson,
    AppState,
};

// ===== Roles =====

pub async fn create_role(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ValidatedJson(req): ValidatedJson<RoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let role = state.policy.add_role(req).await?;
    tracing::info!(actor, role_id = role.role_id, "Role created via API");
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn update_role(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<RoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let role = state.policy.update_role(role_id, req).await?;
    Ok((StatusCode::OK, Json(role)))
}

pub async fn delete_role(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.policy.delete_role(role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign_permissions(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<IdsRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .policy
        .bulk_assign_permissions(role_id, &req.ids)
        .await?;
    Ok((StatusCode::OK, Json(MessageResponse::new("Permissions assigned"))))
}

pub async fn remove_permissions(
    State(state): State<AppState>,
    Path(role_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<IdsRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .policy
        .bulk_remove_permissions(role_id, &req.ids)
        .await?;
    Ok((StatusCode::OK, Json(MessageResponse::new("Permissions removed"))))
}

// ===== Permissions =====

pub async fn create_permission(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<PermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let permission = state.policy.add_permission(req).await?;
    Ok((StatusCode::CREATED, Json(permission)))
}

pub async fn update_permission(
    State(state): State<AppState>,
    Path(permission_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<PermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let permission = state.policy.update_permission(permission_id, req).await?;
    Ok((StatusCode::OK, Json(permission)))
}

pub async fn delete_permission(
    State(state): State<AppState>,
    Path(permission_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.policy.delete_permission(permission_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assign_resources(
    State(state): State<AppState>,
    Path(permission_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<IdsRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .policy
        .bulk_assign_resources(permission_id, &req.ids)
        .await?;
    Ok((StatusCode::OK, Json(MessageResponse::new("Resources assigned"))))
}

pub async fn remove_resources(
    State(state): State<AppState>,
    Path(permission_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<IdsRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .policy
        .bulk_remove_resources(permission_id, &req.ids)
        .await?;
    Ok((StatusCode::OK, Json(MessageResponse::new("Resources removed"))))
}

// ===== Resources =====

pub async fn create_resource(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResourceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let resource = state.policy.add_resource(req).await?;
    Ok((StatusCode::CREATED, Json(resource)))
}

pub async fn update_resource(
    State(state): State<AppState>,
    Path(resource_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<ResourceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let resource = state.policy.update_resource(resource_id, req).await?;
    Ok((StatusCode::OK, Json(resource)))
}

pub async fn delete_resource(
    State(state): State<AppState>,
    Path(resource_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.policy.delete_resource(resource_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ===== User roles =====

pub async fn assign_user_role(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(req): Json<AssignRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.policy.assign_role(user_id, req.role_id).await?;
    Ok((StatusCode::OK, Json(MessageResponse::new("Role assigned"))))
}

pub async fn revoke_user_role(
    State(state): State<AppState>,
    Path((user_id, role_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    state.policy.revoke_role(user_id, role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn user_permissions(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let permissions = state.policy.get_user_permissions(user_id).await?;
    Ok(Json(UserPermissionsResponse {
        user_id,
        permissions,
    }))
}

pub async fn reload(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let rules = state.policy.reload().await?;
    Ok(Json(ReloadResponse { rules }))
}

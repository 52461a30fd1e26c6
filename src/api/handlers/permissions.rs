use crate::api::error::AppError;
use crate::entities::resource_permissions;
use crate::services::permission_service::{NewPermission, PermissionScope, PermissionUpdate};
use crate::utils::auth::AuthUser;
use crate::utils::validation::deserialize_some;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Deserialize, ToSchema, Validate)]
pub struct CreatePermissionRequest {
    /// Leave both ids empty to grant every signed-in user
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    /// `read` and `write` grant access; other labels are recorded only
    #[validate(length(min = 3, max = 100))]
    pub permission: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, ToSchema, Validate)]
pub struct UpdatePermissionRequest {
    #[validate(length(min = 3, max = 100))]
    pub permission: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<String>, format = DateTime, nullable)]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

#[derive(Serialize, ToSchema)]
pub struct PermissionResponse {
    pub id: String,
    pub resource_id: String,
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    pub permission: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub granted_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<resource_permissions::Model> for PermissionResponse {
    fn from(p: resource_permissions::Model) -> Self {
        let active = p.is_active(Utc::now());
        Self {
            id: p.id,
            resource_id: p.resource_id,
            user_id: p.user_id,
            group_id: p.group_id,
            permission: p.permission,
            expires_at: p.expires_at,
            active,
            granted_by: p.granted_by,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/resources/{id}/permissions",
    params(("id" = String, Path, description = "Resource ID")),
    request_body = CreatePermissionRequest,
    responses(
        (status = 201, description = "Permission granted", body = PermissionResponse),
        (status = 400, description = "Bad request"),
        (status = 403, description = "Not the owner or an admin")
    ),
    security(("jwt" = [])),
    tag = "permissions"
)]
pub async fn create_permission(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(resource_id): Path<String>,
    Json(req): Json<CreatePermissionRequest>,
) -> Result<(StatusCode, Json<PermissionResponse>), AppError> {
    req.validate()?;
    let scope = PermissionScope::from_parts(req.user_id, req.group_id)?;

    let grant = state
        .permissions
        .grant(
            &user,
            &resource_id,
            NewPermission {
                scope,
                permission: req.permission,
                expires_at: req.expires_at,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(grant.into())))
}

#[utoipa::path(
    get,
    path = "/resources/{id}/permissions",
    params(("id" = String, Path, description = "Resource ID")),
    responses(
        (status = 200, description = "Permission grants", body = Vec<PermissionResponse>),
        (status = 403, description = "Not the owner or an admin")
    ),
    security(("jwt" = [])),
    tag = "permissions"
)]
pub async fn list_permissions(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(resource_id): Path<String>,
) -> Result<Json<Vec<PermissionResponse>>, AppError> {
    let grants = state.permissions.list(&user, &resource_id).await?;
    Ok(Json(grants.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    put,
    path = "/permissions/{id}",
    params(("id" = String, Path, description = "Permission ID")),
    request_body = UpdatePermissionRequest,
    responses(
        (status = 200, description = "Permission updated", body = PermissionResponse),
        (status = 403, description = "Not the owner or an admin"),
        (status = 404, description = "Permission not found")
    ),
    security(("jwt" = [])),
    tag = "permissions"
)]
pub async fn update_permission(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(permission_id): Path<String>,
    Json(req): Json<UpdatePermissionRequest>,
) -> Result<Json<PermissionResponse>, AppError> {
    req.validate()?;

    let grant = state
        .permissions
        .update(
            &user,
            &permission_id,
            PermissionUpdate {
                permission: req.permission,
                expires_at: req.expires_at,
            },
        )
        .await?;

    Ok(Json(grant.into()))
}

#[utoipa::path(
    delete,
    path = "/permissions/{id}",
    params(("id" = String, Path, description = "Permission ID")),
    responses(
        (status = 204, description = "Permission revoked"),
        (status = 403, description = "Not the owner or an admin"),
        (status = 404, description = "Permission not found")
    ),
    security(("jwt" = [])),
    tag = "permissions"
)]
pub async fn delete_permission(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(permission_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.permissions.revoke(&user, &permission_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

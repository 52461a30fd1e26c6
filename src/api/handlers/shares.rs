use crate::api::error::AppError;
use crate::entities::resource_shares;
use crate::models::SharePermission;
use crate::services::share_service::{NewShare, ShareTarget, ShareUpdate};
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

// ── Request / Response Types ──────────────────────────────────────────

#[derive(Deserialize, ToSchema)]
pub struct CreateShareRequest {
    /// Exactly one of `shared_with_user_id` / `shared_with_group_id`
    pub shared_with_user_id: Option<String>,
    pub shared_with_group_id: Option<String>,
    pub permission: SharePermission,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateShareRequest {
    pub permission: Option<SharePermission>,
    /// `null` removes the expiry
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<String>, format = DateTime, nullable)]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

#[derive(Serialize, ToSchema)]
pub struct ShareResponse {
    pub id: String,
    pub resource_id: String,
    pub shared_with_user_id: Option<String>,
    pub shared_with_group_id: Option<String>,
    pub permission: SharePermission,
    pub expires_at: Option<DateTime<Utc>>,
    /// False once `expires_at` has passed
    pub active: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<resource_shares::Model> for ShareResponse {
    fn from(share: resource_shares::Model) -> Self {
        let active = share.is_active(Utc::now());
        Self {
            id: share.id,
            resource_id: share.resource_id,
            shared_with_user_id: share.shared_with_user_id,
            shared_with_group_id: share.shared_with_group_id,
            permission: share.permission,
            expires_at: share.expires_at,
            active,
            created_by: share.created_by,
            created_at: share.created_at,
            updated_at: share.updated_at,
        }
    }
}

// ── Endpoints ─────────────────────────────────────────────────────────

/// Share a resource with a user or a group
#[utoipa::path(
    post,
    path = "/resources/{id}/shares",
    params(("id" = String, Path, description = "Resource ID")),
    request_body = CreateShareRequest,
    responses(
        (status = 201, description = "Share created", body = ShareResponse),
        (status = 400, description = "Bad request"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Target user or group not found"),
        (status = 409, description = "Already shared with this target")
    ),
    security(("jwt" = [])),
    tag = "shares"
)]
pub async fn create_share(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(resource_id): Path<String>,
    Json(req): Json<CreateShareRequest>,
) -> Result<(StatusCode, Json<ShareResponse>), AppError> {
    let target = ShareTarget::from_parts(req.shared_with_user_id, req.shared_with_group_id)?;

    let share = state
        .shares
        .create_share(
            &user,
            &resource_id,
            NewShare {
                target,
                permission: req.permission,
                expires_at: req.expires_at,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(share.into())))
}

/// List the shares of a resource
#[utoipa::path(
    get,
    path = "/resources/{id}/shares",
    params(("id" = String, Path, description = "Resource ID")),
    responses(
        (status = 200, description = "Shares, including expired ones", body = Vec<ShareResponse>),
        (status = 403, description = "Not the owner")
    ),
    security(("jwt" = [])),
    tag = "shares"
)]
pub async fn list_shares(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(resource_id): Path<String>,
) -> Result<Json<Vec<ShareResponse>>, AppError> {
    let shares = state.shares.list_shares(&user, &resource_id).await?;
    Ok(Json(shares.into_iter().map(Into::into).collect()))
}

/// Change the permission or expiry of a share
#[utoipa::path(
    put,
    path = "/shares/{id}",
    params(("id" = String, Path, description = "Share ID")),
    request_body = UpdateShareRequest,
    responses(
        (status = 200, description = "Share updated", body = ShareResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Share not found")
    ),
    security(("jwt" = [])),
    tag = "shares"
)]
pub async fn update_share(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(share_id): Path<String>,
    Json(req): Json<UpdateShareRequest>,
) -> Result<Json<ShareResponse>, AppError> {
    let share = state
        .shares
        .update_share(
            &user,
            &share_id,
            ShareUpdate {
                permission: req.permission,
                expires_at: req.expires_at,
            },
        )
        .await?;

    Ok(Json(share.into()))
}

/// Revoke a share
#[utoipa::path(
    delete,
    path = "/shares/{id}",
    params(("id" = String, Path, description = "Share ID")),
    responses(
        (status = 204, description = "Share revoked"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Share not found")
    ),
    security(("jwt" = [])),
    tag = "shares"
)]
pub async fn delete_share(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(share_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.shares.delete_share(&user, &share_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

use crate::api::error::AppError;
use crate::entities::comments;
use crate::utils::auth::AuthUser;
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
pub struct CommentRequest {
    #[validate(length(min = 1, max = 2000, message = "Comment must be 1 to 2000 characters"))]
    pub content: String,
}

#[derive(Serialize, ToSchema)]
pub struct CommentResponse {
    pub id: String,
    pub resource_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<comments::Model> for CommentResponse {
    fn from(c: comments::Model) -> Self {
        Self {
            id: c.id,
            resource_id: c.resource_id,
            user_id: c.user_id,
            content: c.content,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/resources/{id}/comments",
    params(("id" = String, Path, description = "Resource ID")),
    responses(
        (status = 200, description = "Comments, oldest first", body = Vec<CommentResponse>),
        (status = 403, description = "Access denied")
    ),
    tag = "comments"
)]
pub async fn list_comments(
    State(state): State<crate::AppState>,
    user: Option<AuthUser>,
    Path(resource_id): Path<String>,
) -> Result<Json<Vec<CommentResponse>>, AppError> {
    let list = state.comments.list(&resource_id, user.as_ref()).await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/resources/{id}/comments",
    params(("id" = String, Path, description = "Resource ID")),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment posted", body = CommentResponse),
        (status = 403, description = "Access denied")
    ),
    security(("jwt" = [])),
    tag = "comments"
)]
pub async fn create_comment(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(resource_id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), AppError> {
    req.validate()?;
    let comment = state
        .comments
        .create(&user, &resource_id, &req.content)
        .await?;
    Ok((StatusCode::CREATED, Json(comment.into())))
}

#[utoipa::path(
    put,
    path = "/comments/{id}",
    params(("id" = String, Path, description = "Comment ID")),
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Comment edited", body = CommentResponse),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Comment not found")
    ),
    security(("jwt" = [])),
    tag = "comments"
)]
pub async fn update_comment(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(comment_id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> Result<Json<CommentResponse>, AppError> {
    req.validate()?;
    let comment = state
        .comments
        .update(&user, &comment_id, &req.content)
        .await?;
    Ok(Json(comment.into()))
}

#[utoipa::path(
    delete,
    path = "/comments/{id}",
    params(("id" = String, Path, description = "Comment ID")),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Comment not found")
    ),
    security(("jwt" = [])),
    tag = "comments"
)]
pub async fn delete_comment(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(comment_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.comments.delete(&user, &comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

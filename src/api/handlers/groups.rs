use crate::api::error::AppError;
use crate::entities::{group_members, groups};
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
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct AddMemberRequest {
    pub user_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct GroupResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<groups::Model> for GroupResponse {
    fn from(g: groups::Model) -> Self {
        Self {
            id: g.id,
            name: g.name,
            description: g.description,
            owner_id: g.owner_id,
            created_at: g.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct MemberResponse {
    pub group_id: String,
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
}

impl From<group_members::Model> for MemberResponse {
    fn from(m: group_members::Model) -> Self {
        Self {
            group_id: m.group_id,
            user_id: m.user_id,
            joined_at: m.joined_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/groups",
    responses(
        (status = 200, description = "Groups the caller belongs to", body = Vec<GroupResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "groups"
)]
pub async fn list_groups(
    State(state): State<crate::AppState>,
    user: AuthUser,
) -> Result<Json<Vec<GroupResponse>>, AppError> {
    let list = state.groups.list_mine(&user).await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/groups",
    request_body = CreateGroupRequest,
    responses(
        (status = 201, description = "Group created", body = GroupResponse),
        (status = 400, description = "Invalid input")
    ),
    security(("jwt" = [])),
    tag = "groups"
)]
pub async fn create_group(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Json(req): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<GroupResponse>), AppError> {
    req.validate()?;
    let group = state
        .groups
        .create(&user, &req.name, req.description)
        .await?;
    Ok((StatusCode::CREATED, Json(group.into())))
}

#[utoipa::path(
    delete,
    path = "/groups/{id}",
    params(("id" = String, Path, description = "Group ID")),
    responses(
        (status = 204, description = "Group deleted"),
        (status = 403, description = "Not the owner or an admin"),
        (status = 404, description = "Group not found")
    ),
    security(("jwt" = [])),
    tag = "groups"
)]
pub async fn delete_group(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(group_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.groups.delete(&user, &group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/groups/{id}/members",
    params(("id" = String, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Group members", body = Vec<MemberResponse>),
        (status = 403, description = "Not a member"),
        (status = 404, description = "Group not found")
    ),
    security(("jwt" = [])),
    tag = "groups"
)]
pub async fn list_members(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(group_id): Path<String>,
) -> Result<Json<Vec<MemberResponse>>, AppError> {
    let members = state.groups.members(&user, &group_id).await?;
    Ok(Json(members.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/groups/{id}/members",
    params(("id" = String, Path, description = "Group ID")),
    request_body = AddMemberRequest,
    responses(
        (status = 201, description = "Member added", body = MemberResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Group or user not found"),
        (status = 409, description = "Already a member")
    ),
    security(("jwt" = [])),
    tag = "groups"
)]
pub async fn add_member(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(group_id): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<MemberResponse>), AppError> {
    let member = state
        .groups
        .add_member(&user, &group_id, &req.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(member.into())))
}

#[utoipa::path(
    delete,
    path = "/groups/{id}/members/{user_id}",
    params(
        ("id" = String, Path, description = "Group ID"),
        ("user_id" = String, Path, description = "Member user ID")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 400, description = "The owner cannot be removed"),
        (status = 403, description = "Not the owner or the member"),
        (status = 404, description = "Membership not found")
    ),
    security(("jwt" = [])),
    tag = "groups"
)]
pub async fn remove_member(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path((group_id, member_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state
        .groups
        .remove_member(&user, &group_id, &member_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

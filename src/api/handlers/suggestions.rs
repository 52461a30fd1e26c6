use crate::api::error::AppError;
use crate::api::middleware::auth::require_admin;
use crate::entities::suggestions;
use crate::models::{SuggestionStatus, SuggestionType, VoteType};
use crate::services::suggestion_service::SuggestionFilter;
use crate::services::vote_service::VoteOutcome;
use crate::utils::auth::AuthUser;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Deserialize, ToSchema, Validate)]
pub struct CreateSuggestionRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
    pub suggestion_type: SuggestionType,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SuggestionListParams {
    pub status: Option<SuggestionStatus>,
    pub suggestion_type: Option<SuggestionType>,
}

#[derive(Deserialize, ToSchema)]
pub struct VoteRequest {
    pub vote_type: VoteType,
}

#[derive(Deserialize, ToSchema)]
pub struct StatusRequest {
    pub status: SuggestionStatus,
}

#[derive(Serialize, ToSchema)]
pub struct SuggestionResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub suggestion_type: SuggestionType,
    pub status: SuggestionStatus,
    pub suggested_by: String,
    pub votes_count: i64,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<suggestions::Model> for SuggestionResponse {
    fn from(s: suggestions::Model) -> Self {
        Self {
            id: s.id,
            name: s.name,
            description: s.description,
            suggestion_type: s.suggestion_type,
            status: s.status,
            suggested_by: s.suggested_by,
            votes_count: s.votes_count,
            reviewed_at: s.reviewed_at,
            reviewed_by: s.reviewed_by,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct VoteResponse {
    pub total_upvotes: i64,
    pub total_downvotes: i64,
    /// `null` after a toggle-off
    pub user_vote: Option<VoteType>,
    pub votes_count: i64,
    pub status: SuggestionStatus,
}

impl From<VoteOutcome> for VoteResponse {
    fn from(o: VoteOutcome) -> Self {
        Self {
            total_upvotes: o.total_upvotes,
            total_downvotes: o.total_downvotes,
            user_vote: o.user_vote,
            votes_count: o.votes_count,
            status: o.status,
        }
    }
}

#[utoipa::path(
    get,
    path = "/suggestions",
    params(SuggestionListParams),
    responses(
        (status = 200, description = "Suggestions, highest score first", body = Vec<SuggestionResponse>)
    ),
    tag = "suggestions"
)]
pub async fn list_suggestions(
    State(state): State<crate::AppState>,
    Query(params): Query<SuggestionListParams>,
) -> Result<Json<Vec<SuggestionResponse>>, AppError> {
    let list = state
        .suggestions
        .list(SuggestionFilter {
            status: params.status,
            suggestion_type: params.suggestion_type,
        })
        .await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/suggestions",
    request_body = CreateSuggestionRequest,
    responses(
        (status = 201, description = "Suggestion created as pending", body = SuggestionResponse),
        (status = 400, description = "Invalid input")
    ),
    security(("jwt" = [])),
    tag = "suggestions"
)]
pub async fn create_suggestion(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Json(req): Json<CreateSuggestionRequest>,
) -> Result<(StatusCode, Json<SuggestionResponse>), AppError> {
    req.validate()?;
    let suggestion = state
        .suggestions
        .create(&user, &req.name, req.description, req.suggestion_type)
        .await?;
    Ok((StatusCode::CREATED, Json(suggestion.into())))
}

#[utoipa::path(
    get,
    path = "/suggestions/{id}",
    params(("id" = String, Path, description = "Suggestion ID")),
    responses(
        (status = 200, description = "Suggestion", body = SuggestionResponse),
        (status = 404, description = "Suggestion not found")
    ),
    tag = "suggestions"
)]
pub async fn get_suggestion(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuggestionResponse>, AppError> {
    Ok(Json(state.suggestions.get(&id).await?.into()))
}

#[utoipa::path(
    delete,
    path = "/suggestions/{id}",
    params(("id" = String, Path, description = "Suggestion ID")),
    responses(
        (status = 204, description = "Suggestion and its votes deleted"),
        (status = 403, description = "Not the suggester of a pending suggestion, nor an admin"),
        (status = 404, description = "Suggestion not found")
    ),
    security(("jwt" = [])),
    tag = "suggestions"
)]
pub async fn delete_suggestion(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.suggestions.delete(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Vote on a suggestion. Repeating the same vote removes it.
#[utoipa::path(
    post,
    path = "/suggestions/{id}/vote",
    params(("id" = String, Path, description = "Suggestion ID")),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Updated tally", body = VoteResponse),
        (status = 404, description = "Suggestion not found"),
        (status = 409, description = "Concurrent vote, retry")
    ),
    security(("jwt" = [])),
    tag = "suggestions"
)]
pub async fn vote_suggestion(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, AppError> {
    let outcome = state.votes.vote(&id, &user.id, req.vote_type).await?;
    Ok(Json(outcome.into()))
}

#[utoipa::path(
    put,
    path = "/suggestions/{id}/status",
    params(("id" = String, Path, description = "Suggestion ID")),
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Status overridden", body = SuggestionResponse),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Suggestion not found")
    ),
    security(("jwt" = [])),
    tag = "suggestions"
)]
pub async fn override_status(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<SuggestionResponse>, AppError> {
    require_admin(&user)?;
    let suggestion = state
        .moderation
        .override_status(&user, &id, req.status)
        .await?;
    Ok(Json(suggestion.into()))
}

#[utoipa::path(
    post,
    path = "/suggestions/{id}/evaluate",
    params(("id" = String, Path, description = "Suggestion ID")),
    responses(
        (status = 200, description = "Suggestion after re-evaluation", body = SuggestionResponse),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Suggestion not found")
    ),
    security(("jwt" = [])),
    tag = "suggestions"
)]
pub async fn evaluate_suggestion(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<SuggestionResponse>, AppError> {
    require_admin(&user)?;
    let suggestion = state.moderation.reevaluate(&user, &id).await?;
    Ok(Json(suggestion.into()))
}

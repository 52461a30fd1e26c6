use crate::api::error::AppError;
use crate::services::rating_service::RatingSummary;
use crate::utils::auth::AuthUser;
use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Deserialize, ToSchema, Validate)]
pub struct RateRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
}

#[derive(Serialize, ToSchema)]
pub struct RatingResponse {
    pub resource_id: String,
    pub average_rating: f64,
    pub ratings_count: i64,
    /// The caller's own rating, when signed in
    pub my_rating: Option<i32>,
}

impl RatingResponse {
    fn new(resource_id: String, summary: RatingSummary, my_rating: Option<i32>) -> Self {
        Self {
            resource_id,
            average_rating: summary.average_rating,
            ratings_count: summary.ratings_count,
            my_rating,
        }
    }
}

#[utoipa::path(
    get,
    path = "/resources/{id}/ratings",
    params(("id" = String, Path, description = "Resource ID")),
    responses(
        (status = 200, description = "Rating summary", body = RatingResponse),
        (status = 403, description = "Access denied")
    ),
    tag = "ratings"
)]
pub async fn get_ratings(
    State(state): State<crate::AppState>,
    user: Option<AuthUser>,
    Path(resource_id): Path<String>,
) -> Result<Json<RatingResponse>, AppError> {
    let (summary, mine) = state.ratings.summary(&resource_id, user.as_ref()).await?;
    Ok(Json(RatingResponse::new(resource_id, summary, mine)))
}

#[utoipa::path(
    put,
    path = "/resources/{id}/ratings",
    params(("id" = String, Path, description = "Resource ID")),
    request_body = RateRequest,
    responses(
        (status = 200, description = "Rating stored, aggregate recomputed", body = RatingResponse),
        (status = 400, description = "Rating out of range"),
        (status = 403, description = "Access denied")
    ),
    security(("jwt" = [])),
    tag = "ratings"
)]
pub async fn rate_resource(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(resource_id): Path<String>,
    Json(req): Json<RateRequest>,
) -> Result<Json<RatingResponse>, AppError> {
    req.validate()?;
    let summary = state.ratings.rate(&user, &resource_id, req.rating).await?;
    Ok(Json(RatingResponse::new(resource_id, summary, Some(req.rating))))
}

#[utoipa::path(
    delete,
    path = "/resources/{id}/ratings",
    params(("id" = String, Path, description = "Resource ID")),
    responses(
        (status = 200, description = "Rating removed, aggregate recomputed", body = RatingResponse),
        (status = 403, description = "Access denied"),
        (status = 404, description = "No rating to remove")
    ),
    security(("jwt" = [])),
    tag = "ratings"
)]
pub async fn delete_rating(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(resource_id): Path<String>,
) -> Result<Json<RatingResponse>, AppError> {
    let summary = state.ratings.remove(&user, &resource_id).await?;
    Ok(Json(RatingResponse::new(resource_id, summary, None)))
}

use crate::api::error::AppError;
use crate::api::handlers::auth::UserResponse;
use crate::entities::prelude::*;
use crate::utils::auth::AuthUser;
use axum::{Json, extract::State};
use sea_orm::EntityTrait;

#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Profile retrieved successfully", body = UserResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "auth"
)]
pub async fn get_profile(
    State(state): State<crate::AppState>,
    user: AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = Users::find_by_id(&user.id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user.into()))
}

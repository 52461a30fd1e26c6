use crate::api::error::AppError;
use crate::api::handlers::resources::ResourceResponse;
use crate::entities::collections;
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
pub struct CreateCollectionRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct AddToCollectionRequest {
    pub resource_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct CollectionResponse {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<collections::Model> for CollectionResponse {
    fn from(c: collections::Model) -> Self {
        Self {
            id: c.id,
            owner_id: c.owner_id,
            name: c.name,
            description: c.description,
            is_public: c.is_public,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CollectionDetailResponse {
    #[serde(flatten)]
    pub collection: CollectionResponse,
    /// Entries the caller cannot read are left out
    pub resources: Vec<ResourceResponse>,
}

#[utoipa::path(
    get,
    path = "/collections",
    responses(
        (status = 200, description = "The caller's collections", body = Vec<CollectionResponse>)
    ),
    security(("jwt" = [])),
    tag = "collections"
)]
pub async fn list_collections(
    State(state): State<crate::AppState>,
    user: AuthUser,
) -> Result<Json<Vec<CollectionResponse>>, AppError> {
    let list = state.collections.list_mine(&user).await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/collections",
    request_body = CreateCollectionRequest,
    responses(
        (status = 201, description = "Collection created", body = CollectionResponse),
        (status = 400, description = "Invalid input")
    ),
    security(("jwt" = [])),
    tag = "collections"
)]
pub async fn create_collection(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Json(req): Json<CreateCollectionRequest>,
) -> Result<(StatusCode, Json<CollectionResponse>), AppError> {
    req.validate()?;
    let collection = state
        .collections
        .create(&user, &req.name, req.description, req.is_public)
        .await?;
    Ok((StatusCode::CREATED, Json(collection.into())))
}

#[utoipa::path(
    get,
    path = "/collections/{id}",
    params(("id" = String, Path, description = "Collection ID")),
    responses(
        (status = 200, description = "Collection with its visible resources", body = CollectionDetailResponse),
        (status = 403, description = "Private collection"),
        (status = 404, description = "Collection not found")
    ),
    tag = "collections"
)]
pub async fn get_collection(
    State(state): State<crate::AppState>,
    user: Option<AuthUser>,
    Path(collection_id): Path<String>,
) -> Result<Json<CollectionDetailResponse>, AppError> {
    let detail = state.collections.get(&collection_id, user.as_ref()).await?;
    Ok(Json(CollectionDetailResponse {
        collection: detail.collection.into(),
        resources: detail.items.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    delete,
    path = "/collections/{id}",
    params(("id" = String, Path, description = "Collection ID")),
    responses(
        (status = 204, description = "Collection deleted"),
        (status = 403, description = "Not the owner or an admin"),
        (status = 404, description = "Collection not found")
    ),
    security(("jwt" = [])),
    tag = "collections"
)]
pub async fn delete_collection(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(collection_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.collections.delete(&user, &collection_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/collections/{id}/resources",
    params(("id" = String, Path, description = "Collection ID")),
    request_body = AddToCollectionRequest,
    responses(
        (status = 204, description = "Resource added"),
        (status = 403, description = "Not the owner, or resource not readable"),
        (status = 409, description = "Already in the collection")
    ),
    security(("jwt" = [])),
    tag = "collections"
)]
pub async fn add_to_collection(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(collection_id): Path<String>,
    Json(req): Json<AddToCollectionRequest>,
) -> Result<StatusCode, AppError> {
    state
        .collections
        .add_resource(&user, &collection_id, &req.resource_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/collections/{id}/resources/{resource_id}",
    params(
        ("id" = String, Path, description = "Collection ID"),
        ("resource_id" = String, Path, description = "Resource ID")
    ),
    responses(
        (status = 204, description = "Resource removed"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not in the collection")
    ),
    security(("jwt" = [])),
    tag = "collections"
)]
pub async fn remove_from_collection(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path((collection_id, resource_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state
        .collections
        .remove_resource(&user, &collection_id, &resource_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

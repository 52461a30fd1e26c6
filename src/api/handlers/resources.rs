use crate::api::error::AppError;
use crate::entities::resources;
use crate::models::{ResourceKind, Visibility};
use crate::services::resource_query::ResourceFilters;
use crate::services::resource_service::{
    ListQuery, NewResource, ResourceDetail, ResourceSort, ResourceUpdate,
};
use crate::utils::auth::AuthUser;
use crate::utils::validation::deserialize_some;
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
pub struct CreateResourceRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub resource_type: ResourceKind,
    pub url: Option<String>,
    #[serde(default = "default_visibility")]
    pub visibility: Visibility,
}

fn default_visibility() -> Visibility {
    Visibility::Public
}

/// Absent fields are left unchanged; `null` clears an optional field.
#[derive(Deserialize, ToSchema, Validate, Default)]
pub struct UpdateResourceRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<String>, nullable)]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<String>, nullable)]
    pub category: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub resource_type: Option<ResourceKind>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<String>, nullable)]
    pub url: Option<Option<String>>,
    pub visibility: Option<Visibility>,
}

#[derive(Serialize, ToSchema)]
pub struct ResourceResponse {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub resource_type: ResourceKind,
    pub url: Option<String>,
    pub visibility: Visibility,
    pub views_count: i64,
    pub downloads_count: i64,
    pub average_rating: f64,
    pub ratings_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ResourceDetail> for ResourceResponse {
    fn from(detail: ResourceDetail) -> Self {
        let r = detail.resource;
        Self {
            id: r.id,
            owner_id: r.owner_id,
            title: r.title,
            description: r.description,
            category: r.category,
            tags: detail.tags,
            resource_type: r.resource_type,
            url: r.url,
            visibility: r.visibility,
            views_count: r.views_count,
            downloads_count: r.downloads_count,
            average_rating: r.average_rating,
            ratings_count: r.ratings_count,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
pub struct ResourceListParams {
    pub category: Option<String>,
    /// Comma separated; every tag must be present
    pub tags: Option<String>,
    pub resource_type: Option<ResourceKind>,
    pub owner_id: Option<String>,
    /// Case-insensitive match on title and description
    pub search: Option<String>,
    pub sort: Option<ResourceSort>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct ResourceListResponse {
    pub items: Vec<ResourceResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

#[derive(Serialize, ToSchema)]
pub struct DownloadResponse {
    pub id: String,
    pub url: Option<String>,
    pub downloads_count: i64,
}

impl From<resources::Model> for DownloadResponse {
    fn from(r: resources::Model) -> Self {
        Self {
            id: r.id,
            url: r.url,
            downloads_count: r.downloads_count,
        }
    }
}

#[utoipa::path(
    get,
    path = "/resources",
    params(ResourceListParams),
    responses(
        (status = 200, description = "Resources visible to the caller", body = ResourceListResponse)
    ),
    tag = "resources"
)]
pub async fn list_resources(
    State(state): State<crate::AppState>,
    user: Option<AuthUser>,
    Query(params): Query<ResourceListParams>,
) -> Result<Json<ResourceListResponse>, AppError> {
    let tags = params
        .tags
        .as_deref()
        .map(|t| {
            t.split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let query = ListQuery {
        filters: ResourceFilters {
            category: params.category,
            tags,
            resource_type: params.resource_type,
            owner_id: params.owner_id,
            search: params.search,
        },
        sort: params.sort.unwrap_or_default(),
        page: params.page.unwrap_or(1),
        per_page: state.config.page_size(params.per_page),
    };

    let page = state.resources.list(user.as_ref(), query).await?;

    Ok(Json(ResourceListResponse {
        items: page.items.into_iter().map(Into::into).collect(),
        total: page.total,
        page: page.page,
        per_page: page.per_page,
        total_pages: page.total_pages,
    }))
}

#[utoipa::path(
    post,
    path = "/resources",
    request_body = CreateResourceRequest,
    responses(
        (status = 201, description = "Resource created", body = ResourceResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "resources"
)]
pub async fn create_resource(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Json(req): Json<CreateResourceRequest>,
) -> Result<(StatusCode, Json<ResourceResponse>), AppError> {
    req.validate()?;

    let detail = state
        .resources
        .create(
            &user,
            NewResource {
                title: req.title,
                description: req.description,
                category: req.category,
                tags: req.tags,
                resource_type: req.resource_type,
                url: req.url,
                visibility: req.visibility,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(detail.into())))
}

#[utoipa::path(
    get,
    path = "/resources/{id}",
    params(("id" = String, Path, description = "Resource ID")),
    responses(
        (status = 200, description = "Resource details", body = ResourceResponse),
        (status = 403, description = "Access denied")
    ),
    tag = "resources"
)]
pub async fn get_resource(
    State(state): State<crate::AppState>,
    user: Option<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ResourceResponse>, AppError> {
    let detail = state.resources.get(&id, user.as_ref()).await?;
    Ok(Json(detail.into()))
}

#[utoipa::path(
    put,
    path = "/resources/{id}",
    params(("id" = String, Path, description = "Resource ID")),
    request_body = UpdateResourceRequest,
    responses(
        (status = 200, description = "Resource updated", body = ResourceResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Access denied")
    ),
    security(("jwt" = [])),
    tag = "resources"
)]
pub async fn update_resource(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateResourceRequest>,
) -> Result<Json<ResourceResponse>, AppError> {
    req.validate()?;

    let detail = state
        .resources
        .update(
            &user,
            &id,
            ResourceUpdate {
                title: req.title,
                description: req.description,
                category: req.category,
                tags: req.tags,
                resource_type: req.resource_type,
                url: req.url,
                visibility: req.visibility,
            },
        )
        .await?;

    Ok(Json(detail.into()))
}

#[utoipa::path(
    delete,
    path = "/resources/{id}",
    params(("id" = String, Path, description = "Resource ID")),
    responses(
        (status = 204, description = "Resource deleted"),
        (status = 403, description = "Access denied")
    ),
    security(("jwt" = [])),
    tag = "resources"
)]
pub async fn delete_resource(
    State(state): State<crate::AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.resources.delete(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/resources/{id}/download",
    params(("id" = String, Path, description = "Resource ID")),
    responses(
        (status = 200, description = "Download recorded", body = DownloadResponse),
        (status = 403, description = "Access denied")
    ),
    tag = "resources"
)]
pub async fn download_resource(
    State(state): State<crate::AppState>,
    user: Option<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<DownloadResponse>, AppError> {
    let resource = state.resources.record_download(&id, user.as_ref()).await?;
    Ok(Json(resource.into()))
}

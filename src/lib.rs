pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::admin_config::{DbModerationConfig, ModerationConfigProvider};
use crate::services::audit::AuditService;
use crate::services::cache::{CacheInvalidator, MemoryCache};
use crate::services::collection_service::CollectionService;
use crate::services::comment_service::CommentService;
use crate::services::group_service::GroupService;
use crate::services::moderation::ModerationService;
use crate::services::permission_service::PermissionService;
use crate::services::rating_service::RatingService;
use crate::services::resource_service::ResourceService;
use crate::services::share_service::ShareService;
use crate::services::suggestion_service::SuggestionService;
use crate::services::vote_service::VoteService;
use axum::{
    Router,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::users::get_profile,
        api::handlers::resources::list_resources,
        api::handlers::resources::create_resource,
        api::handlers::resources::get_resource,
        api::handlers::resources::update_resource,
        api::handlers::resources::delete_resource,
        api::handlers::resources::download_resource,
        api::handlers::shares::create_share,
        api::handlers::shares::list_shares,
        api::handlers::shares::update_share,
        api::handlers::shares::delete_share,
        api::handlers::permissions::create_permission,
        api::handlers::permissions::list_permissions,
        api::handlers::permissions::update_permission,
        api::handlers::permissions::delete_permission,
        api::handlers::ratings::get_ratings,
        api::handlers::ratings::rate_resource,
        api::handlers::ratings::delete_rating,
        api::handlers::comments::list_comments,
        api::handlers::comments::create_comment,
        api::handlers::comments::update_comment,
        api::handlers::comments::delete_comment,
        api::handlers::groups::list_groups,
        api::handlers::groups::create_group,
        api::handlers::groups::delete_group,
        api::handlers::groups::list_members,
        api::handlers::groups::add_member,
        api::handlers::groups::remove_member,
        api::handlers::collections::list_collections,
        api::handlers::collections::create_collection,
        api::handlers::collections::get_collection,
        api::handlers::collections::delete_collection,
        api::handlers::collections::add_to_collection,
        api::handlers::collections::remove_from_collection,
        api::handlers::suggestions::list_suggestions,
        api::handlers::suggestions::create_suggestion,
        api::handlers::suggestions::get_suggestion,
        api::handlers::suggestions::delete_suggestion,
        api::handlers::suggestions::vote_suggestion,
        api::handlers::suggestions::override_status,
        api::handlers::suggestions::evaluate_suggestion,
        api::handlers::admin::get_config,
        api::handlers::admin::update_config,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::auth::RegisterRequest,
            api::handlers::auth::LoginRequest,
            api::handlers::auth::UserResponse,
            api::handlers::auth::AuthResponse,
            api::handlers::resources::CreateResourceRequest,
            api::handlers::resources::UpdateResourceRequest,
            api::handlers::resources::ResourceResponse,
            api::handlers::resources::ResourceListResponse,
            api::handlers::resources::DownloadResponse,
            api::handlers::shares::CreateShareRequest,
            api::handlers::shares::UpdateShareRequest,
            api::handlers::shares::ShareResponse,
            api::handlers::permissions::CreatePermissionRequest,
            api::handlers::permissions::UpdatePermissionRequest,
            api::handlers::permissions::PermissionResponse,
            api::handlers::ratings::RateRequest,
            api::handlers::ratings::RatingResponse,
            api::handlers::comments::CommentRequest,
            api::handlers::comments::CommentResponse,
            api::handlers::groups::CreateGroupRequest,
            api::handlers::groups::AddMemberRequest,
            api::handlers::groups::GroupResponse,
            api::handlers::groups::MemberResponse,
            api::handlers::collections::CreateCollectionRequest,
            api::handlers::collections::AddToCollectionRequest,
            api::handlers::collections::CollectionResponse,
            api::handlers::collections::CollectionDetailResponse,
            api::handlers::suggestions::CreateSuggestionRequest,
            api::handlers::suggestions::VoteRequest,
            api::handlers::suggestions::StatusRequest,
            api::handlers::suggestions::SuggestionResponse,
            api::handlers::suggestions::VoteResponse,
            services::resource_service::ResourceSort,
            models::UserRole,
            models::ResourceKind,
            models::Visibility,
            models::SharePermission,
            models::SuggestionType,
            models::SuggestionStatus,
            models::VoteType,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "system", description = "Health endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "resources", description = "Resource library"),
        (name = "shares", description = "Sharing with users and groups"),
        (name = "permissions", description = "Labelled permission grants"),
        (name = "ratings", description = "Resource ratings"),
        (name = "comments", description = "Resource comments"),
        (name = "groups", description = "User groups"),
        (name = "collections", description = "Curated collections"),
        (name = "suggestions", description = "Taxonomy suggestions and voting"),
        (name = "admin", description = "Moderation settings")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub cache: Arc<MemoryCache>,
    pub audit: AuditService,
    pub resources: Arc<ResourceService>,
    pub shares: Arc<ShareService>,
    pub permissions: Arc<PermissionService>,
    pub ratings: Arc<RatingService>,
    pub comments: Arc<CommentService>,
    pub groups: Arc<GroupService>,
    pub collections: Arc<CollectionService>,
    pub suggestions: Arc<SuggestionService>,
    pub votes: Arc<VoteService>,
    pub moderation: Arc<ModerationService>,
}

impl AppState {
    /// Moderation settings are read from the `admin_config` table.
    pub fn new(db: DatabaseConnection, config: AppConfig) -> Self {
        let provider = Arc::new(DbModerationConfig::new(db.clone()));
        Self::with_moderation_config(db, config, provider)
    }

    pub fn with_moderation_config(
        db: DatabaseConnection,
        config: AppConfig,
        moderation_config: Arc<dyn ModerationConfigProvider>,
    ) -> Self {
        let cache = Arc::new(MemoryCache::new(Duration::from_secs(config.cache_ttl_secs)));
        let invalidator: Arc<dyn CacheInvalidator> = cache.clone();

        Self {
            audit: AuditService::new(db.clone()),
            resources: Arc::new(ResourceService::new(db.clone(), invalidator.clone())),
            shares: Arc::new(ShareService::new(db.clone(), invalidator.clone())),
            permissions: Arc::new(PermissionService::new(db.clone(), invalidator.clone())),
            ratings: Arc::new(RatingService::new(db.clone(), invalidator.clone())),
            comments: Arc::new(CommentService::new(db.clone())),
            groups: Arc::new(GroupService::new(db.clone())),
            collections: Arc::new(CollectionService::new(db.clone())),
            suggestions: Arc::new(SuggestionService::new(db.clone(), cache.clone())),
            votes: Arc::new(VoteService::new(
                db.clone(),
                moderation_config.clone(),
                invalidator.clone(),
                config.vote_retry_attempts,
            )),
            moderation: Arc::new(ModerationService::new(
                db.clone(),
                moderation_config,
                invalidator,
            )),
            cache,
            db,
            config,
        }
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origin = if config.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn create_app(state: AppState) -> Router {
    use api::handlers::{
        admin, auth, collections, comments, groups, health, permissions, ratings, resources,
        shares, suggestions, users,
    };

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health::health_check))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/users/me", get(users::get_profile))
        .route(
            "/resources",
            get(resources::list_resources).post(resources::create_resource),
        )
        .route(
            "/resources/:id",
            get(resources::get_resource)
                .put(resources::update_resource)
                .delete(resources::delete_resource),
        )
        .route("/resources/:id/download", post(resources::download_resource))
        .route(
            "/resources/:id/shares",
            get(shares::list_shares).post(shares::create_share),
        )
        .route(
            "/shares/:id",
            put(shares::update_share).delete(shares::delete_share),
        )
        .route(
            "/resources/:id/permissions",
            get(permissions::list_permissions).post(permissions::create_permission),
        )
        .route(
            "/permissions/:id",
            put(permissions::update_permission).delete(permissions::delete_permission),
        )
        .route(
            "/resources/:id/ratings",
            get(ratings::get_ratings)
                .put(ratings::rate_resource)
                .delete(ratings::delete_rating),
        )
        .route(
            "/resources/:id/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/comments/:id",
            put(comments::update_comment).delete(comments::delete_comment),
        )
        .route("/groups", get(groups::list_groups).post(groups::create_group))
        .route("/groups/:id", delete(groups::delete_group))
        .route(
            "/groups/:id/members",
            get(groups::list_members).post(groups::add_member),
        )
        .route(
            "/groups/:id/members/:user_id",
            delete(groups::remove_member),
        )
        .route(
            "/collections",
            get(collections::list_collections).post(collections::create_collection),
        )
        .route(
            "/collections/:id",
            get(collections::get_collection).delete(collections::delete_collection),
        )
        .route(
            "/collections/:id/resources",
            post(collections::add_to_collection),
        )
        .route(
            "/collections/:id/resources/:resource_id",
            delete(collections::remove_from_collection),
        )
        .route(
            "/suggestions",
            get(suggestions::list_suggestions).post(suggestions::create_suggestion),
        )
        .route(
            "/suggestions/:id",
            get(suggestions::get_suggestion).delete(suggestions::delete_suggestion),
        )
        .route("/suggestions/:id/vote", post(suggestions::vote_suggestion))
        .route("/suggestions/:id/status", put(suggestions::override_status))
        .route(
            "/suggestions/:id/evaluate",
            post(suggestions::evaluate_suggestion),
        )
        .route(
            "/admin/config",
            get(admin::get_config).put(admin::update_config),
        )
        .layer(from_fn_with_state(
            state.clone(),
            api::middleware::auth::auth_middleware,
        ))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&state.config))
        .with_state(state)
}

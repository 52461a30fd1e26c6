#![allow(dead_code)]

use chrono::Utc;
use hublib::AppState;
use hublib::config::AppConfig;
use hublib::entities::users;
use hublib::infrastructure::database;
use hublib::models::{ResourceKind, UserRole, Visibility};
use hublib::services::admin_config::{ModerationSettings, StaticModerationConfig};
use hublib::services::resource_service::NewResource;
use hublib::utils::auth::AuthUser;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use std::sync::Arc;
use uuid::Uuid;

pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();
    db
}

/// App state whose moderation settings come from memory instead of `admin_config`.
pub async fn setup_state(settings: ModerationSettings) -> AppState {
    let db = setup_test_db().await;
    AppState::with_moderation_config(
        db,
        AppConfig::development(),
        Arc::new(StaticModerationConfig(settings)),
    )
}

pub async fn create_user(db: &DatabaseConnection, username: &str, role: UserRole) -> AuthUser {
    let user = users::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        username: Set(username.to_string()),
        password_hash: Set("not-a-real-hash".to_string()),
        email: Set(None),
        role: Set(role),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .unwrap();

    AuthUser::from(user)
}

pub async fn create_resource(
    state: &AppState,
    owner: &AuthUser,
    title: &str,
    visibility: Visibility,
) -> String {
    create_tagged_resource(state, owner, title, visibility, &[]).await
}

pub async fn create_tagged_resource(
    state: &AppState,
    owner: &AuthUser,
    title: &str,
    visibility: Visibility,
    tags: &[&str],
) -> String {
    state
        .resources
        .create(
            owner,
            NewResource {
                title: title.to_string(),
                description: Some(format!("About {}", title)),
                category: Some("guides".to_string()),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                resource_type: ResourceKind::ExternalLink,
                url: Some("https://example.com".to_string()),
                visibility,
            },
        )
        .await
        .unwrap()
        .resource
        .id
}

use crate::entities::{
    admin_config, audit_logs, collection_resources, collections, comments, group_members, groups,
    resource_permissions, resource_ratings, resource_shares, resource_tags, resources,
    suggestion_votes, suggestions, users,
};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::time::Duration;
use tracing::info;

pub async fn setup_database(db_url: &str) -> anyhow::Result<DatabaseConnection> {
    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

/// Creates missing tables and indexes. Safe to run on every start.
pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    info!("🔄 Running auto-migrations...");

    // Order matters for foreign keys: users -> groups -> resources -> dependents
    let stmts = vec![
        (
            "users",
            schema
                .create_table_from_entity(users::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "groups",
            schema
                .create_table_from_entity(groups::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "group_members",
            schema
                .create_table_from_entity(group_members::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "resources",
            schema
                .create_table_from_entity(resources::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "resource_tags",
            schema
                .create_table_from_entity(resource_tags::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "resource_shares",
            schema
                .create_table_from_entity(resource_shares::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "resource_permissions",
            schema
                .create_table_from_entity(resource_permissions::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "resource_ratings",
            schema
                .create_table_from_entity(resource_ratings::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "comments",
            schema
                .create_table_from_entity(comments::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "collections",
            schema
                .create_table_from_entity(collections::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "collection_resources",
            schema
                .create_table_from_entity(collection_resources::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "suggestions",
            schema
                .create_table_from_entity(suggestions::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "suggestion_votes",
            schema
                .create_table_from_entity(suggestion_votes::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "admin_config",
            schema
                .create_table_from_entity(admin_config::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "audit_logs",
            schema
                .create_table_from_entity(audit_logs::Entity)
                .if_not_exists()
                .to_owned(),
        ),
    ];

    for (name, stmt) in stmts {
        let stmt = builder.build(&stmt);
        db.execute(stmt).await?;
        info!("   - Table '{}' checked/created", name);
    }

    info!("🔄 Checking indexes...");

    let indexes = [
        // One vote per user and suggestion, one rating per user and resource
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_suggestion_votes_unique ON suggestion_votes(suggestion_id, user_id)",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_resource_ratings_unique ON resource_ratings(resource_id, user_id)",
        "CREATE INDEX IF NOT EXISTS idx_resources_owner_id ON resources(owner_id)",
        "CREATE INDEX IF NOT EXISTS idx_resources_visibility ON resources(visibility)",
        "CREATE INDEX IF NOT EXISTS idx_resources_category ON resources(category)",
        "CREATE INDEX IF NOT EXISTS idx_resources_created_at ON resources(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_resource_tags_name ON resource_tags(name)",
        "CREATE INDEX IF NOT EXISTS idx_resource_shares_resource_id ON resource_shares(resource_id)",
        "CREATE INDEX IF NOT EXISTS idx_resource_shares_user ON resource_shares(shared_with_user_id)",
        "CREATE INDEX IF NOT EXISTS idx_resource_shares_group ON resource_shares(shared_with_group_id)",
        "CREATE INDEX IF NOT EXISTS idx_resource_permissions_resource_id ON resource_permissions(resource_id)",
        "CREATE INDEX IF NOT EXISTS idx_group_members_user_id ON group_members(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_comments_resource_id ON comments(resource_id)",
        "CREATE INDEX IF NOT EXISTS idx_suggestions_status ON suggestions(status)",
        "CREATE INDEX IF NOT EXISTS idx_audit_logs_timestamp ON audit_logs(timestamp)",
    ];

    for query in indexes {
        db.execute(sea_orm::Statement::from_string(builder, query.to_string()))
            .await?;
    }
    info!("   - {} indexes checked/created", indexes.len());

    Ok(())
}

use crate::entities::{admin_config, prelude::*};
use crate::services::admin_config::default_entries;
use chrono::Utc;
use sea_orm::{DatabaseConnection, EntityTrait, Set, sea_query::OnConflict};
use tracing::info;

/// Inserts moderation defaults for keys that are not configured yet.
/// Existing values are never overwritten.
pub async fn seed_defaults(db: &DatabaseConnection) -> anyhow::Result<()> {
    info!("🌱 Seeding admin configuration defaults...");

    let now = Utc::now();
    let rows: Vec<admin_config::ActiveModel> = default_entries()
        .into_iter()
        .map(|(key, value)| admin_config::ActiveModel {
            key: Set(key),
            value: Set(value),
            updated_by: Set(None),
            updated_at: Set(now),
        })
        .collect();
    let count = rows.len();

    AdminConfig::insert_many(rows)
        .on_conflict(
            OnConflict::column(admin_config::Column::Key)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    info!("   - {} config keys ensured", count);
    Ok(())
}

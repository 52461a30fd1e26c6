use crate::api::error::AppError;
use crate::entities::{admin_config, prelude::*};
use crate::models::SuggestionType;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, Set, TransactionTrait, sea_query::OnConflict};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

pub const AUTO_APPROVAL_ENABLED: &str = "auto_approval_enabled";
pub const CONSIDER_DOWNVOTES: &str = "consider_downvotes";
pub const APPROVAL_THRESHOLD_PREFIX: &str = "auto_approval_vote_threshold_";
pub const REJECTION_THRESHOLD_PREFIX: &str = "auto_rejection_downvote_threshold_";

pub const DEFAULT_APPROVAL_THRESHOLD: i64 = 5;
pub const DEFAULT_REJECTION_THRESHOLD: i64 = 3;

pub fn approval_threshold_key(kind: SuggestionType) -> String {
    format!("{}{}", APPROVAL_THRESHOLD_PREFIX, kind)
}

pub fn rejection_threshold_key(kind: SuggestionType) -> String {
    format!("{}{}", REJECTION_THRESHOLD_PREFIX, kind)
}

/// Snapshot of the moderation thresholds, read once per vote.
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationSettings {
    pub auto_approval_enabled: bool,
    pub consider_downvotes: bool,
    approval_thresholds: HashMap<SuggestionType, i64>,
    rejection_thresholds: HashMap<SuggestionType, i64>,
}

impl Default for ModerationSettings {
    fn default() -> Self {
        Self {
            auto_approval_enabled: true,
            consider_downvotes: true,
            approval_thresholds: HashMap::new(),
            rejection_thresholds: HashMap::new(),
        }
    }
}

impl ModerationSettings {
    pub fn with_approval_threshold(mut self, kind: SuggestionType, threshold: i64) -> Self {
        self.approval_thresholds.insert(kind, threshold);
        self
    }

    pub fn with_rejection_threshold(mut self, kind: SuggestionType, threshold: i64) -> Self {
        self.rejection_thresholds.insert(kind, threshold);
        self
    }

    pub fn approval_threshold(&self, kind: SuggestionType) -> i64 {
        self.approval_thresholds
            .get(&kind)
            .copied()
            .unwrap_or(DEFAULT_APPROVAL_THRESHOLD)
    }

    pub fn rejection_threshold(&self, kind: SuggestionType) -> i64 {
        self.rejection_thresholds
            .get(&kind)
            .copied()
            .unwrap_or(DEFAULT_REJECTION_THRESHOLD)
    }

    /// Builds settings from raw key/value rows. Unparseable values fall back
    /// to the defaults with a warning.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut settings = Self::default();
        for (key, value) in entries {
            match ConfigEntry::parse(key, value) {
                Ok(ConfigEntry::AutoApprovalEnabled(v)) => settings.auto_approval_enabled = v,
                Ok(ConfigEntry::ConsiderDownvotes(v)) => settings.consider_downvotes = v,
                Ok(ConfigEntry::ApprovalThreshold(kind, v)) => {
                    settings.approval_thresholds.insert(kind, v);
                }
                Ok(ConfigEntry::RejectionThreshold(kind, v)) => {
                    settings.rejection_thresholds.insert(kind, v);
                }
                Err(e) => warn!("Ignoring admin config entry '{}': {}", key, e),
            }
        }
        settings
    }
}

/// A validated admin configuration key/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigEntry {
    AutoApprovalEnabled(bool),
    ConsiderDownvotes(bool),
    ApprovalThreshold(SuggestionType, i64),
    RejectionThreshold(SuggestionType, i64),
}

fn parse_bool(key: &str, value: &str) -> Result<bool, AppError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(AppError::BadRequest(format!("{}: expected true or false", key))),
    }
}

fn parse_threshold(key: &str, value: &str) -> Result<i64, AppError> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|v| *v >= 0)
        .ok_or_else(|| AppError::BadRequest(format!("{}: expected a non-negative integer", key)))
}

fn parse_kind(key: &str, suffix: &str) -> Result<SuggestionType, AppError> {
    SuggestionType::parse(suffix)
        .ok_or_else(|| AppError::BadRequest(format!("{}: unknown suggestion type", key)))
}

impl ConfigEntry {
    pub fn parse(key: &str, value: &str) -> Result<Self, AppError> {
        if key == AUTO_APPROVAL_ENABLED {
            return Ok(Self::AutoApprovalEnabled(parse_bool(key, value)?));
        }
        if key == CONSIDER_DOWNVOTES {
            return Ok(Self::ConsiderDownvotes(parse_bool(key, value)?));
        }
        if let Some(suffix) = key.strip_prefix(APPROVAL_THRESHOLD_PREFIX) {
            return Ok(Self::ApprovalThreshold(
                parse_kind(key, suffix)?,
                parse_threshold(key, value)?,
            ));
        }
        if let Some(suffix) = key.strip_prefix(REJECTION_THRESHOLD_PREFIX) {
            return Ok(Self::RejectionThreshold(
                parse_kind(key, suffix)?,
                parse_threshold(key, value)?,
            ));
        }
        Err(AppError::BadRequest(format!("{}: unknown config key", key)))
    }

    /// Canonical stored form of the value.
    pub fn value_string(&self) -> String {
        match self {
            Self::AutoApprovalEnabled(v) | Self::ConsiderDownvotes(v) => v.to_string(),
            Self::ApprovalThreshold(_, v) | Self::RejectionThreshold(_, v) => v.to_string(),
        }
    }
}

/// Every key with its default value, used for seeding.
pub fn default_entries() -> Vec<(String, String)> {
    let mut entries = vec![
        (AUTO_APPROVAL_ENABLED.to_string(), "true".to_string()),
        (CONSIDER_DOWNVOTES.to_string(), "true".to_string()),
    ];
    for kind in SuggestionType::ALL {
        entries.push((
            approval_threshold_key(kind),
            DEFAULT_APPROVAL_THRESHOLD.to_string(),
        ));
        entries.push((
            rejection_threshold_key(kind),
            DEFAULT_REJECTION_THRESHOLD.to_string(),
        ));
    }
    entries
}

/// Source of moderation thresholds, injected into the vote ledger.
#[async_trait]
pub trait ModerationConfigProvider: Send + Sync {
    async fn moderation_settings(&self) -> Result<ModerationSettings, AppError>;
}

/// Reads the `admin_config` table on every call.
pub struct DbModerationConfig {
    db: DatabaseConnection,
}

impl DbModerationConfig {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ModerationConfigProvider for DbModerationConfig {
    async fn moderation_settings(&self) -> Result<ModerationSettings, AppError> {
        let rows = AdminConfig::find().all(&self.db).await?;
        Ok(ModerationSettings::from_entries(
            rows.iter().map(|r| (r.key.as_str(), r.value.as_str())),
        ))
    }
}

/// Fixed thresholds, for tests and embedded use.
pub struct StaticModerationConfig(pub ModerationSettings);

#[async_trait]
impl ModerationConfigProvider for StaticModerationConfig {
    async fn moderation_settings(&self) -> Result<ModerationSettings, AppError> {
        Ok(self.0.clone())
    }
}

pub async fn list_entries<C: ConnectionTrait>(
    conn: &C,
) -> Result<BTreeMap<String, String>, AppError> {
    let rows = AdminConfig::find().all(conn).await?;
    Ok(rows.into_iter().map(|r| (r.key, r.value)).collect())
}

/// Validates every pair first, then upserts them in one transaction.
pub async fn upsert_entries(
    db: &DatabaseConnection,
    entries: &BTreeMap<String, String>,
    updated_by: Option<&str>,
) -> Result<BTreeMap<String, String>, AppError> {
    let parsed = entries
        .iter()
        .map(|(k, v)| ConfigEntry::parse(k, v).map(|e| (k.clone(), e.value_string())))
        .collect::<Result<Vec<_>, _>>()?;

    let txn = db.begin().await?;
    for (key, value) in parsed {
        let model = admin_config::ActiveModel {
            key: Set(key),
            value: Set(value),
            updated_by: Set(updated_by.map(str::to_string)),
            updated_at: Set(Utc::now()),
        };
        AdminConfig::insert(model)
            .on_conflict(
                OnConflict::column(admin_config::Column::Key)
                    .update_columns([
                        admin_config::Column::Value,
                        admin_config::Column::UpdatedBy,
                        admin_config::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&txn)
            .await?;
    }
    txn.commit().await?;

    list_entries(db).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_keys() {
        assert_eq!(
            ConfigEntry::parse("auto_approval_enabled", "false").unwrap(),
            ConfigEntry::AutoApprovalEnabled(false)
        );
        assert_eq!(
            ConfigEntry::parse("auto_approval_vote_threshold_tag", " 7 ").unwrap(),
            ConfigEntry::ApprovalThreshold(SuggestionType::Tag, 7)
        );
        assert_eq!(
            ConfigEntry::parse("auto_rejection_downvote_threshold_filter", "2").unwrap(),
            ConfigEntry::RejectionThreshold(SuggestionType::Filter, 2)
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(ConfigEntry::parse("auto_approval_vote_threshold_colour", "5").is_err());
        assert!(ConfigEntry::parse("auto_approval_vote_threshold_tag", "-1").is_err());
        assert!(ConfigEntry::parse("consider_downvotes", "maybe").is_err());
        assert!(ConfigEntry::parse("site_title", "HubLib").is_err());
    }

    #[test]
    fn test_settings_from_entries_with_defaults() {
        let settings = ModerationSettings::from_entries([
            ("auto_approval_vote_threshold_category", "8"),
            ("consider_downvotes", "false"),
            ("auto_rejection_downvote_threshold_tag", "oops"),
        ]);
        assert!(settings.auto_approval_enabled);
        assert!(!settings.consider_downvotes);
        assert_eq!(settings.approval_threshold(SuggestionType::Category), 8);
        assert_eq!(settings.approval_threshold(SuggestionType::Tag), DEFAULT_APPROVAL_THRESHOLD);
        assert_eq!(settings.rejection_threshold(SuggestionType::Tag), DEFAULT_REJECTION_THRESHOLD);
    }

    #[test]
    fn test_default_entries_cover_every_type() {
        let entries = default_entries();
        assert_eq!(entries.len(), 2 + 2 * SuggestionType::ALL.len());
        for (key, value) in &entries {
            assert!(ConfigEntry::parse(key, value).is_ok(), "{} should parse", key);
        }
    }
}

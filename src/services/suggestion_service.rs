use crate::api::error::AppError;
use crate::entities::{prelude::*, suggestion_votes, suggestions};
use crate::models::{SuggestionStatus, SuggestionType};
use crate::services::cache::{CacheInvalidator, MemoryCache, SUGGESTIONS_PATTERN, suggestion_key};
use crate::utils::auth::AuthUser;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const MAX_SUGGESTION_NAME_LEN: usize = 100;

#[derive(Debug, Clone, Copy, Default)]
pub struct SuggestionFilter {
    pub status: Option<SuggestionStatus>,
    pub suggestion_type: Option<SuggestionType>,
}

impl SuggestionFilter {
    fn cache_key(&self) -> String {
        format!(
            "suggestions:list:{}:{}",
            self.status
                .map(|s| format!("{:?}", s).to_lowercase())
                .unwrap_or_else(|| "any".to_string()),
            self.suggestion_type.map(|t| t.as_str()).unwrap_or("any")
        )
    }
}

pub struct SuggestionService {
    db: DatabaseConnection,
    cache: Arc<MemoryCache>,
}

impl SuggestionService {
    pub fn new(db: DatabaseConnection, cache: Arc<MemoryCache>) -> Self {
        Self { db, cache }
    }

    pub async fn create(
        &self,
        author: &AuthUser,
        name: &str,
        description: Option<String>,
        suggestion_type: SuggestionType,
    ) -> Result<suggestions::Model, AppError> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_SUGGESTION_NAME_LEN {
            return Err(AppError::BadRequest(format!(
                "name must be between 1 and {} characters",
                MAX_SUGGESTION_NAME_LEN
            )));
        }

        let now = Utc::now();
        let suggestion = suggestions::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            name: Set(name.to_string()),
            description: Set(description.filter(|d| !d.trim().is_empty())),
            suggestion_type: Set(suggestion_type),
            status: Set(SuggestionStatus::Pending),
            suggested_by: Set(author.id.clone()),
            votes_count: Set(0),
            reviewed_at: Set(None),
            reviewed_by: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        self.cache.invalidate_pattern(SUGGESTIONS_PATTERN);
        Ok(suggestion)
    }

    /// Highest score first. Served from the cache while the entry is fresh.
    pub async fn list(&self, filter: SuggestionFilter) -> Result<Vec<suggestions::Model>, AppError> {
        let key = filter.cache_key();
        if let Some(cached) = self.cache.get(&key) {
            match serde_json::from_value(cached) {
                Ok(list) => {
                    debug!("📦 Cache hit: {}", key);
                    return Ok(list);
                }
                Err(e) => warn!("Discarding unreadable cache entry {}: {}", key, e),
            }
        }

        let mut query = Suggestions::find();
        if let Some(status) = filter.status {
            query = query.filter(suggestions::Column::Status.eq(status));
        }
        if let Some(kind) = filter.suggestion_type {
            query = query.filter(suggestions::Column::SuggestionType.eq(kind));
        }
        let list = query
            .order_by_desc(suggestions::Column::VotesCount)
            .order_by_desc(suggestions::Column::CreatedAt)
            .all(&self.db)
            .await?;

        match serde_json::to_value(&list) {
            Ok(value) => self.cache.put(key, value),
            Err(e) => warn!("Suggestion list not cached: {}", e),
        }
        Ok(list)
    }

    pub async fn get(&self, suggestion_id: &str) -> Result<suggestions::Model, AppError> {
        Suggestions::find_by_id(suggestion_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Suggestion not found".to_string()))
    }

    /// The suggester may withdraw a pending suggestion; admins may delete any.
    pub async fn delete(&self, user: &AuthUser, suggestion_id: &str) -> Result<(), AppError> {
        let suggestion = self.get(suggestion_id).await?;
        let own_pending =
            suggestion.suggested_by == user.id && suggestion.status == SuggestionStatus::Pending;
        if !own_pending && !user.is_admin() {
            return Err(AppError::access_denied());
        }

        let txn = self.db.begin().await?;
        SuggestionVotes::delete_many()
            .filter(suggestion_votes::Column::SuggestionId.eq(&suggestion.id))
            .exec(&txn)
            .await?;
        let id = suggestion.id.clone();
        suggestion.delete(&txn).await?;
        txn.commit().await?;

        self.cache.invalidate(&suggestion_key(&id));
        self.cache.invalidate_pattern(SUGGESTIONS_PATTERN);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_covers_filters() {
        let all = SuggestionFilter::default();
        let pending_tags = SuggestionFilter {
            status: Some(SuggestionStatus::Pending),
            suggestion_type: Some(SuggestionType::Tag),
        };
        assert_eq!(all.cache_key(), "suggestions:list:any:any");
        assert_eq!(pending_tags.cache_key(), "suggestions:list:pending:tag");
        assert!(pending_tags.cache_key().starts_with(&SUGGESTIONS_PATTERN[..12]));
    }
}

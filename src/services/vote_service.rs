use crate::api::error::AppError;
use crate::entities::{prelude::*, suggestion_votes, suggestions};
use crate::models::{SuggestionStatus, VoteType};
use crate::services::admin_config::{ModerationConfigProvider, ModerationSettings};
use crate::services::audit::{AuditEventType, AuditService};
use crate::services::cache::{CacheInvalidator, SUGGESTIONS_PATTERN, suggestion_key};
use crate::services::moderation::{self, VoteTally};
use crate::utils::keyed_mutex::KeyedMutex;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection,
    EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Result of a vote call, read back inside the same transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteOutcome {
    pub total_upvotes: i64,
    pub total_downvotes: i64,
    pub user_vote: Option<VoteType>,
    pub votes_count: i64,
    pub status: SuggestionStatus,
    /// Set when this vote moved the suggestion out of `pending`.
    pub transitioned_to: Option<SuggestionStatus>,
}

/// Per-user single-vote ledger with toggle semantics.
pub struct VoteService {
    db: DatabaseConnection,
    config: Arc<dyn ModerationConfigProvider>,
    cache: Arc<dyn CacheInvalidator>,
    audit: AuditService,
    locks: KeyedMutex,
    max_attempts: u32,
}

impl VoteService {
    pub fn new(
        db: DatabaseConnection,
        config: Arc<dyn ModerationConfigProvider>,
        cache: Arc<dyn CacheInvalidator>,
        max_attempts: u32,
    ) -> Self {
        let audit = AuditService::new(db.clone());
        Self {
            db,
            config,
            cache,
            audit,
            locks: KeyedMutex::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Counts the vote rows for a suggestion. The stored `votes_count` must
    /// always equal `score()` of this tally.
    pub async fn recompute_tally<C: ConnectionTrait>(
        conn: &C,
        suggestion_id: &str,
    ) -> Result<VoteTally, AppError> {
        let upvotes = SuggestionVotes::find()
            .filter(suggestion_votes::Column::SuggestionId.eq(suggestion_id))
            .filter(suggestion_votes::Column::VoteType.eq(VoteType::Upvote))
            .count(conn)
            .await?;
        let downvotes = SuggestionVotes::find()
            .filter(suggestion_votes::Column::SuggestionId.eq(suggestion_id))
            .filter(suggestion_votes::Column::VoteType.eq(VoteType::Downvote))
            .count(conn)
            .await?;

        Ok(VoteTally::new(upvotes as i64, downvotes as i64))
    }

    /// The caller's current vote, if any.
    pub async fn user_vote<C: ConnectionTrait>(
        conn: &C,
        suggestion_id: &str,
        user_id: &str,
    ) -> Result<Option<VoteType>, AppError> {
        Ok(Self::find_vote(conn, suggestion_id, user_id)
            .await?
            .map(|v| v.vote_type))
    }

    async fn find_vote<C: ConnectionTrait>(
        conn: &C,
        suggestion_id: &str,
        user_id: &str,
    ) -> Result<Option<suggestion_votes::Model>, AppError> {
        Ok(SuggestionVotes::find()
            .filter(suggestion_votes::Column::SuggestionId.eq(suggestion_id))
            .filter(suggestion_votes::Column::UserId.eq(user_id))
            .one(conn)
            .await?)
    }

    /// Casts, switches or retracts a vote, then re-runs auto-moderation.
    ///
    /// Voting the same type twice removes the vote. A unique-constraint race
    /// with another writer is retried by re-reading the current row.
    pub async fn vote(
        &self,
        suggestion_id: &str,
        user_id: &str,
        vote_type: VoteType,
    ) -> Result<VoteOutcome, AppError> {
        let lock = self.locks.lock(&format!("suggestion:{}", suggestion_id)).await;

        // Read before the transaction so a provider backed by the same pool
        // never waits on our own connection.
        let settings = self.config.moderation_settings().await?;

        let mut attempt = 1;
        let outcome = loop {
            match self
                .try_vote(&settings, suggestion_id, user_id, vote_type)
                .await
            {
                Err(e) if e.is_unique_violation() && attempt < self.max_attempts => {
                    warn!(
                        "🔁 Vote race on suggestion {} by user {} (attempt {}), re-reading",
                        suggestion_id, user_id, attempt
                    );
                    attempt += 1;
                }
                Err(e) if e.is_unique_violation() => {
                    return Err(AppError::Conflict(
                        "Vote changed concurrently, please retry".to_string(),
                    ));
                }
                other => break other?,
            }
        };
        drop(lock);
        self.locks.cleanup();

        if let Some(status) = outcome.transitioned_to {
            info!(
                "⚖️  Suggestion {} auto-moderated to {:?} (up {}, down {})",
                suggestion_id, status, outcome.total_upvotes, outcome.total_downvotes
            );
            self.audit
                .log(
                    AuditEventType::SuggestionAutoModerated,
                    None,
                    Some(suggestion_id.to_string()),
                    "vote",
                    Some(json!({
                        "status": status,
                        "upvotes": outcome.total_upvotes,
                        "downvotes": outcome.total_downvotes,
                    })),
                )
                .await;
        }

        self.cache.invalidate(&suggestion_key(suggestion_id));
        self.cache.invalidate_pattern(SUGGESTIONS_PATTERN);

        Ok(outcome)
    }

    async fn try_vote(
        &self,
        settings: &ModerationSettings,
        suggestion_id: &str,
        user_id: &str,
        vote_type: VoteType,
    ) -> Result<VoteOutcome, AppError> {
        let txn = self.db.begin().await?;

        let mut query = Suggestions::find_by_id(suggestion_id);
        if txn.get_database_backend() == DatabaseBackend::Postgres {
            query = query.lock_exclusive();
        }
        let suggestion = query
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Suggestion not found".to_string()))?;

        let now = Utc::now();
        let user_vote = match Self::find_vote(&txn, suggestion_id, user_id).await? {
            None => {
                suggestion_votes::ActiveModel {
                    id: Set(Uuid::new_v4().to_string()),
                    suggestion_id: Set(suggestion_id.to_string()),
                    user_id: Set(user_id.to_string()),
                    vote_type: Set(vote_type),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?;
                Some(vote_type)
            }
            Some(existing) if existing.vote_type == vote_type => {
                existing.delete(&txn).await?;
                None
            }
            Some(existing) => {
                let mut active: suggestion_votes::ActiveModel = existing.into();
                active.vote_type = Set(vote_type);
                active.updated_at = Set(now);
                active.update(&txn).await?;
                Some(vote_type)
            }
        };

        let tally = Self::recompute_tally(&txn, suggestion_id).await?;
        let decision = moderation::evaluate(
            settings,
            suggestion.suggestion_type,
            suggestion.status,
            tally,
        );

        let mut active: suggestions::ActiveModel = suggestion.into();
        active.votes_count = Set(tally.score());
        active.updated_at = Set(now);
        let transitioned_to = moderation::apply_decision(&mut active, decision, now);
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        Ok(VoteOutcome {
            total_upvotes: tally.upvotes,
            total_downvotes: tally.downvotes,
            user_vote,
            votes_count: updated.votes_count,
            status: updated.status,
            transitioned_to,
        })
    }
}

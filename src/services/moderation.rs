//! Auto-moderation of community suggestions.
//!
//! A suggestion starts `pending` and leaves that state either through the
//! threshold rules in [`evaluate`] or through an explicit admin decision.
//! Automation never moves a suggestion out of `approved` or `rejected`.

use crate::api::error::AppError;
use crate::entities::{prelude::*, suggestions};
use crate::models::{SuggestionStatus, SuggestionType};
use crate::services::admin_config::{ModerationConfigProvider, ModerationSettings};
use crate::services::audit::{AuditEventType, AuditService};
use crate::services::cache::{CacheInvalidator, SUGGESTIONS_PATTERN, suggestion_key};
use crate::services::vote_service::VoteService;
use crate::utils::auth::AuthUser;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Set, TransactionTrait};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Upvote and downvote totals for one suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoteTally {
    pub upvotes: i64,
    pub downvotes: i64,
}

impl VoteTally {
    pub fn new(upvotes: i64, downvotes: i64) -> Self {
        Self { upvotes, downvotes }
    }

    /// Net score: upvotes minus downvotes.
    pub fn score(&self) -> i64 {
        self.upvotes - self.downvotes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
    Keep,
}

impl Decision {
    pub fn target_status(&self) -> Option<SuggestionStatus> {
        match self {
            Decision::Approve => Some(SuggestionStatus::Approved),
            Decision::Reject => Some(SuggestionStatus::Rejected),
            Decision::Keep => None,
        }
    }
}

/// Applies the threshold rules to a suggestion's current tally.
///
/// Approval is checked before rejection. Rejection needs both the downvote
/// threshold and a negative net score.
pub fn evaluate(
    settings: &ModerationSettings,
    kind: SuggestionType,
    status: SuggestionStatus,
    tally: VoteTally,
) -> Decision {
    if status != SuggestionStatus::Pending || !settings.auto_approval_enabled {
        return Decision::Keep;
    }

    let score = tally.score();
    if score >= settings.approval_threshold(kind) {
        return Decision::Approve;
    }

    if settings.consider_downvotes
        && tally.downvotes >= settings.rejection_threshold(kind)
        && score < 0
    {
        return Decision::Reject;
    }

    Decision::Keep
}

/// Writes an automatic decision onto the active model. Returns the new status
/// when a transition happened.
pub fn apply_decision(
    suggestion: &mut suggestions::ActiveModel,
    decision: Decision,
    now: DateTime<Utc>,
) -> Option<SuggestionStatus> {
    let status = decision.target_status()?;
    suggestion.status = Set(status);
    suggestion.reviewed_at = Set(Some(now));
    suggestion.reviewed_by = Set(None);
    Some(status)
}

/// Admin-facing moderation operations.
pub struct ModerationService {
    db: DatabaseConnection,
    config: Arc<dyn ModerationConfigProvider>,
    cache: Arc<dyn CacheInvalidator>,
    audit: AuditService,
}

impl ModerationService {
    pub fn new(
        db: DatabaseConnection,
        config: Arc<dyn ModerationConfigProvider>,
        cache: Arc<dyn CacheInvalidator>,
    ) -> Self {
        let audit = AuditService::new(db.clone());
        Self {
            db,
            config,
            cache,
            audit,
        }
    }

    async fn find_suggestion<C: ConnectionTrait>(
        conn: &C,
        id: &str,
    ) -> Result<suggestions::Model, AppError> {
        Suggestions::find_by_id(id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Suggestion not found".to_string()))
    }

    fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
        if user.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin role required".to_string()))
        }
    }

    /// Sets the status directly, bypassing thresholds. Always honored.
    pub async fn override_status(
        &self,
        admin: &AuthUser,
        suggestion_id: &str,
        status: SuggestionStatus,
    ) -> Result<suggestions::Model, AppError> {
        Self::ensure_admin(admin)?;

        let suggestion = Self::find_suggestion(&self.db, suggestion_id).await?;
        let previous = suggestion.status;
        let now = Utc::now();

        let mut active: suggestions::ActiveModel = suggestion.into();
        active.status = Set(status);
        active.reviewed_at = Set(Some(now));
        active.reviewed_by = Set(Some(admin.id.clone()));
        active.updated_at = Set(now);
        let updated = active.update(&self.db).await?;

        info!(
            "🛡️  Suggestion {} set to {:?} by admin {} (was {:?})",
            updated.id, status, admin.id, previous
        );
        self.audit
            .log(
                AuditEventType::SuggestionOverride,
                Some(admin.id.clone()),
                Some(updated.id.clone()),
                "override_status",
                Some(json!({ "from": previous, "to": status })),
            )
            .await;
        self.invalidate(&updated.id);

        Ok(updated)
    }

    /// Recounts the votes and applies the threshold rules once more.
    /// Re-running it without new votes changes nothing.
    pub async fn reevaluate(
        &self,
        admin: &AuthUser,
        suggestion_id: &str,
    ) -> Result<suggestions::Model, AppError> {
        Self::ensure_admin(admin)?;

        let settings = self.config.moderation_settings().await?;
        let txn = self.db.begin().await?;

        let suggestion = Self::find_suggestion(&txn, suggestion_id).await?;
        let tally = VoteService::recompute_tally(&txn, suggestion_id).await?;
        let decision = evaluate(
            &settings,
            suggestion.suggestion_type,
            suggestion.status,
            tally,
        );

        let now = Utc::now();
        let mut active: suggestions::ActiveModel = suggestion.into();
        active.votes_count = Set(tally.score());
        active.updated_at = Set(now);
        let transitioned = apply_decision(&mut active, decision, now);
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        if let Some(status) = transitioned {
            info!(
                "⚖️  Suggestion {} moved to {:?} on re-evaluation (score {})",
                updated.id,
                status,
                tally.score()
            );
            self.audit
                .log(
                    AuditEventType::SuggestionAutoModerated,
                    Some(admin.id.clone()),
                    Some(updated.id.clone()),
                    "reevaluate",
                    Some(json!({ "status": status, "upvotes": tally.upvotes, "downvotes": tally.downvotes })),
                )
                .await;
        }
        self.invalidate(&updated.id);

        Ok(updated)
    }

    fn invalidate(&self, suggestion_id: &str) {
        self.cache.invalidate(&suggestion_key(suggestion_id));
        self.cache.invalidate_pattern(SUGGESTIONS_PATTERN);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ModerationSettings {
        ModerationSettings::default()
            .with_approval_threshold(SuggestionType::Category, 5)
            .with_rejection_threshold(SuggestionType::Category, 3)
    }

    #[test]
    fn test_approves_at_threshold() {
        let s = settings();
        let pending = SuggestionStatus::Pending;
        assert_eq!(
            evaluate(&s, SuggestionType::Category, pending, VoteTally::new(5, 0)),
            Decision::Approve
        );
        assert_eq!(
            evaluate(&s, SuggestionType::Category, pending, VoteTally::new(6, 2)),
            Decision::Keep
        );
        assert_eq!(
            evaluate(&s, SuggestionType::Category, pending, VoteTally::new(7, 2)),
            Decision::Approve
        );
    }

    #[test]
    fn test_rejection_needs_negative_score() {
        let s = settings();
        let pending = SuggestionStatus::Pending;
        assert_eq!(
            evaluate(&s, SuggestionType::Category, pending, VoteTally::new(0, 3)),
            Decision::Reject
        );
        assert_eq!(
            evaluate(&s, SuggestionType::Category, pending, VoteTally::new(4, 3)),
            Decision::Keep
        );
        assert_eq!(
            evaluate(&s, SuggestionType::Category, pending, VoteTally::new(0, 2)),
            Decision::Keep
        );
    }

    #[test]
    fn test_rejection_ignored_without_consider_downvotes() {
        let mut s = settings();
        s.consider_downvotes = false;
        assert_eq!(
            evaluate(
                &s,
                SuggestionType::Category,
                SuggestionStatus::Pending,
                VoteTally::new(0, 10)
            ),
            Decision::Keep
        );
    }

    #[test]
    fn test_disabled_never_transitions() {
        let mut s = settings();
        s.auto_approval_enabled = false;
        for tally in [VoteTally::new(50, 0), VoteTally::new(0, 50)] {
            assert_eq!(
                evaluate(&s, SuggestionType::Category, SuggestionStatus::Pending, tally),
                Decision::Keep
            );
        }
    }

    #[test]
    fn test_terminal_states_are_kept() {
        let s = settings();
        for status in [SuggestionStatus::Approved, SuggestionStatus::Rejected] {
            for tally in [VoteTally::new(0, 0), VoteTally::new(10, 0), VoteTally::new(0, 10)] {
                assert_eq!(
                    evaluate(&s, SuggestionType::Category, status, tally),
                    Decision::Keep
                );
            }
        }
    }

    #[test]
    fn test_approval_wins_when_both_match() {
        // A negative approval threshold lets a negative score satisfy both rules.
        let s = ModerationSettings::default()
            .with_approval_threshold(SuggestionType::Tag, -2)
            .with_rejection_threshold(SuggestionType::Tag, 1);
        assert_eq!(
            evaluate(
                &s,
                SuggestionType::Tag,
                SuggestionStatus::Pending,
                VoteTally::new(0, 1)
            ),
            Decision::Approve
        );
    }

    #[test]
    fn test_thresholds_are_per_type() {
        let s = settings().with_approval_threshold(SuggestionType::Tag, 2);
        let tally = VoteTally::new(2, 0);
        assert_eq!(
            evaluate(&s, SuggestionType::Tag, SuggestionStatus::Pending, tally),
            Decision::Approve
        );
        assert_eq!(
            evaluate(&s, SuggestionType::Category, SuggestionStatus::Pending, tally),
            Decision::Keep
        );
    }

    #[test]
    fn test_apply_decision_marks_system_review() {
        let mut active = <suggestions::ActiveModel as Default>::default();
        let now = Utc::now();
        assert_eq!(apply_decision(&mut active, Decision::Keep, now), None);
        assert_eq!(
            apply_decision(&mut active, Decision::Approve, now),
            Some(SuggestionStatus::Approved)
        );
        assert_eq!(active.reviewed_by, Set(None));
        assert_eq!(active.reviewed_at, Set(Some(now)));
    }
}

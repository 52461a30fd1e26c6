use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::models::SharePermission;
use crate::services::access::AccessService;
use crate::services::audit::{AuditEventType, AuditService};
use crate::services::cache::{CacheInvalidator, RESOURCES_PATTERN, resource_key};
use crate::utils::auth::AuthUser;
use crate::utils::validation::ensure_future;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Who a share is for. Exactly one target, by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareTarget {
    User(String),
    Group(String),
}

impl ShareTarget {
    /// Converts the two optional request fields; both or neither is invalid.
    pub fn from_parts(user_id: Option<String>, group_id: Option<String>) -> Result<Self, AppError> {
        let user_id = user_id.filter(|s| !s.trim().is_empty());
        let group_id = group_id.filter(|s| !s.trim().is_empty());
        match (user_id, group_id) {
            (Some(user), None) => Ok(Self::User(user)),
            (None, Some(group)) => Ok(Self::Group(group)),
            (Some(_), Some(_)) => Err(AppError::BadRequest(
                "shared_with_user_id and shared_with_group_id are mutually exclusive".to_string(),
            )),
            (None, None) => Err(AppError::BadRequest(
                "one of shared_with_user_id or shared_with_group_id is required".to_string(),
            )),
        }
    }

    pub fn of(share: &resource_shares::Model) -> Option<Self> {
        match (&share.shared_with_user_id, &share.shared_with_group_id) {
            (Some(user), None) => Some(Self::User(user.clone())),
            (None, Some(group)) => Some(Self::Group(group.clone())),
            _ => None,
        }
    }

    fn columns(&self) -> (Option<String>, Option<String>) {
        match self {
            Self::User(id) => (Some(id.clone()), None),
            Self::Group(id) => (None, Some(id.clone())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewShare {
    pub target: ShareTarget,
    pub permission: SharePermission,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Partial update: `None` leaves a field unchanged, `Some(None)` clears the expiry.
#[derive(Debug, Clone, Default)]
pub struct ShareUpdate {
    pub permission: Option<SharePermission>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

pub struct ShareService {
    db: DatabaseConnection,
    cache: Arc<dyn CacheInvalidator>,
    audit: AuditService,
}

impl ShareService {
    pub fn new(db: DatabaseConnection, cache: Arc<dyn CacheInvalidator>) -> Self {
        let audit = AuditService::new(db.clone());
        Self { db, cache, audit }
    }

    async fn ensure_target_exists(&self, target: &ShareTarget) -> Result<(), AppError> {
        match target {
            ShareTarget::User(id) => {
                Users::find_by_id(id)
                    .one(&self.db)
                    .await?
                    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
            }
            ShareTarget::Group(id) => {
                Groups::find_by_id(id)
                    .one(&self.db)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Group not found".to_string()))?;
            }
        }
        Ok(())
    }

    /// Share a resource the caller owns with one user or one group.
    pub async fn create_share(
        &self,
        owner: &AuthUser,
        resource_id: &str,
        share: NewShare,
    ) -> Result<resource_shares::Model, AppError> {
        let now = Utc::now();
        ensure_future("expires_at", share.expires_at, now)?;

        let resource = AccessService::owned(&self.db, resource_id, owner).await?;
        self.ensure_target_exists(&share.target).await?;

        let (user_col, group_col) = share.target.columns();
        let mut duplicate = ResourceShares::find()
            .filter(resource_shares::Column::ResourceId.eq(&resource.id));
        duplicate = match &share.target {
            ShareTarget::User(id) => {
                duplicate.filter(resource_shares::Column::SharedWithUserId.eq(id.as_str()))
            }
            ShareTarget::Group(id) => {
                duplicate.filter(resource_shares::Column::SharedWithGroupId.eq(id.as_str()))
            }
        };
        if duplicate.one(&self.db).await?.is_some() {
            return Err(AppError::Conflict(
                "Resource is already shared with this target".to_string(),
            ));
        }

        let created = resource_shares::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            resource_id: Set(resource.id.clone()),
            shared_with_user_id: Set(user_col),
            shared_with_group_id: Set(group_col),
            permission: Set(share.permission),
            expires_at: Set(share.expires_at),
            created_by: Set(owner.id.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        self.audit
            .log(
                AuditEventType::ShareCreate,
                Some(owner.id.clone()),
                Some(resource.id.clone()),
                "create_share",
                Some(json!({ "share_id": created.id, "permission": created.permission })),
            )
            .await;
        self.invalidate(&resource.id);

        Ok(created)
    }

    /// All shares of a resource, including expired (inert) ones. Owner only.
    pub async fn list_shares(
        &self,
        owner: &AuthUser,
        resource_id: &str,
    ) -> Result<Vec<resource_shares::Model>, AppError> {
        let resource = AccessService::owned(&self.db, resource_id, owner).await?;

        let shares = ResourceShares::find()
            .filter(resource_shares::Column::ResourceId.eq(&resource.id))
            .order_by_desc(resource_shares::Column::CreatedAt)
            .all(&self.db)
            .await?;

        Ok(shares)
    }

    async fn owned_share(
        &self,
        owner: &AuthUser,
        share_id: &str,
    ) -> Result<resource_shares::Model, AppError> {
        let share = ResourceShares::find_by_id(share_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Share not found".to_string()))?;

        AccessService::owned(&self.db, &share.resource_id, owner).await?;
        Ok(share)
    }

    pub async fn update_share(
        &self,
        owner: &AuthUser,
        share_id: &str,
        update: ShareUpdate,
    ) -> Result<resource_shares::Model, AppError> {
        let now = Utc::now();
        if let Some(expires_at) = update.expires_at {
            ensure_future("expires_at", expires_at, now)?;
        }

        let share = self.owned_share(owner, share_id).await?;
        let resource_id = share.resource_id.clone();

        let mut active: resource_shares::ActiveModel = share.into();
        if let Some(permission) = update.permission {
            active.permission = Set(permission);
        }
        if let Some(expires_at) = update.expires_at {
            active.expires_at = Set(expires_at);
        }
        active.updated_at = Set(now);
        let updated = active.update(&self.db).await?;

        self.audit
            .log(
                AuditEventType::ShareUpdate,
                Some(owner.id.clone()),
                Some(resource_id.clone()),
                "update_share",
                Some(json!({ "share_id": updated.id })),
            )
            .await;
        self.invalidate(&resource_id);

        Ok(updated)
    }

    /// Revoke (delete) a share
    pub async fn delete_share(&self, owner: &AuthUser, share_id: &str) -> Result<(), AppError> {
        let share = self.owned_share(owner, share_id).await?;
        let resource_id = share.resource_id.clone();
        share.delete(&self.db).await?;

        self.audit
            .log(
                AuditEventType::ShareRevoke,
                Some(owner.id.clone()),
                Some(resource_id.clone()),
                "delete_share",
                Some(json!({ "share_id": share_id })),
            )
            .await;
        self.invalidate(&resource_id);

        Ok(())
    }

    fn invalidate(&self, resource_id: &str) {
        self.cache.invalidate(&resource_key(resource_id));
        self.cache.invalidate_pattern(RESOURCES_PATTERN);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_requires_exactly_one() {
        assert_eq!(
            ShareTarget::from_parts(Some("u1".into()), None).unwrap(),
            ShareTarget::User("u1".into())
        );
        assert_eq!(
            ShareTarget::from_parts(None, Some("g1".into())).unwrap(),
            ShareTarget::Group("g1".into())
        );
        assert!(matches!(
            ShareTarget::from_parts(Some("u1".into()), Some("g1".into())),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            ShareTarget::from_parts(None, None),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_blank_ids_count_as_missing() {
        assert!(ShareTarget::from_parts(Some("  ".into()), None).is_err());
        assert_eq!(
            ShareTarget::from_parts(Some("".into()), Some("g1".into())).unwrap(),
            ShareTarget::Group("g1".into())
        );
    }
}

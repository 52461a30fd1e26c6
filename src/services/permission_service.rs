use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
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

const MIN_LABEL_LEN: usize = 3;
const MAX_LABEL_LEN: usize = 100;

/// Who a permission grant applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionScope {
    User(String),
    Group(String),
    /// Every signed-in user.
    Everyone,
}

impl PermissionScope {
    pub fn from_parts(user_id: Option<String>, group_id: Option<String>) -> Result<Self, AppError> {
        let user_id = user_id.filter(|s| !s.trim().is_empty());
        let group_id = group_id.filter(|s| !s.trim().is_empty());
        match (user_id, group_id) {
            (Some(user), None) => Ok(Self::User(user)),
            (None, Some(group)) => Ok(Self::Group(group)),
            (None, None) => Ok(Self::Everyone),
            (Some(_), Some(_)) => Err(AppError::BadRequest(
                "user_id and group_id are mutually exclusive".to_string(),
            )),
        }
    }

    pub fn of(grant: &resource_permissions::Model) -> Self {
        match (&grant.user_id, &grant.group_id) {
            (Some(user), _) => Self::User(user.clone()),
            (None, Some(group)) => Self::Group(group.clone()),
            (None, None) => Self::Everyone,
        }
    }

    fn columns(&self) -> (Option<String>, Option<String>) {
        match self {
            Self::User(id) => (Some(id.clone()), None),
            Self::Group(id) => (None, Some(id.clone())),
            Self::Everyone => (None, None),
        }
    }
}

/// Trimmed, lower-cased permission label.
pub fn normalize_label(label: &str) -> Result<String, AppError> {
    let label = label.trim().to_lowercase();
    let len = label.chars().count();
    if !(MIN_LABEL_LEN..=MAX_LABEL_LEN).contains(&len) {
        return Err(AppError::BadRequest(format!(
            "permission must be between {} and {} characters",
            MIN_LABEL_LEN, MAX_LABEL_LEN
        )));
    }
    Ok(label)
}

#[derive(Debug, Clone)]
pub struct NewPermission {
    pub scope: PermissionScope,
    pub permission: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct PermissionUpdate {
    pub permission: Option<String>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

pub struct PermissionService {
    db: DatabaseConnection,
    cache: Arc<dyn CacheInvalidator>,
    audit: AuditService,
}

impl PermissionService {
    pub fn new(db: DatabaseConnection, cache: Arc<dyn CacheInvalidator>) -> Self {
        let audit = AuditService::new(db.clone());
        Self { db, cache, audit }
    }

    pub async fn grant(
        &self,
        granter: &AuthUser,
        resource_id: &str,
        grant: NewPermission,
    ) -> Result<resource_permissions::Model, AppError> {
        let now = Utc::now();
        let label = normalize_label(&grant.permission)?;
        ensure_future("expires_at", grant.expires_at, now)?;

        let resource = AccessService::managed(&self.db, resource_id, granter).await?;

        match &grant.scope {
            PermissionScope::User(id) => {
                Users::find_by_id(id)
                    .one(&self.db)
                    .await?
                    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
            }
            PermissionScope::Group(id) => {
                Groups::find_by_id(id)
                    .one(&self.db)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Group not found".to_string()))?;
            }
            PermissionScope::Everyone => {}
        }

        let (user_id, group_id) = grant.scope.columns();
        let created = resource_permissions::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            resource_id: Set(resource.id.clone()),
            user_id: Set(user_id),
            group_id: Set(group_id),
            permission: Set(label),
            expires_at: Set(grant.expires_at),
            granted_by: Set(granter.id.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        self.audit
            .log(
                AuditEventType::PermissionGrant,
                Some(granter.id.clone()),
                Some(resource.id.clone()),
                "grant_permission",
                Some(json!({ "permission_id": created.id, "permission": created.permission })),
            )
            .await;
        self.invalidate(&resource.id);

        Ok(created)
    }

    pub async fn list(
        &self,
        requester: &AuthUser,
        resource_id: &str,
    ) -> Result<Vec<resource_permissions::Model>, AppError> {
        let resource = AccessService::managed(&self.db, resource_id, requester).await?;

        Ok(ResourcePermissions::find()
            .filter(resource_permissions::Column::ResourceId.eq(&resource.id))
            .order_by_desc(resource_permissions::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    async fn managed_grant(
        &self,
        requester: &AuthUser,
        permission_id: &str,
    ) -> Result<resource_permissions::Model, AppError> {
        let grant = ResourcePermissions::find_by_id(permission_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Permission not found".to_string()))?;

        AccessService::managed(&self.db, &grant.resource_id, requester).await?;
        Ok(grant)
    }

    pub async fn update(
        &self,
        requester: &AuthUser,
        permission_id: &str,
        update: PermissionUpdate,
    ) -> Result<resource_permissions::Model, AppError> {
        let now = Utc::now();
        let label = update.permission.as_deref().map(normalize_label).transpose()?;
        if let Some(expires_at) = update.expires_at {
            ensure_future("expires_at", expires_at, now)?;
        }

        let grant = self.managed_grant(requester, permission_id).await?;
        let resource_id = grant.resource_id.clone();

        let mut active: resource_permissions::ActiveModel = grant.into();
        if let Some(label) = label {
            active.permission = Set(label);
        }
        if let Some(expires_at) = update.expires_at {
            active.expires_at = Set(expires_at);
        }
        active.updated_at = Set(now);
        let updated = active.update(&self.db).await?;

        self.audit
            .log(
                AuditEventType::PermissionUpdate,
                Some(requester.id.clone()),
                Some(resource_id.clone()),
                "update_permission",
                Some(json!({ "permission_id": updated.id })),
            )
            .await;
        self.invalidate(&resource_id);

        Ok(updated)
    }

    pub async fn revoke(&self, requester: &AuthUser, permission_id: &str) -> Result<(), AppError> {
        let grant = self.managed_grant(requester, permission_id).await?;
        let resource_id = grant.resource_id.clone();
        grant.delete(&self.db).await?;

        self.audit
            .log(
                AuditEventType::PermissionRevoke,
                Some(requester.id.clone()),
                Some(resource_id.clone()),
                "revoke_permission",
                Some(json!({ "permission_id": permission_id })),
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
    fn test_scope_from_parts() {
        assert_eq!(
            PermissionScope::from_parts(None, None).unwrap(),
            PermissionScope::Everyone
        );
        assert_eq!(
            PermissionScope::from_parts(Some("u".into()), None).unwrap(),
            PermissionScope::User("u".into())
        );
        assert!(PermissionScope::from_parts(Some("u".into()), Some("g".into())).is_err());
    }

    #[test]
    fn test_label_normalized_and_bounded() {
        assert_eq!(normalize_label("  Write ").unwrap(), "write");
        assert!(normalize_label("rw").is_err());
        assert!(normalize_label(&"x".repeat(101)).is_err());
    }
}

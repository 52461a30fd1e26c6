//! Read/write decisions for a single resource.

use crate::api::error::AppError;
use crate::entities::{prelude::*, resource_permissions, resource_shares, resources};
use crate::models::{SharePermission, Visibility};
use crate::services::resource_query::{
    READ_LABELS, WRITE_LABELS, permission_grant_condition, share_grant_condition,
};
use crate::utils::auth::AuthUser;
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessLevel {
    Read,
    Write,
}

pub struct AccessService;

impl AccessService {
    /// Strongest active grant (share or permission) the user holds on the
    /// resource. Expiry is checked against `now` in the query itself.
    pub async fn grant_level<C: ConnectionTrait>(
        conn: &C,
        resource_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AccessLevel>, AppError> {
        let shares = ResourceShares::find()
            .filter(resource_shares::Column::ResourceId.eq(resource_id))
            .filter(share_grant_condition(user_id, now))
            .all(conn)
            .await?;

        let mut level = shares
            .iter()
            .map(|s| match s.permission {
                SharePermission::Write => AccessLevel::Write,
                SharePermission::Read => AccessLevel::Read,
            })
            .max();

        if level == Some(AccessLevel::Write) {
            return Ok(level);
        }

        let grants = ResourcePermissions::find()
            .filter(resource_permissions::Column::ResourceId.eq(resource_id))
            .filter(permission_grant_condition(user_id, &READ_LABELS, now))
            .all(conn)
            .await?;

        for grant in grants {
            let granted = if WRITE_LABELS.contains(&grant.permission.as_str()) {
                AccessLevel::Write
            } else {
                AccessLevel::Read
            };
            level = level.max(Some(granted));
        }

        Ok(level)
    }

    pub async fn can_read<C: ConnectionTrait>(
        conn: &C,
        resource: &resources::Model,
        requester: Option<&AuthUser>,
    ) -> Result<bool, AppError> {
        if resource.visibility == Visibility::Public {
            return Ok(true);
        }
        let Some(user) = requester else {
            return Ok(false);
        };
        // Admin rights are write-class only; reading goes through the same grants
        if resource.is_owned_by(&user.id) {
            return Ok(true);
        }
        if resource.visibility == Visibility::Private {
            return Ok(false);
        }

        Ok(Self::grant_level(conn, &resource.id, &user.id, Utc::now())
            .await?
            .is_some())
    }

    pub async fn can_write<C: ConnectionTrait>(
        conn: &C,
        resource: &resources::Model,
        requester: Option<&AuthUser>,
    ) -> Result<bool, AppError> {
        let Some(user) = requester else {
            return Ok(false);
        };
        if resource.is_owned_by(&user.id) || user.is_admin() {
            return Ok(true);
        }
        if resource.visibility == Visibility::Private {
            return Ok(false);
        }

        Ok(Self::grant_level(conn, &resource.id, &user.id, Utc::now()).await?
            == Some(AccessLevel::Write))
    }

    /// Missing and unreadable resources look the same to the caller.
    pub async fn readable<C: ConnectionTrait>(
        conn: &C,
        resource_id: &str,
        requester: Option<&AuthUser>,
    ) -> Result<resources::Model, AppError> {
        let resource = Resources::find_by_id(resource_id)
            .one(conn)
            .await?
            .ok_or_else(AppError::access_denied)?;

        if Self::can_read(conn, &resource, requester).await? {
            Ok(resource)
        } else {
            Err(AppError::access_denied())
        }
    }

    pub async fn writable<C: ConnectionTrait>(
        conn: &C,
        resource_id: &str,
        requester: &AuthUser,
    ) -> Result<resources::Model, AppError> {
        let resource = Resources::find_by_id(resource_id)
            .one(conn)
            .await?
            .ok_or_else(AppError::access_denied)?;

        if Self::can_write(conn, &resource, Some(requester)).await? {
            Ok(resource)
        } else {
            Err(AppError::access_denied())
        }
    }

    /// Owner only (share management).
    pub async fn owned<C: ConnectionTrait>(
        conn: &C,
        resource_id: &str,
        requester: &AuthUser,
    ) -> Result<resources::Model, AppError> {
        Resources::find_by_id(resource_id)
            .one(conn)
            .await?
            .filter(|r| r.is_owned_by(&requester.id))
            .ok_or_else(AppError::access_denied)
    }

    /// Owner or admin (deletion, permission management).
    pub async fn managed<C: ConnectionTrait>(
        conn: &C,
        resource_id: &str,
        requester: &AuthUser,
    ) -> Result<resources::Model, AppError> {
        Resources::find_by_id(resource_id)
            .one(conn)
            .await?
            .filter(|r| r.is_owned_by(&requester.id) || requester.is_admin())
            .ok_or_else(AppError::access_denied)
    }
}

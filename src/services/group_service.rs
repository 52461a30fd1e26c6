use crate::api::error::AppError;
use crate::entities::{group_members, groups, prelude::*};
use crate::utils::auth::AuthUser;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

const MAX_GROUP_NAME_LEN: usize = 100;

pub struct GroupService {
    db: DatabaseConnection,
}

impl GroupService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The creator owns the group and is its first member.
    pub async fn create(
        &self,
        owner: &AuthUser,
        name: &str,
        description: Option<String>,
    ) -> Result<groups::Model, AppError> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_GROUP_NAME_LEN {
            return Err(AppError::BadRequest(format!(
                "name must be between 1 and {} characters",
                MAX_GROUP_NAME_LEN
            )));
        }

        let now = Utc::now();
        let txn = self.db.begin().await?;
        let group = groups::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            name: Set(name.to_string()),
            description: Set(description.filter(|d| !d.trim().is_empty())),
            owner_id: Set(owner.id.clone()),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        group_members::ActiveModel {
            group_id: Set(group.id.clone()),
            user_id: Set(owner.id.clone()),
            joined_at: Set(now),
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        info!("👥 Group {} created by {}", group.id, owner.id);
        Ok(group)
    }

    /// Groups the user belongs to.
    pub async fn list_mine(&self, user: &AuthUser) -> Result<Vec<groups::Model>, AppError> {
        Ok(Groups::find()
            .inner_join(GroupMembers)
            .filter(group_members::Column::UserId.eq(&user.id))
            .order_by_asc(groups::Column::Name)
            .all(&self.db)
            .await?)
    }

    pub async fn members(
        &self,
        user: &AuthUser,
        group_id: &str,
    ) -> Result<Vec<group_members::Model>, AppError> {
        let group = self.find(group_id).await?;
        let members = GroupMembers::find()
            .filter(group_members::Column::GroupId.eq(&group.id))
            .order_by_asc(group_members::Column::JoinedAt)
            .all(&self.db)
            .await?;

        if group.owner_id != user.id
            && !user.is_admin()
            && !members.iter().any(|m| m.user_id == user.id)
        {
            return Err(AppError::access_denied());
        }
        Ok(members)
    }

    async fn find(&self, group_id: &str) -> Result<groups::Model, AppError> {
        Groups::find_by_id(group_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Group not found".to_string()))
    }

    /// Owner or admin. Shares and permissions naming the group stay behind and
    /// stop matching once no memberships remain.
    pub async fn delete(&self, user: &AuthUser, group_id: &str) -> Result<(), AppError> {
        let group = self.find(group_id).await?;
        if group.owner_id != user.id && !user.is_admin() {
            return Err(AppError::access_denied());
        }

        let txn = self.db.begin().await?;
        GroupMembers::delete_many()
            .filter(group_members::Column::GroupId.eq(&group.id))
            .exec(&txn)
            .await?;
        group.delete(&txn).await?;
        txn.commit().await?;

        Ok(())
    }

    pub async fn add_member(
        &self,
        owner: &AuthUser,
        group_id: &str,
        user_id: &str,
    ) -> Result<group_members::Model, AppError> {
        let group = self.find(group_id).await?;
        if group.owner_id != owner.id {
            return Err(AppError::access_denied());
        }

        Users::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let existing = GroupMembers::find_by_id((group.id.clone(), user_id.to_string()))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(AppError::Conflict("User is already a member".to_string()));
        }

        let member = group_members::ActiveModel {
            group_id: Set(group.id),
            user_id: Set(user_id.to_string()),
            joined_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await?;

        Ok(member)
    }

    /// The owner may remove anyone but themself; members may leave.
    pub async fn remove_member(
        &self,
        user: &AuthUser,
        group_id: &str,
        user_id: &str,
    ) -> Result<(), AppError> {
        let group = self.find(group_id).await?;
        if group.owner_id != user.id && user.id != user_id {
            return Err(AppError::access_denied());
        }
        if group.owner_id == user_id {
            return Err(AppError::BadRequest(
                "The group owner cannot be removed".to_string(),
            ));
        }

        let member = GroupMembers::find_by_id((group.id.clone(), user_id.to_string()))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Membership not found".to_string()))?;
        member.delete(&self.db).await?;

        Ok(())
    }
}

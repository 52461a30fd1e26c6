use crate::api::error::AppError;
use crate::entities::{comments, prelude::*};
use crate::services::access::AccessService;
use crate::utils::auth::AuthUser;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

const MAX_COMMENT_LEN: usize = 2000;

fn normalize_content(content: &str) -> Result<String, AppError> {
    let content = content.trim();
    if content.is_empty() || content.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::BadRequest(format!(
            "content must be between 1 and {} characters",
            MAX_COMMENT_LEN
        )));
    }
    Ok(content.to_string())
}

pub struct CommentService {
    db: DatabaseConnection,
}

impl CommentService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Oldest first.
    pub async fn list(
        &self,
        resource_id: &str,
        requester: Option<&AuthUser>,
    ) -> Result<Vec<comments::Model>, AppError> {
        let resource = AccessService::readable(&self.db, resource_id, requester).await?;
        Ok(Comments::find()
            .filter(comments::Column::ResourceId.eq(&resource.id))
            .order_by_asc(comments::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    pub async fn create(
        &self,
        author: &AuthUser,
        resource_id: &str,
        content: &str,
    ) -> Result<comments::Model, AppError> {
        let content = normalize_content(content)?;
        let resource = AccessService::readable(&self.db, resource_id, Some(author)).await?;

        let now = Utc::now();
        let comment = comments::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            resource_id: Set(resource.id),
            user_id: Set(author.id.clone()),
            content: Set(content),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        Ok(comment)
    }

    async fn find(&self, comment_id: &str) -> Result<comments::Model, AppError> {
        Comments::find_by_id(comment_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
    }

    /// Author only.
    pub async fn update(
        &self,
        author: &AuthUser,
        comment_id: &str,
        content: &str,
    ) -> Result<comments::Model, AppError> {
        let content = normalize_content(content)?;
        let comment = self.find(comment_id).await?;
        if comment.user_id != author.id {
            return Err(AppError::access_denied());
        }

        let mut active: comments::ActiveModel = comment.into();
        active.content = Set(content);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    /// Author, resource owner or admin.
    pub async fn delete(&self, user: &AuthUser, comment_id: &str) -> Result<(), AppError> {
        let comment = self.find(comment_id).await?;

        let allowed = comment.user_id == user.id
            || user.is_admin()
            || Resources::find_by_id(&comment.resource_id)
                .one(&self.db)
                .await?
                .is_some_and(|r| r.is_owned_by(&user.id));
        if !allowed {
            return Err(AppError::access_denied());
        }

        comment.delete(&self.db).await?;
        Ok(())
    }
}

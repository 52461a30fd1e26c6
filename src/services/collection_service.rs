use crate::api::error::AppError;
use crate::entities::{collection_resources, collections, prelude::*, resources};
use crate::services::access::AccessService;
use crate::services::resource_query::visible_condition;
use crate::services::resource_service::{ResourceDetail, ResourceService};
use crate::utils::auth::AuthUser;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
    sea_query::{ConditionalStatement, Query},
};
use uuid::Uuid;

const MAX_COLLECTION_NAME_LEN: usize = 100;

#[derive(Debug, Clone)]
pub struct CollectionDetail {
    pub collection: collections::Model,
    /// Only the entries the requester may read.
    pub items: Vec<ResourceDetail>,
}

pub struct CollectionService {
    db: DatabaseConnection,
}

impl CollectionService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        owner: &AuthUser,
        name: &str,
        description: Option<String>,
        is_public: bool,
    ) -> Result<collections::Model, AppError> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_COLLECTION_NAME_LEN {
            return Err(AppError::BadRequest(format!(
                "name must be between 1 and {} characters",
                MAX_COLLECTION_NAME_LEN
            )));
        }

        let now = Utc::now();
        let collection = collections::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            owner_id: Set(owner.id.clone()),
            name: Set(name.to_string()),
            description: Set(description.filter(|d| !d.trim().is_empty())),
            is_public: Set(is_public),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        Ok(collection)
    }

    pub async fn list_mine(&self, owner: &AuthUser) -> Result<Vec<collections::Model>, AppError> {
        Ok(Collections::find()
            .filter(collections::Column::OwnerId.eq(&owner.id))
            .order_by_desc(collections::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    async fn find(&self, collection_id: &str) -> Result<collections::Model, AppError> {
        Collections::find_by_id(collection_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Collection not found".to_string()))
    }

    async fn owned(&self, owner: &AuthUser, collection_id: &str) -> Result<collections::Model, AppError> {
        let collection = self.find(collection_id).await?;
        if collection.owner_id != owner.id {
            return Err(AppError::access_denied());
        }
        Ok(collection)
    }

    /// A public collection is open to anyone; its entries still go through
    /// the resource visibility predicate.
    pub async fn get(
        &self,
        collection_id: &str,
        requester: Option<&AuthUser>,
    ) -> Result<CollectionDetail, AppError> {
        let collection = self.find(collection_id).await?;
        let allowed = collection.is_public
            || requester.is_some_and(|u| u.id == collection.owner_id || u.is_admin());
        if !allowed {
            return Err(AppError::access_denied());
        }

        let entries = Query::select()
            .column(collection_resources::Column::ResourceId)
            .from(collection_resources::Entity)
            .and_where(collection_resources::Column::CollectionId.eq(&collection.id))
            .to_owned();

        let rows = Resources::find()
            .filter(resources::Column::Id.in_subquery(entries))
            .filter(visible_condition(requester, Utc::now()))
            .order_by_asc(resources::Column::Title)
            .all(&self.db)
            .await?;
        let items = ResourceService::with_tags(&self.db, rows).await?;

        Ok(CollectionDetail { collection, items })
    }

    pub async fn add_resource(
        &self,
        owner: &AuthUser,
        collection_id: &str,
        resource_id: &str,
    ) -> Result<collection_resources::Model, AppError> {
        let collection = self.owned(owner, collection_id).await?;
        let resource = AccessService::readable(&self.db, resource_id, Some(owner)).await?;

        let existing =
            CollectionResources::find_by_id((collection.id.clone(), resource.id.clone()))
                .one(&self.db)
                .await?;
        if existing.is_some() {
            return Err(AppError::Conflict(
                "Resource is already in the collection".to_string(),
            ));
        }

        let now = Utc::now();
        let entry = collection_resources::ActiveModel {
            collection_id: Set(collection.id.clone()),
            resource_id: Set(resource.id),
            added_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        let mut active: collections::ActiveModel = collection.into();
        active.updated_at = Set(now);
        active.update(&self.db).await?;

        Ok(entry)
    }

    pub async fn remove_resource(
        &self,
        owner: &AuthUser,
        collection_id: &str,
        resource_id: &str,
    ) -> Result<(), AppError> {
        let collection = self.owned(owner, collection_id).await?;
        let entry = CollectionResources::find_by_id((collection.id, resource_id.to_string()))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Resource is not in the collection".to_string()))?;
        entry.delete(&self.db).await?;
        Ok(())
    }

    /// Owner or admin.
    pub async fn delete(&self, user: &AuthUser, collection_id: &str) -> Result<(), AppError> {
        let collection = self.find(collection_id).await?;
        if collection.owner_id != user.id && !user.is_admin() {
            return Err(AppError::access_denied());
        }

        let txn = self.db.begin().await?;
        CollectionResources::delete_many()
            .filter(collection_resources::Column::CollectionId.eq(&collection.id))
            .exec(&txn)
            .await?;
        collection.delete(&txn).await?;
        txn.commit().await?;
        Ok(())
    }
}

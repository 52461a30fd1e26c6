use crate::models::{ResourceKind, Visibility};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "resources")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(indexed)]
    pub owner_id: String,
    pub title: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub category: Option<String>,
    pub resource_type: ResourceKind,
    #[sea_orm(column_type = "Text", nullable)]
    pub url: Option<String>,
    pub visibility: Visibility,
    pub views_count: i64,
    pub downloads_count: i64,
    /// Derived from `resource_ratings`, rewritten after every rating mutation.
    pub average_rating: f64,
    pub ratings_count: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::OwnerId",
        to = "super::users::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Owner,
    #[sea_orm(has_many = "super::resource_tags::Entity")]
    ResourceTags,
    #[sea_orm(has_many = "super::resource_shares::Entity")]
    ResourceShares,
    #[sea_orm(has_many = "super::resource_permissions::Entity")]
    ResourcePermissions,
    #[sea_orm(has_many = "super::resource_ratings::Entity")]
    ResourceRatings,
    #[sea_orm(has_many = "super::comments::Entity")]
    Comments,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::resource_tags::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ResourceTags.def()
    }
}

impl Related<super::resource_shares::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ResourceShares.def()
    }
}

impl Related<super::resource_permissions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ResourcePermissions.def()
    }
}

impl Related<super::resource_ratings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ResourceRatings.def()
    }
}

impl Related<super::comments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

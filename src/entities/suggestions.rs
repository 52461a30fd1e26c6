use crate::models::{SuggestionStatus, SuggestionType};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "suggestions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub suggestion_type: SuggestionType,
    pub status: SuggestionStatus,
    pub suggested_by: String,
    /// Net score (upvotes minus downvotes), recomputed on every vote.
    pub votes_count: i64,
    pub reviewed_at: Option<DateTimeUtc>,
    /// `None` on a reviewed suggestion means the system decided.
    pub reviewed_by: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::suggestion_votes::Entity")]
    SuggestionVotes,
}

impl Related<super::suggestion_votes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SuggestionVotes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

use crate::api::error::AppError;
use crate::entities::{prelude::*, resource_ratings, resources};
use crate::services::access::AccessService;
use crate::services::cache::{CacheInvalidator, RESOURCES_PATTERN, resource_key};
use crate::utils::auth::AuthUser;
use crate::utils::keyed_mutex::KeyedMutex;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection,
    EntityTrait, ModelTrait, QueryFilter, QuerySelect, Set, TransactionTrait, sea_query::Expr,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct RatingSummary {
    pub average_rating: f64,
    pub ratings_count: i64,
}

impl RatingSummary {
    /// Mean and count of the given ratings; 0/0 when there are none.
    pub fn from_ratings(ratings: &[i32]) -> Self {
        if ratings.is_empty() {
            return Self {
                average_rating: 0.0,
                ratings_count: 0,
            };
        }
        let sum: i64 = ratings.iter().map(|r| *r as i64).sum();
        let count = ratings.len() as i64;
        Self {
            average_rating: sum as f64 / count as f64,
            ratings_count: count,
        }
    }
}

pub fn validate_rating(rating: i32) -> Result<(), AppError> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        )))
    }
}

pub struct RatingService {
    db: DatabaseConnection,
    cache: Arc<dyn CacheInvalidator>,
    locks: KeyedMutex,
}

impl RatingService {
    pub fn new(db: DatabaseConnection, cache: Arc<dyn CacheInvalidator>) -> Self {
        Self {
            db,
            cache,
            locks: KeyedMutex::new(),
        }
    }

    /// Rewrites `average_rating` and `ratings_count` from the rating rows.
    pub async fn recompute<C: ConnectionTrait>(
        conn: &C,
        resource_id: &str,
    ) -> Result<RatingSummary, AppError> {
        let ratings: Vec<i32> = ResourceRatings::find()
            .select_only()
            .column(resource_ratings::Column::Rating)
            .filter(resource_ratings::Column::ResourceId.eq(resource_id))
            .into_tuple()
            .all(conn)
            .await?;

        let summary = RatingSummary::from_ratings(&ratings);

        Resources::update_many()
            .col_expr(
                resources::Column::AverageRating,
                Expr::value(summary.average_rating),
            )
            .col_expr(
                resources::Column::RatingsCount,
                Expr::value(summary.ratings_count),
            )
            .filter(resources::Column::Id.eq(resource_id))
            .exec(conn)
            .await?;

        Ok(summary)
    }

    pub async fn my_rating(
        &self,
        resource_id: &str,
        user_id: &str,
    ) -> Result<Option<i32>, AppError> {
        Ok(ResourceRatings::find()
            .filter(resource_ratings::Column::ResourceId.eq(resource_id))
            .filter(resource_ratings::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
            .map(|r| r.rating))
    }

    /// Current aggregate plus the caller's own rating, if signed in.
    pub async fn summary(
        &self,
        resource_id: &str,
        requester: Option<&AuthUser>,
    ) -> Result<(RatingSummary, Option<i32>), AppError> {
        let resource = AccessService::readable(&self.db, resource_id, requester).await?;
        let mine = match requester {
            Some(user) => self.my_rating(&resource.id, &user.id).await?,
            None => None,
        };
        Ok((
            RatingSummary {
                average_rating: resource.average_rating,
                ratings_count: resource.ratings_count,
            },
            mine,
        ))
    }

    /// Create or replace the caller's rating.
    pub async fn rate(
        &self,
        user: &AuthUser,
        resource_id: &str,
        rating: i32,
    ) -> Result<RatingSummary, AppError> {
        validate_rating(rating)?;
        let resource = AccessService::readable(&self.db, resource_id, Some(user)).await?;

        let lock = self.locks.lock(&format!("ratings:{}", resource.id)).await;
        let result = self.upsert_rating(user, &resource.id, rating).await;
        drop(lock);
        self.locks.cleanup();
        let summary = result?;

        debug!(
            "⭐ Resource {} rated {} by {} (avg {:.2} over {})",
            resource.id, rating, user.id, summary.average_rating, summary.ratings_count
        );
        self.invalidate(&resource.id);

        Ok(summary)
    }

    async fn upsert_rating(
        &self,
        user: &AuthUser,
        resource_id: &str,
        rating: i32,
    ) -> Result<RatingSummary, AppError> {
        let txn = self.db.begin().await?;
        self.lock_resource(&txn, resource_id).await?;

        let now = Utc::now();
        let existing = ResourceRatings::find()
            .filter(resource_ratings::Column::ResourceId.eq(resource_id))
            .filter(resource_ratings::Column::UserId.eq(&user.id))
            .one(&txn)
            .await?;

        match existing {
            Some(row) => {
                let mut active: resource_ratings::ActiveModel = row.into();
                active.rating = Set(rating);
                active.updated_at = Set(now);
                active.update(&txn).await?;
            }
            None => {
                let inserted = resource_ratings::ActiveModel {
                    id: Set(Uuid::new_v4().to_string()),
                    resource_id: Set(resource_id.to_string()),
                    user_id: Set(user.id.clone()),
                    rating: Set(rating),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await;
                if let Err(e) = inserted {
                    let err = AppError::from(e);
                    if err.is_unique_violation() {
                        return Err(AppError::Conflict(
                            "Rating changed concurrently, please retry".to_string(),
                        ));
                    }
                    return Err(err);
                }
            }
        }

        let summary = Self::recompute(&txn, resource_id).await?;
        txn.commit().await?;
        Ok(summary)
    }

    /// Remove the caller's rating. Removing a rating that does not exist is `NotFound`.
    pub async fn remove(&self, user: &AuthUser, resource_id: &str) -> Result<RatingSummary, AppError> {
        let resource = AccessService::readable(&self.db, resource_id, Some(user)).await?;

        let lock = self.locks.lock(&format!("ratings:{}", resource.id)).await;
        let result = self.delete_rating(user, &resource.id).await;
        drop(lock);
        self.locks.cleanup();
        let summary = result?;

        self.invalidate(&resource.id);
        Ok(summary)
    }

    async fn delete_rating(&self, user: &AuthUser, resource_id: &str) -> Result<RatingSummary, AppError> {
        let txn = self.db.begin().await?;
        self.lock_resource(&txn, resource_id).await?;

        let row = ResourceRatings::find()
            .filter(resource_ratings::Column::ResourceId.eq(resource_id))
            .filter(resource_ratings::Column::UserId.eq(&user.id))
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Rating not found".to_string()))?;
        row.delete(&txn).await?;

        let summary = Self::recompute(&txn, resource_id).await?;
        txn.commit().await?;
        Ok(summary)
    }

    /// Resources with a rating write in flight.
    pub fn busy_resources(&self) -> usize {
        self.locks.len()
    }

    async fn lock_resource<C: ConnectionTrait>(&self, conn: &C, resource_id: &str) -> Result<(), AppError> {
        if conn.get_database_backend() == DatabaseBackend::Postgres {
            Resources::find_by_id(resource_id)
                .lock_exclusive()
                .one(conn)
                .await?;
        }
        Ok(())
    }

    fn invalidate(&self, resource_id: &str) {
        self.cache.invalidate(&resource_key(resource_id));
        self.cache.invalidate_pattern(RESOURCES_PATTERN);
    }
}

use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::models::{ResourceKind, Visibility};
use crate::services::access::AccessService;
use crate::services::audit::{AuditEventType, AuditService};
use crate::services::cache::{CacheInvalidator, RESOURCES_PATTERN, resource_key};
use crate::services::resource_query::{ResourceFilters, filter_condition, visible_condition};
use crate::utils::auth::AuthUser;
use crate::utils::validation::normalize_tags;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Select, Set, TransactionTrait, sea_query::Expr,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

const MAX_TITLE_LEN: usize = 255;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResourceSort {
    #[default]
    Newest,
    Oldest,
    Rating,
    Views,
    Title,
}

impl ResourceSort {
    fn apply(self, query: Select<Resources>) -> Select<Resources> {
        let query = match self {
            ResourceSort::Newest => query.order_by_desc(resources::Column::CreatedAt),
            ResourceSort::Oldest => query.order_by_asc(resources::Column::CreatedAt),
            ResourceSort::Rating => query
                .order_by_desc(resources::Column::AverageRating)
                .order_by_desc(resources::Column::RatingsCount),
            ResourceSort::Views => query.order_by_desc(resources::Column::ViewsCount),
            ResourceSort::Title => query.order_by_asc(resources::Column::Title),
        };
        // Stable pages when the sort key ties
        query.order_by_asc(resources::Column::Id)
    }
}

/// A resource with its tag set.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDetail {
    pub resource: resources::Model,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ResourcePage {
    pub items: Vec<ResourceDetail>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub filters: ResourceFilters,
    pub sort: ResourceSort,
    /// 1-based
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Clone)]
pub struct NewResource {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub resource_type: ResourceKind,
    pub url: Option<String>,
    pub visibility: Visibility,
}

/// Partial update. Double options distinguish "leave" from "clear".
#[derive(Debug, Clone, Default)]
pub struct ResourceUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub resource_type: Option<ResourceKind>,
    pub url: Option<Option<String>>,
    pub visibility: Option<Visibility>,
}

fn normalize_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::BadRequest(format!(
            "title must be between 1 and {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(title.to_string())
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Links and repositories point somewhere; uploads may not have a URL yet.
fn check_url(kind: ResourceKind, url: &Option<String>) -> Result<(), AppError> {
    if kind != ResourceKind::FileUpload && url.is_none() {
        return Err(AppError::BadRequest(
            "url is required for external_link and github_repo resources".to_string(),
        ));
    }
    Ok(())
}

pub struct ResourceService {
    db: DatabaseConnection,
    cache: Arc<dyn CacheInvalidator>,
    audit: AuditService,
}

impl ResourceService {
    pub fn new(db: DatabaseConnection, cache: Arc<dyn CacheInvalidator>) -> Self {
        let audit = AuditService::new(db.clone());
        Self { db, cache, audit }
    }

    pub async fn tags_for<C: ConnectionTrait>(
        conn: &C,
        resource_id: &str,
    ) -> Result<Vec<String>, AppError> {
        let mut tags: Vec<String> = ResourceTags::find()
            .filter(resource_tags::Column::ResourceId.eq(resource_id))
            .all(conn)
            .await?
            .into_iter()
            .map(|t| t.name)
            .collect();
        tags.sort();
        Ok(tags)
    }

    /// Attaches tags to a page of resources with a single query.
    pub async fn with_tags<C: ConnectionTrait>(
        conn: &C,
        resources: Vec<resources::Model>,
    ) -> Result<Vec<ResourceDetail>, AppError> {
        if resources.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = resources.iter().map(|r| r.id.clone()).collect();
        let mut by_resource: HashMap<String, Vec<String>> = HashMap::new();
        for tag in ResourceTags::find()
            .filter(resource_tags::Column::ResourceId.is_in(ids))
            .all(conn)
            .await?
        {
            by_resource.entry(tag.resource_id).or_default().push(tag.name);
        }

        Ok(resources
            .into_iter()
            .map(|resource| {
                let mut tags = by_resource.remove(&resource.id).unwrap_or_default();
                tags.sort();
                ResourceDetail { resource, tags }
            })
            .collect())
    }

    async fn replace_tags<C: ConnectionTrait>(
        conn: &C,
        resource_id: &str,
        tags: &[String],
    ) -> Result<(), AppError> {
        ResourceTags::delete_many()
            .filter(resource_tags::Column::ResourceId.eq(resource_id))
            .exec(conn)
            .await?;

        if !tags.is_empty() {
            let rows = tags.iter().map(|name| resource_tags::ActiveModel {
                resource_id: Set(resource_id.to_string()),
                name: Set(name.clone()),
            });
            ResourceTags::insert_many(rows)
                .exec_without_returning(conn)
                .await?;
        }
        Ok(())
    }

    pub async fn create(
        &self,
        owner: &AuthUser,
        input: NewResource,
    ) -> Result<ResourceDetail, AppError> {
        let title = normalize_title(&input.title)?;
        let tags = normalize_tags(&input.tags)?;
        let url = blank_to_none(input.url);
        check_url(input.resource_type, &url)?;

        let now = Utc::now();
        let txn = self.db.begin().await?;

        let resource = resources::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            owner_id: Set(owner.id.clone()),
            title: Set(title),
            description: Set(blank_to_none(input.description)),
            category: Set(blank_to_none(input.category)),
            resource_type: Set(input.resource_type),
            url: Set(url),
            visibility: Set(input.visibility),
            views_count: Set(0),
            downloads_count: Set(0),
            average_rating: Set(0.0),
            ratings_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        Self::replace_tags(&txn, &resource.id, &tags).await?;

        txn.commit().await?;

        info!("📚 Resource {} created by {}", resource.id, owner.id);
        self.cache.invalidate_pattern(RESOURCES_PATTERN);

        Ok(ResourceDetail { resource, tags })
    }

    /// Fetch a readable resource and count the view.
    pub async fn get(
        &self,
        resource_id: &str,
        requester: Option<&AuthUser>,
    ) -> Result<ResourceDetail, AppError> {
        let mut resource = AccessService::readable(&self.db, resource_id, requester).await?;

        Resources::update_many()
            .col_expr(
                resources::Column::ViewsCount,
                Expr::col(resources::Column::ViewsCount).add(1),
            )
            .filter(resources::Column::Id.eq(&resource.id))
            .exec(&self.db)
            .await?;
        resource.views_count += 1;

        let tags = Self::tags_for(&self.db, &resource.id).await?;
        Ok(ResourceDetail { resource, tags })
    }

    /// Counts a download and returns the resource so the caller can redirect to its URL.
    pub async fn record_download(
        &self,
        resource_id: &str,
        requester: Option<&AuthUser>,
    ) -> Result<resources::Model, AppError> {
        let mut resource = AccessService::readable(&self.db, resource_id, requester).await?;

        Resources::update_many()
            .col_expr(
                resources::Column::DownloadsCount,
                Expr::col(resources::Column::DownloadsCount).add(1),
            )
            .filter(resources::Column::Id.eq(&resource.id))
            .exec(&self.db)
            .await?;
        resource.downloads_count += 1;

        Ok(resource)
    }

    pub async fn update(
        &self,
        editor: &AuthUser,
        resource_id: &str,
        update: ResourceUpdate,
    ) -> Result<ResourceDetail, AppError> {
        let title = update.title.as_deref().map(normalize_title).transpose()?;
        let tags = update.tags.as_deref().map(normalize_tags).transpose()?;

        let resource = AccessService::writable(&self.db, resource_id, editor).await?;

        let changes_visibility = update
            .visibility
            .is_some_and(|v| v != resource.visibility);
        if changes_visibility && !(resource.is_owned_by(&editor.id) || editor.is_admin()) {
            return Err(AppError::Forbidden(
                "Only the owner can change visibility".to_string(),
            ));
        }

        let kind = update.resource_type.unwrap_or(resource.resource_type);
        let url = match update.url.clone() {
            Some(url) => blank_to_none(url),
            None => resource.url.clone(),
        };
        check_url(kind, &url)?;

        let txn = self.db.begin().await?;
        let mut active: resources::ActiveModel = resource.into();
        if let Some(title) = title {
            active.title = Set(title);
        }
        if let Some(description) = update.description {
            active.description = Set(blank_to_none(description));
        }
        if let Some(category) = update.category {
            active.category = Set(blank_to_none(category));
        }
        if let Some(kind) = update.resource_type {
            active.resource_type = Set(kind);
        }
        if update.url.is_some() {
            active.url = Set(url);
        }
        if let Some(visibility) = update.visibility {
            active.visibility = Set(visibility);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        if let Some(ref tags) = tags {
            Self::replace_tags(&txn, &updated.id, tags).await?;
        }
        let tags = match tags {
            Some(tags) => tags,
            None => Self::tags_for(&txn, &updated.id).await?,
        };
        txn.commit().await?;

        self.invalidate(&updated.id);
        Ok(ResourceDetail {
            resource: updated,
            tags,
        })
    }

    /// Owner or admin. Removes every dependent row in one transaction.
    pub async fn delete(&self, requester: &AuthUser, resource_id: &str) -> Result<(), AppError> {
        let resource = AccessService::managed(&self.db, resource_id, requester).await?;
        let id = resource.id.clone();

        let txn = self.db.begin().await?;
        ResourceShares::delete_many()
            .filter(resource_shares::Column::ResourceId.eq(&id))
            .exec(&txn)
            .await?;
        ResourcePermissions::delete_many()
            .filter(resource_permissions::Column::ResourceId.eq(&id))
            .exec(&txn)
            .await?;
        ResourceRatings::delete_many()
            .filter(resource_ratings::Column::ResourceId.eq(&id))
            .exec(&txn)
            .await?;
        Comments::delete_many()
            .filter(comments::Column::ResourceId.eq(&id))
            .exec(&txn)
            .await?;
        ResourceTags::delete_many()
            .filter(resource_tags::Column::ResourceId.eq(&id))
            .exec(&txn)
            .await?;
        CollectionResources::delete_many()
            .filter(collection_resources::Column::ResourceId.eq(&id))
            .exec(&txn)
            .await?;
        Resources::delete_by_id(&id).exec(&txn).await?;
        txn.commit().await?;

        self.audit
            .log(
                AuditEventType::ResourceDelete,
                Some(requester.id.clone()),
                Some(id.clone()),
                "delete_resource",
                Some(json!({ "title": resource.title })),
            )
            .await;
        self.invalidate(&id);

        Ok(())
    }

    /// Visible resources matching the filters, one page at a time.
    pub async fn list(
        &self,
        requester: Option<&AuthUser>,
        query: ListQuery,
    ) -> Result<ResourcePage, AppError> {
        let per_page = query.per_page.max(1);
        let page = query.page.max(1);

        let select = query.sort.apply(
            Resources::find()
                .filter(visible_condition(requester, Utc::now()))
                .filter(filter_condition(&query.filters)),
        );

        let paginator = select.paginate(&self.db, per_page);
        let counts = paginator.num_items_and_pages().await?;
        // Past the last page the offset could overflow; there is nothing to fetch anyway
        let rows = if page > counts.number_of_pages.max(1) {
            Vec::new()
        } else {
            paginator.fetch_page(page - 1).await?
        };
        let items = Self::with_tags(&self.db, rows).await?;

        Ok(ResourcePage {
            items,
            total: counts.number_of_items,
            page,
            per_page,
            total_pages: counts.number_of_pages,
        })
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
    fn test_title_bounds() {
        assert_eq!(normalize_title("  Intro to Rust ").unwrap(), "Intro to Rust");
        assert!(normalize_title("   ").is_err());
        assert!(normalize_title(&"t".repeat(256)).is_err());
    }

    #[test]
    fn test_links_need_url() {
        assert!(check_url(ResourceKind::FileUpload, &None).is_ok());
        assert!(check_url(ResourceKind::ExternalLink, &None).is_err());
        assert!(check_url(ResourceKind::GithubRepo, &Some("https://github.com/x/y".into())).is_ok());
    }

    #[test]
    fn test_blank_to_none() {
        assert_eq!(blank_to_none(Some("  ".into())), None);
        assert_eq!(blank_to_none(Some(" a ".into())), Some("a".to_string()));
    }
}

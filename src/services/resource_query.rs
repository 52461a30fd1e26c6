//! Builds the "which resources can this requester see" predicate shared by
//! every listing. It is applied inside the SQL query, before ordering and
//! pagination.

use crate::entities::{group_members, resource_permissions, resource_shares, resource_tags, resources};
use crate::models::Visibility;
use crate::utils::auth::AuthUser;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition,
    sea_query::{ConditionalStatement, Expr, Func, LikeExpr, Query, SelectStatement},
};

/// Permission labels that the visibility resolver understands.
pub const READ_LABELS: [&str; 2] = ["read", "write"];
pub const WRITE_LABELS: [&str; 1] = ["write"];

/// `SELECT group_id FROM group_members WHERE user_id = ?`
pub fn member_groups_query(user_id: &str) -> SelectStatement {
    Query::select()
        .column(group_members::Column::GroupId)
        .from(group_members::Entity)
        .and_where(group_members::Column::UserId.eq(user_id))
        .to_owned()
}

/// `expires_at IS NULL OR expires_at > now` for shares.
pub fn share_active(now: DateTime<Utc>) -> Condition {
    Condition::any()
        .add(resource_shares::Column::ExpiresAt.is_null())
        .add(resource_shares::Column::ExpiresAt.gt(now))
}

/// `expires_at IS NULL OR expires_at > now` for permission grants.
pub fn permission_active(now: DateTime<Utc>) -> Condition {
    Condition::any()
        .add(resource_permissions::Column::ExpiresAt.is_null())
        .add(resource_permissions::Column::ExpiresAt.gt(now))
}

/// Active shares naming the user directly or through a group membership.
pub fn share_grant_condition(user_id: &str, now: DateTime<Utc>) -> Condition {
    Condition::all()
        .add(
            Condition::any()
                .add(resource_shares::Column::SharedWithUserId.eq(user_id))
                .add(
                    resource_shares::Column::SharedWithGroupId
                        .in_subquery(member_groups_query(user_id)),
                ),
        )
        .add(share_active(now))
}

/// Active permission grants naming the user, one of the user's groups, or
/// nobody (every signed-in user), restricted to the given labels.
pub fn permission_grant_condition(user_id: &str, labels: &[&str], now: DateTime<Utc>) -> Condition {
    Condition::all()
        .add(resource_permissions::Column::Permission.is_in(labels.iter().copied()))
        .add(
            Condition::any()
                .add(resource_permissions::Column::UserId.eq(user_id))
                .add(
                    resource_permissions::Column::GroupId
                        .in_subquery(member_groups_query(user_id)),
                )
                .add(
                    Condition::all()
                        .add(resource_permissions::Column::UserId.is_null())
                        .add(resource_permissions::Column::GroupId.is_null()),
                ),
        )
        .add(permission_active(now))
}

/// Predicate over `resources` selecting what the requester may read:
/// public, owned, or reachable through an active share or read/write grant.
/// Matches `AccessService::can_read`; the admin role adds nothing here.
pub fn visible_condition(requester: Option<&AuthUser>, now: DateTime<Utc>) -> Condition {
    let public = resources::Column::Visibility.eq(Visibility::Public);

    let Some(user) = requester else {
        return Condition::all().add(public);
    };

    let shared_ids = Query::select()
        .column(resource_shares::Column::ResourceId)
        .from(resource_shares::Entity)
        .cond_where(share_grant_condition(&user.id, now))
        .to_owned();

    let permitted_ids = Query::select()
        .column(resource_permissions::Column::ResourceId)
        .from(resource_permissions::Entity)
        .cond_where(permission_grant_condition(&user.id, &READ_LABELS, now))
        .to_owned();

    Condition::any()
        .add(public)
        .add(resources::Column::OwnerId.eq(user.id.as_str()))
        .add(
            Condition::all()
                .add(resources::Column::Visibility.ne(Visibility::Private))
                .add(
                    Condition::any()
                        .add(resources::Column::Id.in_subquery(shared_ids))
                        .add(resources::Column::Id.in_subquery(permitted_ids)),
                ),
        )
}

/// Caller-supplied filters, intersected with the visibility predicate.
#[derive(Debug, Clone, Default)]
pub struct ResourceFilters {
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub resource_type: Option<crate::models::ResourceKind>,
    pub owner_id: Option<String>,
    pub search: Option<String>,
}

pub fn filter_condition(filters: &ResourceFilters) -> Condition {
    let mut cond = Condition::all();

    if let Some(ref category) = filters.category {
        cond = cond.add(resources::Column::Category.eq(category.as_str()));
    }
    if let Some(kind) = filters.resource_type {
        cond = cond.add(resources::Column::ResourceType.eq(kind));
    }
    if let Some(ref owner) = filters.owner_id {
        cond = cond.add(resources::Column::OwnerId.eq(owner.as_str()));
    }

    // Every tag must be present (intersection)
    for tag in &filters.tags {
        let tagged = Query::select()
            .column(resource_tags::Column::ResourceId)
            .from(resource_tags::Entity)
            .and_where(resource_tags::Column::Name.eq(tag.as_str()))
            .to_owned();
        cond = cond.add(resources::Column::Id.in_subquery(tagged));
    }

    if let Some(ref search) = filters.search {
        let needle = search.trim();
        if !needle.is_empty() {
            cond = cond.add(search_condition(needle));
        }
    }

    cond
}

const LIKE_ESCAPE: char = '\\';

/// Escapes `%`, `_` and the escape character itself so user input matches literally.
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    out
}

/// Case-insensitive substring match over title and description.
/// `LOWER(..) LIKE` behaves the same on SQLite and Postgres.
fn search_condition(needle: &str) -> Condition {
    let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
    let like = || LikeExpr::new(pattern.clone()).escape(LIKE_ESCAPE);
    Condition::any()
        .add(Expr::expr(Func::lower(Expr::col(resources::Column::Title))).like(like()))
        .add(Expr::expr(Func::lower(Expr::col(resources::Column::Description))).like(like()))
}

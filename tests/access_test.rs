mod common;

use chrono::{Duration, Utc};
use common::{create_resource, create_tagged_resource, create_user, setup_state};
use hublib::api::error::AppError;
use hublib::entities::{prelude::*, resource_shares};
use hublib::models::{SharePermission, UserRole, Visibility};
use hublib::services::admin_config::ModerationSettings;
use hublib::services::permission_service::{NewPermission, PermissionScope};
use hublib::services::resource_query::ResourceFilters;
use hublib::services::resource_service::{ListQuery, ResourceSort, ResourceUpdate};
use hublib::services::share_service::{NewShare, ShareTarget};
use hublib::utils::auth::AuthUser;
use hublib::AppState;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use uuid::Uuid;

async fn state() -> AppState {
    setup_state(ModerationSettings::default()).await
}

fn share_with(user: &AuthUser, permission: SharePermission) -> NewShare {
    NewShare {
        target: ShareTarget::User(user.id.clone()),
        permission,
        expires_at: None,
    }
}

fn page(per_page: u64) -> ListQuery {
    ListQuery {
        filters: ResourceFilters::default(),
        sort: ResourceSort::Title,
        page: 1,
        per_page,
    }
}

#[tokio::test]
async fn test_public_resource_is_readable_anonymously() {
    let state = state().await;
    let owner = create_user(&state.db, "owner", UserRole::User).await;
    let id = create_resource(&state, &owner, "Rust book", Visibility::Public).await;

    let detail = state.resources.get(&id, None).await.unwrap();
    assert_eq!(detail.resource.title, "Rust book");
    assert_eq!(detail.resource.views_count, 1);

    let again = state.resources.get(&id, None).await.unwrap();
    assert_eq!(again.resource.views_count, 2);
}

#[tokio::test]
async fn test_missing_and_hidden_look_the_same() {
    let state = state().await;
    let owner = create_user(&state.db, "owner", UserRole::User).await;
    let stranger = create_user(&state.db, "stranger", UserRole::User).await;
    let id = create_resource(&state, &owner, "Notes", Visibility::SharedUsers).await;

    let hidden = state.resources.get(&id, Some(&stranger)).await;
    let missing = state.resources.get("no-such-id", Some(&stranger)).await;
    assert!(matches!(hidden, Err(AppError::Forbidden(_))));
    assert!(matches!(missing, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn test_private_ignores_shares() {
    let state = state().await;
    let owner = create_user(&state.db, "owner", UserRole::User).await;
    let bob = create_user(&state.db, "bob", UserRole::User).await;
    let admin = create_user(&state.db, "root", UserRole::Admin).await;
    let id = create_resource(&state, &owner, "Diary", Visibility::Private).await;

    state
        .shares
        .create_share(&owner, &id, share_with(&bob, SharePermission::Write))
        .await
        .unwrap();

    assert!(matches!(
        state.resources.get(&id, Some(&bob)).await,
        Err(AppError::Forbidden(_))
    ));
    assert!(state.resources.get(&id, Some(&owner)).await.is_ok());

    let listed = state.resources.list(Some(&bob), page(20)).await.unwrap();
    assert_eq!(listed.total, 0);

    // Admins keep write-class rights but do not read someone else's private resource
    assert!(matches!(
        state.resources.get(&id, Some(&admin)).await,
        Err(AppError::Forbidden(_))
    ));
    assert_eq!(state.resources.list(Some(&admin), page(20)).await.unwrap().total, 0);
    let renamed = state
        .resources
        .update(
            &admin,
            &id,
            ResourceUpdate {
                title: Some("Moderated".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.resource.title, "Moderated");
    state.resources.delete(&admin, &id).await.unwrap();
}

#[tokio::test]
async fn test_read_share_cannot_write() {
    let state = state().await;
    let owner = create_user(&state.db, "owner", UserRole::User).await;
    let bob = create_user(&state.db, "bob", UserRole::User).await;
    let carol = create_user(&state.db, "carol", UserRole::User).await;
    let id = create_resource(&state, &owner, "Slides", Visibility::SharedUsers).await;

    state
        .shares
        .create_share(&owner, &id, share_with(&bob, SharePermission::Read))
        .await
        .unwrap();
    state
        .shares
        .create_share(&owner, &id, share_with(&carol, SharePermission::Write))
        .await
        .unwrap();

    assert!(state.resources.get(&id, Some(&bob)).await.is_ok());

    let rename = ResourceUpdate {
        title: Some("Better slides".to_string()),
        ..Default::default()
    };
    let denied = state.resources.update(&bob, &id, rename.clone()).await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    let updated = state.resources.update(&carol, &id, rename).await.unwrap();
    assert_eq!(updated.resource.title, "Better slides");

    // Write access does not extend to visibility or deletion
    let widen = ResourceUpdate {
        visibility: Some(Visibility::Public),
        ..Default::default()
    };
    assert!(matches!(
        state.resources.update(&carol, &id, widen).await,
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        state.resources.delete(&carol, &id).await,
        Err(AppError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_expired_share_grants_nothing() {
    let state = state().await;
    let owner = create_user(&state.db, "owner", UserRole::User).await;
    let bob = create_user(&state.db, "bob", UserRole::User).await;
    let id = create_resource(&state, &owner, "Old draft", Visibility::SharedUsers).await;

    let now = Utc::now();
    resource_shares::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        resource_id: Set(id.clone()),
        shared_with_user_id: Set(Some(bob.id.clone())),
        shared_with_group_id: Set(None),
        permission: Set(SharePermission::Write),
        expires_at: Set(Some(now - Duration::hours(1))),
        created_by: Set(owner.id.clone()),
        created_at: Set(now - Duration::days(2)),
        updated_at: Set(now - Duration::days(2)),
    }
    .insert(&state.db)
    .await
    .unwrap();

    assert!(matches!(
        state.resources.get(&id, Some(&bob)).await,
        Err(AppError::Forbidden(_))
    ));
    let listed = state.resources.list(Some(&bob), page(20)).await.unwrap();
    assert_eq!(listed.total, 0);
    // Still listed for the owner, flagged by its expiry
    let shares = state.shares.list_shares(&owner, &id).await.unwrap();
    assert_eq!(shares.len(), 1);
}

#[tokio::test]
async fn test_group_share_follows_membership() {
    let state = state().await;
    let owner = create_user(&state.db, "owner", UserRole::User).await;
    let bob = create_user(&state.db, "bob", UserRole::User).await;
    let id = create_resource(&state, &owner, "Team plan", Visibility::SharedGroups).await;

    let group = state.groups.create(&owner, "team", None).await.unwrap();
    state
        .shares
        .create_share(
            &owner,
            &id,
            NewShare {
                target: ShareTarget::Group(group.id.clone()),
                permission: SharePermission::Read,
                expires_at: None,
            },
        )
        .await
        .unwrap();

    assert!(state.resources.get(&id, Some(&bob)).await.is_err());

    state.groups.add_member(&owner, &group.id, &bob.id).await.unwrap();
    assert!(state.resources.get(&id, Some(&bob)).await.is_ok());
    assert_eq!(state.resources.list(Some(&bob), page(20)).await.unwrap().total, 1);

    state.groups.remove_member(&bob, &group.id, &bob.id).await.unwrap();
    assert!(state.resources.get(&id, Some(&bob)).await.is_err());
}

#[tokio::test]
async fn test_unscoped_permission_covers_signed_in_users() {
    let state = state().await;
    let owner = create_user(&state.db, "owner", UserRole::User).await;
    let bob = create_user(&state.db, "bob", UserRole::User).await;
    let id = create_resource(&state, &owner, "Wiki", Visibility::SharedUsers).await;

    state
        .permissions
        .grant(
            &owner,
            &id,
            NewPermission {
                scope: PermissionScope::Everyone,
                permission: "Read".to_string(),
                expires_at: None,
            },
        )
        .await
        .unwrap();

    assert!(state.resources.get(&id, Some(&bob)).await.is_ok());
    assert!(state.resources.get(&id, None).await.is_err());
}

#[tokio::test]
async fn test_unknown_permission_label_is_inert() {
    let state = state().await;
    let owner = create_user(&state.db, "owner", UserRole::User).await;
    let bob = create_user(&state.db, "bob", UserRole::User).await;
    let id = create_resource(&state, &owner, "Report", Visibility::SharedUsers).await;

    let grant = state
        .permissions
        .grant(
            &owner,
            &id,
            NewPermission {
                scope: PermissionScope::User(bob.id.clone()),
                permission: "comment".to_string(),
                expires_at: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(grant.permission, "comment");

    assert!(state.resources.get(&id, Some(&bob)).await.is_err());
    assert_eq!(state.resources.list(Some(&bob), page(20)).await.unwrap().total, 0);
}

#[tokio::test]
async fn test_listing_counts_only_visible_rows() {
    let state = state().await;
    let owner = create_user(&state.db, "owner", UserRole::User).await;
    let bob = create_user(&state.db, "bob", UserRole::User).await;

    for i in 0..5 {
        create_tagged_resource(&state, &owner, &format!("Public {}", i), Visibility::Public, &["rust"]).await;
    }
    for i in 0..4 {
        create_tagged_resource(&state, &owner, &format!("Private {}", i), Visibility::Private, &["rust"]).await;
    }
    let shared = create_resource(&state, &owner, "Shared", Visibility::SharedUsers).await;
    state
        .shares
        .create_share(&owner, &shared, share_with(&bob, SharePermission::Read))
        .await
        .unwrap();

    let anon = state.resources.list(None, page(2)).await.unwrap();
    assert_eq!(anon.total, 5);
    assert_eq!(anon.total_pages, 3);
    assert_eq!(anon.items.len(), 2);
    assert!(anon.items.iter().all(|d| d.resource.visibility == Visibility::Public));

    let last = state
        .resources
        .list(None, ListQuery { page: 3, ..page(2) })
        .await
        .unwrap();
    assert_eq!(last.items.len(), 1);

    assert_eq!(state.resources.list(Some(&bob), page(20)).await.unwrap().total, 6);
    assert_eq!(state.resources.list(Some(&owner), page(20)).await.unwrap().total, 10);

    let tagged = state
        .resources
        .list(
            Some(&bob),
            ListQuery {
                filters: ResourceFilters {
                    tags: vec!["rust".to_string()],
                    ..Default::default()
                },
                ..page(20)
            },
        )
        .await
        .unwrap();
    assert_eq!(tagged.total, 5);
    assert!(tagged.items.iter().all(|d| d.tags == vec!["rust".to_string()]));
}

#[tokio::test]
async fn test_share_creation_rules() {
    let state = state().await;
    let owner = create_user(&state.db, "owner", UserRole::User).await;
    let bob = create_user(&state.db, "bob", UserRole::User).await;
    let id = create_resource(&state, &owner, "Paper", Visibility::SharedUsers).await;

    assert!(matches!(
        ShareTarget::from_parts(Some(bob.id.clone()), Some("g".to_string())),
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        ShareTarget::from_parts(None, None),
        Err(AppError::BadRequest(_))
    ));

    let by_stranger = state
        .shares
        .create_share(&bob, &id, share_with(&owner, SharePermission::Read))
        .await;
    assert!(matches!(by_stranger, Err(AppError::Forbidden(_))));

    let unknown_resource = state
        .shares
        .create_share(&owner, "missing", share_with(&bob, SharePermission::Read))
        .await;
    assert!(matches!(unknown_resource, Err(AppError::Forbidden(_))));

    let past = state
        .shares
        .create_share(
            &owner,
            &id,
            NewShare {
                expires_at: Some(Utc::now() - Duration::minutes(5)),
                ..share_with(&bob, SharePermission::Read)
            },
        )
        .await;
    assert!(matches!(past, Err(AppError::BadRequest(_))));

    let unknown_user = state
        .shares
        .create_share(
            &owner,
            &id,
            NewShare {
                target: ShareTarget::User("ghost".to_string()),
                permission: SharePermission::Read,
                expires_at: None,
            },
        )
        .await;
    assert!(matches!(unknown_user, Err(AppError::NotFound(_))));

    state
        .shares
        .create_share(&owner, &id, share_with(&bob, SharePermission::Read))
        .await
        .unwrap();
    let duplicate = state
        .shares
        .create_share(&owner, &id, share_with(&bob, SharePermission::Write))
        .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_delete_removes_dependents() {
    let state = state().await;
    let owner = create_user(&state.db, "owner", UserRole::User).await;
    let bob = create_user(&state.db, "bob", UserRole::User).await;
    let id = create_tagged_resource(&state, &owner, "Gone soon", Visibility::Public, &["a", "b"]).await;

    state
        .shares
        .create_share(&owner, &id, share_with(&bob, SharePermission::Read))
        .await
        .unwrap();
    state.ratings.rate(&bob, &id, 4).await.unwrap();
    state.comments.create(&bob, &id, "Nice").await.unwrap();
    let collection = state
        .collections
        .create(&bob, "Favourites", None, true)
        .await
        .unwrap();
    state
        .collections
        .add_resource(&bob, &collection.id, &id)
        .await
        .unwrap();

    state.resources.delete(&owner, &id).await.unwrap();

    assert!(Resources::find_by_id(&id).one(&state.db).await.unwrap().is_none());
    assert_eq!(ResourceTags::find().count(&state.db).await.unwrap(), 0);
    assert_eq!(ResourceShares::find().count(&state.db).await.unwrap(), 0);
    assert_eq!(ResourceRatings::find().count(&state.db).await.unwrap(), 0);
    assert_eq!(Comments::find().count(&state.db).await.unwrap(), 0);
    assert_eq!(CollectionResources::find().count(&state.db).await.unwrap(), 0);
    assert_eq!(Collections::find().count(&state.db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_read_share_end_to_end() {
    let state = state().await;
    let owner = create_user(&state.db, "owner", UserRole::User).await;
    let reader = create_user(&state.db, "reader", UserRole::User).await;
    let outsider = create_user(&state.db, "outsider", UserRole::User).await;
    let id = create_resource(&state, &owner, "Handbook", Visibility::SharedUsers).await;

    state
        .shares
        .create_share(&owner, &id, share_with(&reader, SharePermission::Read))
        .await
        .unwrap();

    assert!(state.resources.get(&id, Some(&owner)).await.is_ok());
    assert!(state.resources.get(&id, Some(&reader)).await.is_ok());
    assert!(matches!(
        state.resources.get(&id, Some(&outsider)).await,
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        state.resources.get(&id, None).await,
        Err(AppError::Forbidden(_))
    ));

    assert_eq!(state.resources.list(Some(&reader), page(20)).await.unwrap().total, 1);
    assert_eq!(state.resources.list(Some(&outsider), page(20)).await.unwrap().total, 0);
    assert_eq!(state.resources.list(None, page(20)).await.unwrap().total, 0);
}

#[tokio::test]
async fn test_tag_filter_requires_every_tag() {
    let state = state().await;
    let owner = create_user(&state.db, "owner", UserRole::User).await;
    create_tagged_resource(&state, &owner, "Only rust", Visibility::Public, &["rust"]).await;
    let both = create_tagged_resource(&state, &owner, "Rust async", Visibility::Public, &["rust", "async"]).await;
    create_tagged_resource(&state, &owner, "Only async", Visibility::Public, &["async"]).await;

    let listed = state
        .resources
        .list(
            None,
            ListQuery {
                filters: ResourceFilters {
                    tags: vec!["rust".to_string(), "async".to_string()],
                    ..Default::default()
                },
                ..page(20)
            },
        )
        .await
        .unwrap();
    assert_eq!(listed.total, 1);
    assert_eq!(listed.items[0].resource.id, both);
}

#[tokio::test]
async fn test_search_matches_wildcards_literally() {
    let state = state().await;
    let owner = create_user(&state.db, "owner", UserRole::User).await;
    create_resource(&state, &owner, "100% Rust", Visibility::Public).await;
    create_resource(&state, &owner, "1000 Rust tips", Visibility::Public).await;
    create_resource(&state, &owner, "snake_case names", Visibility::Public).await;
    create_resource(&state, &owner, "snakeXcase names", Visibility::Public).await;

    let search = |term: &str| ListQuery {
        filters: ResourceFilters {
            search: Some(term.to_string()),
            ..Default::default()
        },
        ..page(20)
    };

    let percent = state.resources.list(None, search("100%")).await.unwrap();
    assert_eq!(percent.total, 1);
    assert_eq!(percent.items[0].resource.title, "100% Rust");

    let underscore = state.resources.list(None, search("SNAKE_case")).await.unwrap();
    assert_eq!(underscore.total, 1);
    assert_eq!(underscore.items[0].resource.title, "snake_case names");

    assert_eq!(state.resources.list(None, search("rust")).await.unwrap().total, 2);
}

#[tokio::test]
async fn test_page_past_the_end_is_empty() {
    let state = state().await;
    let owner = create_user(&state.db, "owner", UserRole::User).await;
    for i in 0..3 {
        create_resource(&state, &owner, &format!("Item {}", i), Visibility::Public).await;
    }

    for requested in [4, u64::MAX] {
        let listed = state
            .resources
            .list(None, ListQuery { page: requested, ..page(20) })
            .await
            .unwrap();
        assert!(listed.items.is_empty());
        assert_eq!(listed.total, 3);
        assert_eq!(listed.total_pages, 1);
        assert_eq!(listed.page, requested);
    }

    let huge = state
        .resources
        .list(None, ListQuery { page: u64::MAX, per_page: u64::MAX, ..page(20) })
        .await
        .unwrap();
    assert!(huge.items.is_empty());
}

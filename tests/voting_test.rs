mod common;

use common::{create_user, setup_state};
use hublib::api::error::AppError;
use hublib::entities::prelude::*;
use hublib::models::{SuggestionStatus, SuggestionType, UserRole, VoteType};
use hublib::services::admin_config::ModerationSettings;
use hublib::services::vote_service::VoteService;
use hublib::utils::auth::AuthUser;
use hublib::AppState;
use sea_orm::{EntityTrait, PaginatorTrait};

fn settings(approval: i64, rejection: i64) -> ModerationSettings {
    ModerationSettings::default()
        .with_approval_threshold(SuggestionType::Category, approval)
        .with_rejection_threshold(SuggestionType::Category, rejection)
}

async fn voters(state: &AppState, n: usize) -> Vec<AuthUser> {
    let mut users = Vec::with_capacity(n);
    for i in 0..n {
        users.push(create_user(&state.db, &format!("voter{}", i), UserRole::User).await);
    }
    users
}

async fn new_suggestion(state: &AppState, author: &AuthUser) -> String {
    state
        .suggestions
        .create(author, "machine-learning", None, SuggestionType::Category)
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_vote_toggle_and_switch() {
    let state = setup_state(settings(100, 100)).await;
    let alice = create_user(&state.db, "alice", UserRole::User).await;
    let id = new_suggestion(&state, &alice).await;

    let out = state.votes.vote(&id, &alice.id, VoteType::Upvote).await.unwrap();
    assert_eq!((out.total_upvotes, out.total_downvotes), (1, 0));
    assert_eq!(out.user_vote, Some(VoteType::Upvote));
    assert_eq!(out.votes_count, 1);

    // Same vote again removes it
    let out = state.votes.vote(&id, &alice.id, VoteType::Upvote).await.unwrap();
    assert_eq!((out.total_upvotes, out.total_downvotes), (0, 0));
    assert_eq!(out.user_vote, None);
    assert_eq!(out.votes_count, 0);
    assert_eq!(SuggestionVotes::find().count(&state.db).await.unwrap(), 0);

    let out = state.votes.vote(&id, &alice.id, VoteType::Downvote).await.unwrap();
    assert_eq!(out.votes_count, -1);

    // Opposite vote switches in place
    let out = state.votes.vote(&id, &alice.id, VoteType::Upvote).await.unwrap();
    assert_eq!((out.total_upvotes, out.total_downvotes), (1, 0));
    assert_eq!(out.user_vote, Some(VoteType::Upvote));
    assert_eq!(SuggestionVotes::find().count(&state.db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_votes_count_matches_rows() {
    let state = setup_state(settings(100, 100)).await;
    let users = voters(&state, 6).await;
    let id = new_suggestion(&state, &users[0]).await;

    for (i, user) in users.iter().enumerate() {
        let kind = if i % 3 == 0 { VoteType::Downvote } else { VoteType::Upvote };
        state.votes.vote(&id, &user.id, kind).await.unwrap();
    }
    // One user toggles off
    state.votes.vote(&id, &users[1].id, VoteType::Upvote).await.unwrap();

    let tally = VoteService::recompute_tally(&state.db, &id).await.unwrap();
    let stored = Suggestions::find_by_id(&id).one(&state.db).await.unwrap().unwrap();
    assert_eq!(tally.upvotes, 3);
    assert_eq!(tally.downvotes, 2);
    assert_eq!(stored.votes_count, tally.score());
}

#[tokio::test]
async fn test_auto_approval_at_threshold() {
    let state = setup_state(settings(3, 2)).await;
    let users = voters(&state, 3).await;
    let id = new_suggestion(&state, &users[0]).await;

    for user in &users[..2] {
        let out = state.votes.vote(&id, &user.id, VoteType::Upvote).await.unwrap();
        assert_eq!(out.status, SuggestionStatus::Pending);
    }
    let out = state.votes.vote(&id, &users[2].id, VoteType::Upvote).await.unwrap();
    assert_eq!(out.status, SuggestionStatus::Approved);
    assert_eq!(out.transitioned_to, Some(SuggestionStatus::Approved));

    let stored = Suggestions::find_by_id(&id).one(&state.db).await.unwrap().unwrap();
    assert_eq!(stored.status, SuggestionStatus::Approved);
    assert!(stored.reviewed_at.is_some());
    assert_eq!(stored.reviewed_by, None);
}

#[tokio::test]
async fn test_terminal_state_is_kept() {
    let state = setup_state(settings(2, 1)).await;
    let users = voters(&state, 6).await;
    let id = new_suggestion(&state, &users[0]).await;

    state.votes.vote(&id, &users[0].id, VoteType::Upvote).await.unwrap();
    let out = state.votes.vote(&id, &users[1].id, VoteType::Upvote).await.unwrap();
    assert_eq!(out.status, SuggestionStatus::Approved);

    for user in &users[2..] {
        let out = state.votes.vote(&id, &user.id, VoteType::Downvote).await.unwrap();
        assert_eq!(out.status, SuggestionStatus::Approved);
        assert_eq!(out.transitioned_to, None);
    }
    let stored = Suggestions::find_by_id(&id).one(&state.db).await.unwrap().unwrap();
    assert_eq!(stored.votes_count, -2);
    assert_eq!(stored.status, SuggestionStatus::Approved);
}

#[tokio::test]
async fn test_auto_rejection_needs_negative_score() {
    let state = setup_state(settings(10, 2)).await;
    let users = voters(&state, 7).await;
    let id = new_suggestion(&state, &users[0]).await;

    for user in &users[..3] {
        state.votes.vote(&id, &user.id, VoteType::Upvote).await.unwrap();
    }
    // Enough downvotes, but the score is still positive
    for user in &users[3..5] {
        let out = state.votes.vote(&id, &user.id, VoteType::Downvote).await.unwrap();
        assert_eq!(out.status, SuggestionStatus::Pending);
    }
    state.votes.vote(&id, &users[5].id, VoteType::Downvote).await.unwrap();
    let out = state.votes.vote(&id, &users[6].id, VoteType::Downvote).await.unwrap();
    assert_eq!(out.votes_count, -1);
    assert_eq!(out.status, SuggestionStatus::Rejected);
}

#[tokio::test]
async fn test_downvotes_ignored_when_not_considered() {
    let mut s = settings(10, 1);
    s.consider_downvotes = false;
    let state = setup_state(s).await;
    let users = voters(&state, 4).await;
    let id = new_suggestion(&state, &users[0]).await;

    for user in &users {
        let out = state.votes.vote(&id, &user.id, VoteType::Downvote).await.unwrap();
        assert_eq!(out.status, SuggestionStatus::Pending);
    }
}

#[tokio::test]
async fn test_disabled_auto_approval_never_transitions() {
    let mut s = settings(1, 1);
    s.auto_approval_enabled = false;
    let state = setup_state(s).await;
    let users = voters(&state, 5).await;
    let id = new_suggestion(&state, &users[0]).await;

    for user in &users {
        let out = state.votes.vote(&id, &user.id, VoteType::Upvote).await.unwrap();
        assert_eq!(out.status, SuggestionStatus::Pending);
    }
    let stored = Suggestions::find_by_id(&id).one(&state.db).await.unwrap().unwrap();
    assert_eq!(stored.votes_count, 5);
    assert!(stored.reviewed_at.is_none());
}

#[tokio::test]
async fn test_admin_override_from_any_state() {
    let state = setup_state(settings(1, 1)).await;
    let admin = create_user(&state.db, "admin", UserRole::Admin).await;
    let alice = create_user(&state.db, "alice", UserRole::User).await;
    let id = new_suggestion(&state, &alice).await;

    state.votes.vote(&id, &alice.id, VoteType::Upvote).await.unwrap();

    for status in [
        SuggestionStatus::Rejected,
        SuggestionStatus::Pending,
        SuggestionStatus::Approved,
        SuggestionStatus::Approved,
    ] {
        let updated = state
            .moderation
            .override_status(&admin, &id, status)
            .await
            .unwrap();
        assert_eq!(updated.status, status);
        assert_eq!(updated.reviewed_by.as_deref(), Some(admin.id.as_str()));
        assert!(updated.reviewed_at.is_some());
    }

    let denied = state
        .moderation
        .override_status(&alice, &id, SuggestionStatus::Rejected)
        .await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn test_reevaluation_is_idempotent() {
    let state = setup_state(settings(2, 1)).await;
    let admin = create_user(&state.db, "admin", UserRole::Admin).await;
    let users = voters(&state, 2).await;
    let id = new_suggestion(&state, &users[0]).await;

    for user in &users {
        state.votes.vote(&id, &user.id, VoteType::Upvote).await.unwrap();
    }
    // Put it back to pending by hand, then let the rules run again
    state
        .moderation
        .override_status(&admin, &id, SuggestionStatus::Pending)
        .await
        .unwrap();

    let first = state.moderation.reevaluate(&admin, &id).await.unwrap();
    assert_eq!(first.status, SuggestionStatus::Approved);
    assert_eq!(first.reviewed_by, None);

    let second = state.moderation.reevaluate(&admin, &id).await.unwrap();
    assert_eq!(second.status, first.status);
    assert_eq!(second.votes_count, first.votes_count);
    assert_eq!(second.reviewed_by, None);
}

#[tokio::test]
async fn test_vote_on_missing_suggestion() {
    let state = setup_state(ModerationSettings::default()).await;
    let alice = create_user(&state.db, "alice", UserRole::User).await;

    let result = state.votes.vote("missing", &alice.id, VoteType::Upvote).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_concurrent_votes_keep_counter_exact() {
    let state = setup_state(settings(1000, 1000)).await;
    let users = voters(&state, 20).await;
    let id = new_suggestion(&state, &users[0]).await;

    let mut handles = Vec::new();
    for (i, user) in users.iter().enumerate() {
        let votes = state.votes.clone();
        let id = id.clone();
        let user_id = user.id.clone();
        let kind = if i % 4 == 0 { VoteType::Downvote } else { VoteType::Upvote };
        handles.push(tokio::spawn(async move {
            votes.vote(&id, &user_id, kind).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let tally = VoteService::recompute_tally(&state.db, &id).await.unwrap();
    let stored = Suggestions::find_by_id(&id).one(&state.db).await.unwrap().unwrap();
    assert_eq!(tally.upvotes, 15);
    assert_eq!(tally.downvotes, 5);
    assert_eq!(stored.votes_count, 10);
}

#[tokio::test]
async fn test_withdrawing_suggestion_removes_votes() {
    let state = setup_state(settings(100, 100)).await;
    let users = voters(&state, 3).await;
    let id = new_suggestion(&state, &users[0]).await;
    for user in &users {
        state.votes.vote(&id, &user.id, VoteType::Upvote).await.unwrap();
    }

    // Only the suggester (or an admin) may delete
    let denied = state.suggestions.delete(&users[1], &id).await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    state.suggestions.delete(&users[0], &id).await.unwrap();
    assert_eq!(SuggestionVotes::find().count(&state.db).await.unwrap(), 0);
    assert!(Suggestions::find_by_id(&id).one(&state.db).await.unwrap().is_none());
}

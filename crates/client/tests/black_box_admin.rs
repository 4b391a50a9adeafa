mod common;

use chrono::Utc;
use common::{Harness, OWNER, OWNER_PASSWORD};
use warden_auth::{DeletedOrder, LifecycleState, Role};
use warden_client::{ClientError, PurgeConfirmation, SoftDeleteConfirmation};
use warden_core::UserId;

/// Owner is id 1; fillers take ids up to 41 so the target lands on 42.
fn harness_with_user_42() -> (Harness, UserId) {
    let h = Harness::new();
    for n in 2..42 {
        h.add_standard(&format!("filler{n:02}"));
    }
    let ulysses = h.add_standard("ulysses");
    assert_eq!(ulysses, UserId::new(42));
    (h, ulysses)
}

#[tokio::test]
async fn soft_delete_then_restore_round_trip() {
    let (h, u) = harness_with_user_42();
    h.login_owner().await;
    let directory = h.client.directory();
    let deleted = h.client.deleted();

    assert!(directory.list_users().await.unwrap().iter().any(|i| i.id == u));

    let before = Utc::now();
    directory
        .delete_user(u, &SoftDeleteConfirmation::granted(u))
        .await
        .unwrap();

    assert!(directory.cached().iter().all(|i| i.id != u));
    assert!(directory.list_users().await.unwrap().iter().all(|i| i.id != u));

    let records = deleted.list_deleted().await.unwrap();
    let record = records.iter().find(|r| r.id() == u).unwrap();
    assert!(record.deleted_at >= before);
    assert_eq!(record.deleted_by, Some(h.owner));
    assert_eq!(record.deleted_by_username.as_deref(), Some(OWNER));

    deleted.restore(u).await.unwrap();

    assert!(deleted.cached().iter().all(|r| r.id() != u));
    assert!(directory.list_users().await.unwrap().iter().any(|i| i.id == u));
    assert!(deleted.list_deleted().await.unwrap().iter().all(|r| r.id() != u));
    assert_eq!(h.authority.lifecycle(u), Some(LifecycleState::Active));
}

#[tokio::test]
async fn concurrent_restores_have_exactly_one_winner() {
    let (h, u) = harness_with_user_42();
    h.login_owner().await;
    h.client
        .directory()
        .delete_user(u, &SoftDeleteConfirmation::granted(u))
        .await
        .unwrap();

    let other = h.second_client();
    other.login(OWNER, OWNER_PASSWORD).await.unwrap();

    let (a, b) = tokio::join!(h.client.deleted().restore(u), other.deleted().restore(u));

    let outcomes = [a, b];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    let not_found = outcomes
        .iter()
        .filter(|r| matches!(r, Err(ClientError::NotFound(_))))
        .count();
    assert_eq!((wins, not_found), (1, 1));
    assert_eq!(h.authority.lifecycle(u), Some(LifecycleState::Active));
    assert!(h.client.session().is_authenticated());
}

#[tokio::test]
async fn privileged_target_is_refused_without_a_request() {
    let h = Harness::new();
    let other_owner = h.authority.add_user("admin2", "password1", Role::Privileged);
    h.login_owner().await;
    h.client.directory().list_users().await.unwrap();

    let err = h
        .client
        .directory()
        .delete_user(other_owner, &SoftDeleteConfirmation::granted(other_owner))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Refused(_)));
    assert_eq!(h.authority.requests_to(&format!("/admin/users/{other_owner}")), 0);
    assert_eq!(h.authority.lifecycle(other_owner), Some(LifecycleState::Active));
}

#[tokio::test]
async fn self_deletion_is_refused() {
    let h = Harness::new();
    h.login_owner().await;

    let err = h
        .client
        .directory()
        .delete_user(h.owner, &SoftDeleteConfirmation::granted(h.owner))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Refused(_)));
}

#[tokio::test]
async fn unconfirmed_delete_is_refused() {
    let h = Harness::new();
    let bob = h.add_standard("bob");
    h.login_owner().await;

    let err = h
        .client
        .directory()
        .delete_user(bob, &SoftDeleteConfirmation::declined(bob))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Refused(_)));
    assert_eq!(h.authority.lifecycle(bob), Some(LifecycleState::Active));
}

#[tokio::test]
async fn purge_requires_the_typed_username() {
    let h = Harness::new();
    let bob = h.add_standard("bob");
    h.authority.soft_delete(bob, Some(h.owner)).unwrap();
    h.login_owner().await;
    let deleted = h.client.deleted();

    let err = deleted
        .permanent_delete(bob, &PurgeConfirmation::new(bob, "robert"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Refused(_)));
    assert!(h.authority.lifecycle(bob).unwrap().is_soft_deleted());

    deleted
        .permanent_delete(bob, &PurgeConfirmation::new(bob, "bob"))
        .await
        .unwrap();

    assert_eq!(h.authority.lifecycle(bob), Some(LifecycleState::Purged));
    assert!(deleted.list_deleted().await.unwrap().is_empty());
    assert!(
        h.client
            .directory()
            .list_users_with(true)
            .await
            .unwrap()
            .iter()
            .all(|i| i.id != bob)
    );
}

#[tokio::test]
async fn purge_after_concurrent_restore_is_not_found() {
    let h = Harness::new();
    let bob = h.add_standard("bob");
    h.authority.soft_delete(bob, Some(h.owner)).unwrap();
    h.login_owner().await;
    let deleted = h.client.deleted();
    deleted.list_deleted().await.unwrap();

    // Another administrator restores bob in the meantime.
    let other = h.second_client();
    other.login(OWNER, OWNER_PASSWORD).await.unwrap();
    other.deleted().restore(bob).await.unwrap();

    let err = deleted
        .permanent_delete(bob, &PurgeConfirmation::new(bob, "bob"))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::NotFound(_)));
    assert!(deleted.cached().is_empty());
    assert_eq!(h.authority.lifecycle(bob), Some(LifecycleState::Active));
}

#[tokio::test]
async fn include_deleted_lists_soft_deleted_identities() {
    let h = Harness::new();
    let bob = h.add_standard("bob");
    h.authority.soft_delete(bob, Some(h.owner)).unwrap();
    h.login_owner().await;
    let directory = h.client.directory();

    assert!(directory.list_users().await.unwrap().iter().all(|i| i.id != bob));
    assert!(directory.list_users_with(true).await.unwrap().iter().any(|i| i.id == bob));
    // The include-deleted listing does not replace the cached view.
    assert!(directory.cached().iter().all(|i| i.id != bob));
}

#[tokio::test]
async fn deleted_listing_orders() {
    let h = Harness::new();
    let zed = h.add_standard("zed");
    let amy = h.add_standard("amy");
    h.authority.soft_delete(zed, Some(h.owner)).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    h.authority.soft_delete(amy, Some(h.owner)).unwrap();
    h.login_owner().await;
    let deleted = h.client.deleted();

    let newest: Vec<UserId> = deleted.list_deleted().await.unwrap().iter().map(|r| r.id()).collect();
    assert_eq!(newest, vec![amy, zed]);

    let oldest: Vec<UserId> = deleted
        .list_deleted_by(DeletedOrder::OldestFirst)
        .await
        .unwrap()
        .iter()
        .map(|r| r.id())
        .collect();
    assert_eq!(oldest, vec![zed, amy]);

    let by_name: Vec<String> = deleted
        .list_deleted_by(DeletedOrder::Username)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.identity.username)
        .collect();
    assert_eq!(by_name, vec!["amy", "zed"]);
}

#[tokio::test]
async fn forbidden_when_role_was_revoked_server_side() {
    let h = Harness::new();
    h.login_owner().await;
    h.authority.force_status("/admin/users/deleted/list", 403);

    let err = h.client.deleted().list_deleted().await.unwrap_err();
    assert!(matches!(err, ClientError::Forbidden(_)));
    assert!(h.client.session().is_authenticated());
}

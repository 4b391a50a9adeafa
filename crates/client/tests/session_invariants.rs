use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use proptest::prelude::*;
use warden_auth::{BearerToken, Identity, Role};
use warden_client::{
    ApiRequest, ClearReason, ClientError, InMemoryAuthority, MemoryTokenStore, SessionStore,
};
use warden_core::UserId;

#[derive(Debug, Clone)]
enum Op {
    Establish(Role),
    Clear(ClearReason),
    StaleClear(ClearReason),
    Acknowledge,
    RejectedCall,
}

fn any_reason() -> impl Strategy<Value = ClearReason> {
    prop_oneof![
        Just(ClearReason::Logout),
        Just(ClearReason::Expired),
        Just(ClearReason::Removed),
        Just(ClearReason::InvalidToken),
    ]
}

fn any_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        prop_oneof![Just(Role::Standard), Just(Role::Privileged)].prop_map(Op::Establish),
        any_reason().prop_map(Op::Clear),
        any_reason().prop_map(Op::StaleClear),
        Just(Op::Acknowledge),
        Just(Op::RejectedCall),
    ]
}

fn identity(role: Role) -> Identity {
    Identity {
        id: UserId::new(9),
        username: "ivy".to_string(),
        email: "ivy@example.com".to_string(),
        role,
        active: true,
        theme_preference: None,
        created_at: Utc::now(),
    }
}

fn store() -> (SessionStore, Arc<MemoryTokenStore>) {
    let tokens = Arc::new(MemoryTokenStore::new());
    // The authority never issued "unknown-token", so every authenticated call is a 401.
    let store = SessionStore::new(
        Arc::new(InMemoryAuthority::new()),
        tokens.clone(),
        Duration::from_secs(1),
    );
    (store, tokens)
}

proptest! {
    #[test]
    fn random_transitions_preserve_session_invariants(ops in prop::collection::vec(any_op(), 1..40)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let (store, tokens) = store();

        for op in ops {
            let before = store.generation();
            match op {
                Op::Establish(role) => {
                    store.establish(BearerToken::new("unknown-token"), identity(role)).unwrap();
                    prop_assert!(tokens.current().is_some());
                }
                Op::Clear(reason) => {
                    store.clear(reason, None);
                    let s = store.snapshot();
                    prop_assert!(!s.is_authenticated());
                    prop_assert!(s.token().is_none());
                    prop_assert!(tokens.current().is_none());
                    prop_assert_eq!(s.is_removed(), reason == ClearReason::Removed);
                }
                Op::StaleClear(reason) => {
                    let was = store.snapshot();
                    prop_assert!(!store.clear(reason, Some(before.wrapping_add(1))));
                    prop_assert_eq!(store.snapshot(), was);
                }
                Op::Acknowledge => {
                    store.acknowledge_removed();
                    prop_assert!(!store.snapshot().is_removed());
                }
                Op::RejectedCall => {
                    let was_authenticated = store.snapshot().is_authenticated();
                    let result = rt.block_on(store.authenticated_call(ApiRequest::get("/admin/users")));
                    match result {
                        Err(ClientError::AuthExpired) => prop_assert!(was_authenticated),
                        Err(ClientError::NotAuthenticated) => prop_assert!(!was_authenticated),
                        other => prop_assert!(false, "unexpected {:?}", other),
                    }
                    prop_assert!(!store.snapshot().is_authenticated());
                }
            }

            let s = store.snapshot();
            prop_assert!(s.invariants_hold(), "{:?}", s);
            if s.is_authenticated() {
                prop_assert!(s.identity().is_some() && s.token().is_some());
            }
        }
    }
}

#[test]
fn concurrent_clears_from_both_channels_settle_once() {
    let (store, tokens) = store();
    for _ in 0..50 {
        let generation = store
            .establish(BearerToken::new("t"), identity(Role::Standard))
            .unwrap();

        let cleared: Vec<bool> = std::thread::scope(|scope| {
            let expired = scope.spawn(|| store.clear(ClearReason::Expired, Some(generation)));
            let removed = scope.spawn(|| store.clear(ClearReason::Removed, Some(generation)));
            vec![expired.join().unwrap(), removed.join().unwrap()]
        });

        assert_eq!(cleared.iter().filter(|c| **c).count(), 1);
        let s = store.snapshot();
        assert!(s.invariants_hold());
        assert!(s.is_cleared());
        assert!(tokens.current().is_none());
        store.clear(ClearReason::Logout, None);
    }
}

#[test]
fn racing_establish_and_logout_keep_session_and_persisted_token_together() {
    let (store, tokens) = store();
    for _ in 0..200 {
        std::thread::scope(|scope| {
            scope.spawn(|| {
                store
                    .establish(BearerToken::new("t"), identity(Role::Standard))
                    .unwrap();
            });
            scope.spawn(|| {
                store.clear(ClearReason::Logout, None);
            });
        });

        let s = store.snapshot();
        assert!(s.invariants_hold());
        assert_eq!(s.is_authenticated(), tokens.current().is_some());
        store.clear(ClearReason::Logout, None);
    }
}

//! In-process remote authority.
//!
//! `InMemoryAuthority` implements [`Transport`] by serving the authority's
//! HTTP contract from memory. It enforces the server-side rules the client
//! relies on (owner-only admin endpoints, no self-deletion, no deleting an
//! owner, soft-deleted identities cannot authenticate) and supports fault
//! injection: forced statuses per path, a simulated outage, artificial
//! latency, and a log of every request received.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use warden_auth::{BearerToken, DeletionRecord, Identity, LifecycleError, LifecycleState, Role};
use warden_core::UserId;

use crate::transport::{ApiRequest, ApiResponse, Method, Transport, TransportError};
use crate::types::LoginRequest;

const BAD_CREDENTIALS: &str = "Incorrect username or password";
const BAD_TOKEN: &str = "Could not validate credentials";
const OWNER_REQUIRED: &str = "Not enough permissions. Owner role required.";

#[derive(Debug, Clone)]
struct Account {
    identity: Identity,
    password: String,
    lifecycle: LifecycleState,
}

impl Account {
    fn is_live(&self) -> bool {
        self.lifecycle.is_active()
    }
}

#[derive(Debug, Default)]
struct State {
    accounts: BTreeMap<UserId, Account>,
    tokens: HashMap<String, UserId>,
    next_id: i64,
    next_token: u64,
    forced: HashMap<String, u16>,
    offline: bool,
    latency: Duration,
    requests: Vec<(Method, String)>,
}

#[derive(Debug, Default)]
pub struct InMemoryAuthority {
    state: Mutex<State>,
}

#[derive(Debug, Deserialize)]
struct RegisterBody {
    username: String,
    email: String,
    password: String,
}

impl InMemoryAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create an active identity directly, bypassing registration rules.
    pub fn add_user(&self, username: &str, password: &str, role: Role) -> UserId {
        let mut st = self.lock();
        st.next_id += 1;
        let id = UserId::new(st.next_id);
        st.accounts.insert(
            id,
            Account {
                identity: Identity {
                    id,
                    username: username.to_string(),
                    email: format!("{username}@example.com"),
                    role,
                    active: true,
                    theme_preference: None,
                    created_at: Utc::now(),
                },
                password: password.to_string(),
                lifecycle: LifecycleState::Active,
            },
        );
        id
    }

    /// Mint a token for `id` as if it had logged in.
    pub fn issue_token(&self, id: UserId) -> BearerToken {
        let mut st = self.lock();
        mint(&mut st, id)
    }

    /// Invalidate every outstanding token of `id`.
    pub fn revoke_tokens(&self, id: UserId) {
        self.lock().tokens.retain(|_, owner| *owner != id);
    }

    /// Soft-delete `id` out of band, as another administrator would.
    pub fn soft_delete(&self, id: UserId, by: Option<UserId>) -> Result<(), LifecycleError> {
        let mut st = self.lock();
        let account = st.accounts.get_mut(&id).ok_or(LifecycleError::Purged)?;
        account.lifecycle = account.lifecycle.soft_delete(Utc::now(), by)?;
        Ok(())
    }

    /// Purge `id` out of band.
    pub fn purge(&self, id: UserId) -> Result<(), LifecycleError> {
        let mut st = self.lock();
        let account = st.accounts.get_mut(&id).ok_or(LifecycleError::Purged)?;
        account.lifecycle = account.lifecycle.purge()?;
        Ok(())
    }

    pub fn lifecycle(&self, id: UserId) -> Option<LifecycleState> {
        self.lock().accounts.get(&id).map(|a| a.lifecycle)
    }

    pub fn find_by_username(&self, username: &str) -> Option<UserId> {
        self.lock()
            .accounts
            .values()
            .find(|a| a.identity.username == username && !matches!(a.lifecycle, LifecycleState::Purged))
            .map(|a| a.identity.id)
    }

    /// Answer every request to `path` with `status` until cleared.
    pub fn force_status(&self, path: impl Into<String>, status: u16) {
        self.lock().forced.insert(path.into(), status);
    }

    pub fn clear_forced(&self, path: &str) {
        self.lock().forced.remove(path);
    }

    /// Simulate an outage: every request fails at the transport level.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Delay every response by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn requests_to(&self, path: &str) -> usize {
        self.lock().requests.iter().filter(|(_, p)| p == path).count()
    }

    pub fn requests(&self) -> Vec<(Method, String)> {
        self.lock().requests.clone()
    }

    fn handle(&self, request: &ApiRequest) -> ApiResponse {
        let mut st = self.lock();
        let segments: Vec<&str> = request
            .path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        match (request.method, segments.as_slice()) {
            (Method::Post, ["auth", "login"]) => login(&mut st, request),
            (Method::Post, ["auth", "register"]) => register(&mut st, request),
            (Method::Post, ["auth", "logout"]) => logout(&mut st, request),
            (Method::Get, ["auth", "me"]) => match caller(&st, request) {
                Ok(account) => ok(identity_json(&account.identity)),
                Err(resp) => resp,
            },
            (Method::Get, ["admin", "users", id, "exists"]) => match id.parse::<UserId>() {
                Ok(id) => {
                    let exists = st.accounts.get(&id).is_some_and(Account::is_live);
                    ok(json!({ "exists": exists }))
                }
                Err(_) => unprocessable("user_id", "value is not a valid integer"),
            },
            (Method::Get, ["admin", "users"]) => list_users(&st, request),
            (Method::Get, ["admin", "users", "deleted", "list"]) => list_deleted(&st, request),
            (Method::Post, ["admin", "users", id, "restore"]) => match id.parse::<UserId>() {
                Ok(id) => restore(&mut st, request, id),
                Err(_) => unprocessable("user_id", "value is not a valid integer"),
            },
            (Method::Delete, ["admin", "users", id]) => match id.parse::<UserId>() {
                Ok(id) => delete_user(&mut st, request, id),
                Err(_) => unprocessable("user_id", "value is not a valid integer"),
            },
            _ => fail(404, "Not Found"),
        }
    }
}

#[async_trait]
impl Transport for InMemoryAuthority {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let (latency, offline, forced) = {
            let mut st = self.lock();
            st.requests.push((request.method, request.path.clone()));
            (st.latency, st.offline, st.forced.get(&request.path).copied())
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if offline {
            return Err(TransportError::Network("connection refused".to_string()));
        }
        if let Some(status) = forced {
            return Ok(fail(status, "injected failure"));
        }
        Ok(self.handle(&request))
    }
}

fn mint(st: &mut State, id: UserId) -> BearerToken {
    st.next_token += 1;
    let raw = format!("tok-{}-{}", id, st.next_token);
    st.tokens.insert(raw.clone(), id);
    BearerToken::new(raw)
}

fn ok(body: Value) -> ApiResponse {
    ApiResponse::json(200, body)
}

fn fail(status: u16, detail: &str) -> ApiResponse {
    ApiResponse::json(status, json!({ "detail": detail }))
}

fn unprocessable(field: &str, msg: &str) -> ApiResponse {
    ApiResponse::json(
        422,
        json!({ "detail": [{ "loc": ["body", field], "msg": msg, "type": "value_error" }] }),
    )
}

fn identity_json(identity: &Identity) -> Value {
    serde_json::to_value(identity).unwrap_or(Value::Null)
}

/// Resolve the bearer to a live account, or the 401 to send back.
fn caller<'a>(st: &'a State, request: &ApiRequest) -> Result<&'a Account, ApiResponse> {
    request
        .bearer
        .as_ref()
        .and_then(|t| st.tokens.get(t.expose()))
        .and_then(|id| st.accounts.get(id))
        .filter(|a| a.is_live())
        .ok_or_else(|| fail(401, BAD_TOKEN))
}

fn owner<'a>(st: &'a State, request: &ApiRequest) -> Result<&'a Account, ApiResponse> {
    let account = caller(st, request)?;
    if !account.identity.active {
        return Err(fail(400, "Inactive user"));
    }
    if !account.identity.is_privileged() {
        return Err(fail(403, OWNER_REQUIRED));
    }
    Ok(account)
}

fn login(st: &mut State, request: &ApiRequest) -> ApiResponse {
    let Some(creds) = request
        .body
        .clone()
        .and_then(|b| serde_json::from_value::<LoginRequest>(b).ok())
    else {
        return unprocessable("username", "field required");
    };

    let id = st
        .accounts
        .values()
        .find(|a| a.identity.username == creds.username && a.password == creds.password && a.is_live())
        .map(|a| a.identity.id);

    match id {
        Some(id) => {
            let token = mint(st, id);
            ok(json!({ "access_token": token.expose(), "token_type": "bearer" }))
        }
        None => fail(401, BAD_CREDENTIALS),
    }
}

fn register(st: &mut State, request: &ApiRequest) -> ApiResponse {
    let Some(body) = request
        .body
        .clone()
        .and_then(|b| serde_json::from_value::<RegisterBody>(b).ok())
    else {
        return unprocessable("username", "field required");
    };

    let len = |s: &str| s.chars().count();
    if !(3..=50).contains(&len(&body.username)) {
        return unprocessable("username", "ensure this value has between 3 and 50 characters");
    }
    if !(5..=100).contains(&len(&body.email)) {
        return unprocessable("email", "ensure this value has between 5 and 100 characters");
    }
    if !(6..=128).contains(&len(&body.password)) {
        return unprocessable("password", "ensure this value has between 6 and 128 characters");
    }

    let taken = |f: &dyn Fn(&Account) -> bool| {
        st.accounts
            .values()
            .any(|a| !matches!(a.lifecycle, LifecycleState::Purged) && f(a))
    };
    if taken(&|a| a.identity.username == body.username) {
        return fail(400, "Username already registered");
    }
    if taken(&|a| a.identity.email == body.email) {
        return fail(400, "Email already registered");
    }

    st.next_id += 1;
    let id = UserId::new(st.next_id);
    st.accounts.insert(
        id,
        Account {
            identity: Identity {
                id,
                username: body.username,
                email: body.email,
                role: Role::Standard,
                active: true,
                theme_preference: None,
                created_at: Utc::now(),
            },
            password: body.password,
            lifecycle: LifecycleState::Active,
        },
    );
    ok(json!({ "message": "User registered successfully" }))
}

fn logout(st: &mut State, request: &ApiRequest) -> ApiResponse {
    let Some(token) = request.bearer.as_ref() else {
        return fail(401, BAD_TOKEN);
    };
    match st.tokens.remove(token.expose()) {
        Some(_) => ok(json!({ "message": "Successfully logged out" })),
        None => fail(401, BAD_TOKEN),
    }
}

fn list_users(st: &State, request: &ApiRequest) -> ApiResponse {
    if let Err(resp) = owner(st, request) {
        return resp;
    }
    let include_deleted = request.query_param("include_deleted") == Some("true");
    let users: Vec<Value> = st
        .accounts
        .values()
        .filter(|a| match a.lifecycle {
            LifecycleState::Active => true,
            LifecycleState::SoftDeleted { .. } => include_deleted,
            LifecycleState::Purged => false,
        })
        .map(|a| identity_json(&a.identity))
        .collect();
    ok(Value::Array(users))
}

fn list_deleted(st: &State, request: &ApiRequest) -> ApiResponse {
    if let Err(resp) = owner(st, request) {
        return resp;
    }
    let records: Vec<Value> = st
        .accounts
        .values()
        .filter_map(|a| match a.lifecycle {
            LifecycleState::SoftDeleted {
                deleted_at,
                deleted_by,
            } => Some(DeletionRecord {
                identity: a.identity.clone(),
                deleted_at,
                deleted_by,
                deleted_by_username: deleted_by
                    .and_then(|by| st.accounts.get(&by))
                    .map(|d| d.identity.username.clone()),
            }),
            _ => None,
        })
        .map(|r| serde_json::to_value(r).unwrap_or(Value::Null))
        .collect();
    ok(Value::Array(records))
}

fn restore(st: &mut State, request: &ApiRequest, id: UserId) -> ApiResponse {
    if let Err(resp) = owner(st, request) {
        return resp;
    }
    let Some(account) = st.accounts.get_mut(&id) else {
        return fail(404, "Deleted user not found");
    };
    match account.lifecycle.restore() {
        Ok(next) => {
            account.lifecycle = next;
            ok(json!({ "message": format!("User {} restored successfully", account.identity.username) }))
        }
        Err(_) => fail(404, "Deleted user not found"),
    }
}

fn delete_user(st: &mut State, request: &ApiRequest, id: UserId) -> ApiResponse {
    let me = match owner(st, request) {
        Ok(account) => account.identity.id,
        Err(resp) => return resp,
    };
    if me == id {
        return fail(400, "Cannot delete yourself");
    }
    let permanent = request.query_param("permanent") == Some("true");

    let Some(account) = st.accounts.get_mut(&id) else {
        return fail(404, "User not found");
    };
    if account.identity.is_privileged() {
        return fail(400, "Cannot delete an owner account");
    }

    if permanent {
        return match account.lifecycle.purge() {
            Ok(next) => {
                account.lifecycle = next;
                ok(json!({ "message": format!("User {} permanently deleted", account.identity.username) }))
            }
            Err(_) => fail(404, "Deleted user not found"),
        };
    }

    match account.lifecycle.soft_delete(Utc::now(), Some(me)) {
        Ok(next) => {
            account.lifecycle = next;
            ok(json!({ "message": format!("User {} deleted successfully", account.identity.username) }))
        }
        Err(LifecycleError::AlreadyDeleted) => fail(409, "User is already deleted"),
        Err(_) => fail(404, "User not found"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn call(authority: &InMemoryAuthority, request: ApiRequest) -> ApiResponse {
        authority.send(request).await.unwrap()
    }

    #[tokio::test]
    async fn soft_deleted_identity_cannot_authenticate() {
        let authority = InMemoryAuthority::new();
        let owner = authority.add_user("root", "rootpass", Role::Privileged);
        let bob = authority.add_user("bob", "bobpass1", Role::Standard);
        let token = authority.issue_token(bob);

        authority.soft_delete(bob, Some(owner)).unwrap();

        let me = call(&authority, ApiRequest::get("/auth/me").with_bearer(token)).await;
        assert_eq!(me.status, 401);

        let login = ApiRequest::post("/auth/login")
            .with_json(&json!({ "username": "bob", "password": "bobpass1" }))
            .unwrap();
        assert_eq!(call(&authority, login).await.status, 401);

        let exists = call(&authority, ApiRequest::get(format!("/admin/users/{bob}/exists"))).await;
        assert_eq!(exists.body, json!({ "exists": false }));
    }

    #[tokio::test]
    async fn owner_cannot_delete_self() {
        let authority = InMemoryAuthority::new();
        let owner = authority.add_user("root", "rootpass", Role::Privileged);
        let token = authority.issue_token(owner);

        let resp = call(
            &authority,
            ApiRequest::delete(format!("/admin/users/{owner}")).with_bearer(token),
        )
        .await;
        assert_eq!(resp.status, 400);
        assert_eq!(resp.detail(), "Cannot delete yourself");
    }

    #[tokio::test]
    async fn fault_injection() {
        let authority = InMemoryAuthority::new();
        authority.force_status("/auth/me", 503);
        assert_eq!(call(&authority, ApiRequest::get("/auth/me")).await.status, 503);

        authority.set_offline(true);
        assert!(authority.send(ApiRequest::get("/auth/me")).await.is_err());
        assert_eq!(authority.requests_to("/auth/me"), 2);
    }
}

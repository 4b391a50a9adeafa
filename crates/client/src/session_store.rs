//! Process-wide session cell.
//!
//! `SessionStore` is the only owner of the current [`Session`]. Every path
//! that ends a session (logout, a 401 on any authenticated call, the
//! existence reconciler) goes through [`SessionStore::clear`], which:
//!
//! - is serialized by one lock, so concurrent clears never interleave
//! - is idempotent (clearing an already-cleared session is a no-op)
//! - supports compare-and-clear: a caller that observed generation `g` only
//!   clears if the session is still generation `g`
//! - aborts every task bound to the ending session before releasing the lock,
//!   so no late poll result can act on a cleared session
//!
//! Observers subscribe through a `watch` channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::task::AbortHandle;

use warden_auth::{BearerToken, Identity, Session};

use crate::error::{ClientError, ClientResult};
use crate::token_store::{TokenStore, TokenStoreError};
use crate::transport::{ApiRequest, ApiResponse, Transport, send_bounded};

/// Why a session was cleared.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClearReason {
    /// The user logged out.
    Logout,
    /// The authority answered 401 to an authenticated call.
    Expired,
    /// The existence check reported the identity gone.
    Removed,
    /// The persisted token failed validation at startup.
    InvalidToken,
}

impl ClearReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClearReason::Logout => "logout",
            ClearReason::Expired => "expired",
            ClearReason::Removed => "removed",
            ClearReason::InvalidToken => "invalid_token",
        }
    }
}

impl std::fmt::Display for ClearReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Inner {
    session: Session,
    /// Bumped on every establish and every effective clear.
    generation: u64,
    /// Tasks whose lifetime is bound to the current session.
    tasks: Vec<AbortHandle>,
}

pub struct SessionStore {
    inner: Mutex<Inner>,
    tx: watch::Sender<Session>,
    tokens: Arc<dyn TokenStore>,
    transport: Arc<dyn Transport>,
    request_timeout: Duration,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("session", &self.snapshot())
            .field("generation", &self.generation())
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenStore>,
        request_timeout: Duration,
    ) -> Self {
        let (tx, _rx) = watch::channel(Session::empty());
        Self {
            inner: Mutex::new(Inner {
                session: Session::empty(),
                generation: 0,
                tasks: Vec::new(),
            }),
            tx,
            tokens,
            transport,
            request_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current session value.
    pub fn snapshot(&self) -> Session {
        self.lock().session.clone()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Snapshot plus the generation it belongs to, read atomically.
    pub fn snapshot_with_generation(&self) -> (Session, u64) {
        let inner = self.lock();
        (inner.session.clone(), inner.generation)
    }

    /// Receive every session change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Persist `token`, install a freshly authenticated session and return
    /// its generation.
    ///
    /// The token is written under the session lock, so a concurrent clear
    /// lands either before (and the new session wins) or after (and removes
    /// both). If the write fails nothing changes. Tasks bound to a previous
    /// session are aborted.
    pub fn establish(
        &self,
        token: BearerToken,
        identity: Identity,
    ) -> Result<u64, TokenStoreError> {
        let mut inner = self.lock();
        self.tokens.save(&token)?;
        abort_all(&mut inner.tasks);
        inner.generation += 1;
        inner.session = Session::authenticated(token, identity);
        self.tx.send_replace(inner.session.clone());

        if let Some(identity) = inner.session.identity() {
            tracing::info!(
                user_id = %identity.id,
                username = %identity.username,
                role = %identity.role,
                generation = inner.generation,
                "session established"
            );
        }
        Ok(inner.generation)
    }

    /// The single clear primitive.
    ///
    /// With `expected_generation = Some(g)` the clear only happens if the
    /// session is still generation `g`. Returns whether anything changed.
    /// Never fails: a token-store error is logged and the in-memory session
    /// is cleared regardless.
    pub fn clear(&self, reason: ClearReason, expected_generation: Option<u64>) -> bool {
        let mut inner = self.lock();

        if let Some(expected) = expected_generation {
            if expected != inner.generation {
                tracing::debug!(
                    %reason,
                    expected,
                    current = inner.generation,
                    "stale clear ignored"
                );
                return false;
            }
        }

        if let Err(e) = self.tokens.clear() {
            tracing::warn!(%reason, error = %e, "failed to remove persisted token");
        }

        let next = match reason {
            ClearReason::Removed => Session::removed(),
            _ => Session::empty(),
        };

        if inner.session == next {
            return false;
        }

        abort_all(&mut inner.tasks);
        let ended = inner.session.identity().map(|i| i.id);
        inner.generation += 1;
        inner.session = next;
        self.tx.send_replace(inner.session.clone());

        match ended {
            Some(user_id) => tracing::info!(%reason, %user_id, "session cleared"),
            None => tracing::debug!(%reason, "session flags reset"),
        }
        true
    }

    /// Reset the removed flag once the user has seen the account-removed view.
    pub fn acknowledge_removed(&self) -> bool {
        let mut inner = self.lock();
        if !inner.session.is_removed() {
            return false;
        }
        inner.session = inner.session.without_removed_flag();
        self.tx.send_replace(inner.session.clone());
        true
    }

    /// Tie a task's lifetime to session `generation`.
    ///
    /// If that session has already ended the task is aborted immediately and
    /// `false` is returned.
    pub fn bind_task(&self, generation: u64, handle: AbortHandle) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation || !inner.session.is_authenticated() {
            handle.abort();
            return false;
        }
        inner.tasks.retain(|t| !t.is_finished());
        inner.tasks.push(handle);
        true
    }

    /// Send `request` with the current bearer token attached.
    ///
    /// A 401 clears the session (if it is still the one the token came from)
    /// and yields `AuthExpired`. Other statuses are returned untouched.
    pub async fn authenticated_call(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let (token, generation) = {
            let inner = self.lock();
            match (inner.session.is_authenticated(), inner.session.token()) {
                (true, Some(token)) => (token.clone(), inner.generation),
                _ => return Err(ClientError::NotAuthenticated),
            }
        };

        let method = request.method;
        let path = request.path.clone();
        let resp = send_bounded(
            self.transport.as_ref(),
            request.with_bearer(token),
            self.request_timeout,
        )
        .await?;

        if resp.status == 401 {
            tracing::info!(%method, %path, "authority rejected bearer token");
            self.clear(ClearReason::Expired, Some(generation));
            return Err(ClientError::AuthExpired);
        }
        Ok(resp)
    }

    /// `authenticated_call` followed by decoding of a success body.
    pub async fn authenticated_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> ClientResult<T> {
        self.authenticated_call(request).await?.into_result()
    }
}

fn abort_all(tasks: &mut Vec<AbortHandle>) {
    for task in tasks.drain(..) {
        task.abort();
    }
}

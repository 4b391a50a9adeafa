//! Background confirmation that the signed-in identity still exists.
//!
//! Two states: `Idle` (no session, no timer) and `Polling` (one task per
//! session generation). The polling task is bound to its session in the
//! [`SessionStore`], so every path that ends the session aborts it before
//! the clear returns.
//!
//! Only an explicit `{"exists": false}` ends the session. Transport errors,
//! timeouts and non-success statuses are transient: they are counted, logged
//! at debug, and reported at warn once the configured threshold of
//! consecutive failures is reached. They never clear the session.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::AbortHandle;

use warden_core::UserId;

use crate::session_store::{ClearReason, SessionStore};
use crate::transport::{ApiRequest, endpoints, send_bounded};
use crate::types::ExistsResponse;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilerState {
    Idle,
    Polling,
}

/// Result of one existence check.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    /// Identity confirmed; nothing changed.
    Exists,
    /// Identity gone; the session was cleared and flagged removed.
    Removed,
    /// Check failed for a transient reason; session untouched.
    Transient,
    /// No authenticated session to check.
    Skipped,
}

struct Running {
    generation: u64,
    handle: AbortHandle,
}

pub struct ExistenceReconciler {
    store: Arc<SessionStore>,
    interval: Duration,
    warn_threshold: u32,
    consecutive_failures: Arc<AtomicU32>,
    running: Mutex<Option<Running>>,
}

impl std::fmt::Debug for ExistenceReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExistenceReconciler")
            .field("interval", &self.interval)
            .field("state", &self.state())
            .field("consecutive_failures", &self.consecutive_failures())
            .finish()
    }
}

impl ExistenceReconciler {
    pub fn new(store: Arc<SessionStore>, interval: Duration, warn_threshold: u32) -> Self {
        Self {
            store,
            interval,
            warn_threshold: warn_threshold.max(1),
            consecutive_failures: Arc::new(AtomicU32::new(0)),
            running: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ReconcilerState {
        let running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        match running.as_ref() {
            Some(r) if r.generation == self.store.generation() && !r.handle.is_finished() => {
                ReconcilerState::Polling
            }
            _ => ReconcilerState::Idle,
        }
    }

    /// Idle → Polling for the current session.
    ///
    /// Returns the resulting state: `Idle` when there is no authenticated
    /// session to watch. Calling it while already polling the same session
    /// is a no-op.
    pub fn start(&self) -> ReconcilerState {
        let (session, generation) = self.store.snapshot_with_generation();
        let Some(user_id) = session
            .identity()
            .filter(|_| session.is_authenticated())
            .map(|i| i.id)
        else {
            return ReconcilerState::Idle;
        };

        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(r) = running.as_ref() {
            if r.generation == generation && !r.handle.is_finished() {
                return ReconcilerState::Polling;
            }
            r.handle.abort();
        }

        self.consecutive_failures.store(0, Ordering::SeqCst);
        let handle = tokio::spawn(poll_loop(
            self.store.clone(),
            generation,
            user_id,
            self.interval,
            self.warn_threshold,
            self.consecutive_failures.clone(),
        ));
        let abort = handle.abort_handle();

        if !self.store.bind_task(generation, abort.clone()) {
            *running = None;
            return ReconcilerState::Idle;
        }

        tracing::info!(%user_id, interval = ?self.interval, "existence reconciler started");
        *running = Some(Running {
            generation,
            handle: abort,
        });
        ReconcilerState::Polling
    }

    /// Polling → Idle without touching the session.
    pub fn stop(&self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(r) = running.take() {
            r.handle.abort();
            tracing::info!("existence reconciler stopped");
        }
    }

    /// Run one check against the current session right now.
    pub async fn check_once(&self) -> CheckOutcome {
        let (session, generation) = self.store.snapshot_with_generation();
        let Some(user_id) = session
            .identity()
            .filter(|_| session.is_authenticated())
            .map(|i| i.id)
        else {
            return CheckOutcome::Skipped;
        };

        check_existence(
            &self.store,
            generation,
            user_id,
            self.warn_threshold,
            &self.consecutive_failures,
        )
        .await
    }
}

async fn poll_loop(
    store: Arc<SessionStore>,
    generation: u64,
    user_id: UserId,
    period: Duration,
    warn_threshold: u32,
    consecutive_failures: Arc<AtomicU32>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick completes immediately; the first check is one period in.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let outcome = check_existence(
            &store,
            generation,
            user_id,
            warn_threshold,
            &consecutive_failures,
        )
        .await;

        if outcome == CheckOutcome::Removed {
            break;
        }
    }

    tracing::debug!(%user_id, "existence reconciler loop finished");
}

async fn check_existence(
    store: &SessionStore,
    generation: u64,
    user_id: UserId,
    warn_threshold: u32,
    consecutive_failures: &AtomicU32,
) -> CheckOutcome {
    // Public endpoint: no bearer, so a 401 here can never be confused with
    // token expiry.
    let request = ApiRequest::get(endpoints::exists(user_id));
    let result = send_bounded(
        store.transport().as_ref(),
        request,
        store.request_timeout(),
    )
    .await;

    let failure = match result {
        Ok(resp) if resp.is_success() => match resp.decode::<ExistsResponse>() {
            Ok(ExistsResponse { exists: true }) => {
                consecutive_failures.store(0, Ordering::SeqCst);
                return CheckOutcome::Exists;
            }
            Ok(ExistsResponse { exists: false }) => {
                consecutive_failures.store(0, Ordering::SeqCst);
                if store.clear(ClearReason::Removed, Some(generation)) {
                    tracing::info!(%user_id, "identity no longer exists, session invalidated");
                }
                return CheckOutcome::Removed;
            }
            Err(e) => e.to_string(),
        },
        Ok(resp) => format!("HTTP {}: {}", resp.status, resp.detail()),
        Err(e) => e.to_string(),
    };

    let failures = consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
    tracing::debug!(%user_id, failures, reason = %failure, "existence check failed");
    if failures == warn_threshold {
        tracing::warn!(
            %user_id,
            failures,
            reason = %failure,
            "existence checks keep failing; session kept until the authority answers"
        );
    }
    CheckOutcome::Transient
}

//! `warden-client`
//!
//! **Responsibility:** everything that talks to the remote authority.
//!
//! This crate provides:
//! - The session cell and its single clear primitive (`SessionStore`)
//! - Login, registration, logout and startup token validation (`CredentialGateway`)
//! - Background existence reconciliation (`ExistenceReconciler`)
//! - Privileged user administration (`UserDirectory`, `DeletionLifecycle`)
//! - Current-view tracking with the removed-watcher (`Navigator`)
//!
//! The remote authority is the source of truth; this crate only caches
//! read-only copies of what it serves.

pub mod authority;
pub mod config;
pub mod confirm;
pub mod deletion;
pub mod directory;
pub mod error;
pub mod gateway;
pub mod navigator;
pub mod reconciler;
pub mod session_store;
pub mod token_store;
pub mod transport;
pub mod types;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;

use warden_auth::{RegistrationForm, Session};

pub use authority::InMemoryAuthority;
pub use config::{ClientConfig, ConfigError};
pub use confirm::{PurgeConfirmation, SoftDeleteConfirmation};
pub use deletion::DeletionLifecycle;
pub use directory::UserDirectory;
pub use error::{ClientError, ClientResult};
pub use gateway::{CredentialGateway, TokenValidation};
pub use navigator::Navigator;
pub use reconciler::{CheckOutcome, ExistenceReconciler, ReconcilerState};
pub use session_store::{ClearReason, SessionStore};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore, TokenStoreError};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport, TransportError};
pub use types::Ack;

/// All client components wired to one session.
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    store: Arc<SessionStore>,
    gateway: CredentialGateway,
    reconciler: ExistenceReconciler,
    directory: UserDirectory,
    deleted: DeletionLifecycle,
    navigator: Arc<Navigator>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        let store = Arc::new(SessionStore::new(transport, tokens, config.request_timeout));
        Self {
            gateway: CredentialGateway::new(store.clone()),
            reconciler: ExistenceReconciler::new(
                store.clone(),
                config.existence_poll_interval,
                config.transient_failure_warn_threshold,
            ),
            directory: UserDirectory::new(store.clone()),
            deleted: DeletionLifecycle::new(store.clone()),
            navigator: Arc::new(Navigator::new(store.clone())),
            watcher: Mutex::new(None),
            store,
            config,
        }
    }

    /// HTTP transport and file-backed token storage, as configured.
    pub fn from_config(config: ClientConfig) -> ClientResult<Self> {
        let transport = HttpTransport::new(config.api_url.clone(), config.request_timeout)?;
        let tokens = FileTokenStore::new(config.resolved_token_path()?);
        Ok(Self::new(config, Arc::new(transport), Arc::new(tokens)))
    }

    /// Application start: restore any persisted session, start polling if
    /// one was restored, and start the removed-watcher.
    pub async fn start(&self) -> Session {
        self.ensure_watcher();
        let session = self.gateway.restore_session().await;
        if session.is_authenticated() {
            self.reconciler.start();
        }
        session
    }

    fn ensure_watcher(&self) {
        let mut watcher = self.watcher.lock().unwrap_or_else(PoisonError::into_inner);
        if watcher.is_none() {
            *watcher = Some(self.navigator.spawn_removed_watcher());
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> ClientResult<Session> {
        let session = self.gateway.login(username, password).await?;
        self.reconciler.start();
        Ok(session)
    }

    pub async fn register(&self, form: RegistrationForm) -> ClientResult<Ack> {
        self.gateway.register(form).await
    }

    /// Never fails; see [`CredentialGateway::logout`].
    pub async fn logout(&self) {
        self.gateway.logout().await;
        self.reconciler.stop();
    }

    pub fn session(&self) -> Session {
        self.store.snapshot()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn gateway(&self) -> &CredentialGateway {
        &self.gateway
    }

    pub fn reconciler(&self) -> &ExistenceReconciler {
        &self.reconciler
    }

    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    pub fn deleted(&self) -> &DeletionLifecycle {
        &self.deleted
    }

    pub fn navigator(&self) -> &Arc<Navigator> {
        &self.navigator
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(handle) = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        self.reconciler.stop();
    }
}

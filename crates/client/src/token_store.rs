//! Durable storage for the bearer token.
//!
//! Exactly one token is persisted, under the `access_token` key. Every
//! logout and invalidation path ends in [`TokenStore::clear`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use warden_auth::BearerToken;

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("token storage I/O failed at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("token file at {path:?} is unreadable: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// Persisted client state.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<BearerToken>, TokenStoreError>;
    fn save(&self, token: &BearerToken) -> Result<(), TokenStoreError>;
    fn clear(&self) -> Result<(), TokenStoreError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    access_token: BearerToken,
}

/// JSON file in the application data directory.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> TokenStoreError {
        TokenStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<BearerToken>, TokenStoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_err(e)),
        };

        let stored: StoredToken =
            serde_json::from_str(&raw).map_err(|e| TokenStoreError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        if stored.access_token.is_blank() {
            return Ok(None);
        }
        Ok(Some(stored.access_token))
    }

    fn save(&self, token: &BearerToken) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }

        let body = serde_json::to_vec(&StoredToken {
            access_token: token.clone(),
        })
        .map_err(|e| TokenStoreError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        // Write-then-rename so a crash never leaves a half-written token.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|e| self.io_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_err(e)),
        }
    }
}

/// Process-local store, used by tests and short-lived tools.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<BearerToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: BearerToken) -> Self {
        Self {
            token: Mutex::new(Some(token)),
        }
    }

    pub fn current(&self) -> Option<BearerToken> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<BearerToken>, TokenStoreError> {
        Ok(self.current())
    }

    fn save(&self, token: &BearerToken) -> Result<(), TokenStoreError> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

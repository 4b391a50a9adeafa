//! Administrative user directory.
//!
//! Privileged-only. The role check runs locally before anything is sent,
//! even though the routing guard already keeps other roles off the view.

use std::sync::{Arc, Mutex, PoisonError};

use warden_auth::{Identity, require_privileged};
use warden_core::UserId;

use crate::confirm::SoftDeleteConfirmation;
use crate::error::{ClientError, ClientResult};
use crate::session_store::SessionStore;
use crate::transport::{ApiRequest, endpoints};
use crate::types::Ack;

#[derive(Debug)]
pub struct UserDirectory {
    store: Arc<SessionStore>,
    listing: Mutex<Vec<Identity>>,
}

impl UserDirectory {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self {
            store,
            listing: Mutex::new(Vec::new()),
        }
    }

    /// Last listing fetched with `list_users`, after local removals.
    pub fn cached(&self) -> Vec<Identity> {
        self.listing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// All identities that are not soft-deleted.
    pub async fn list_users(&self) -> ClientResult<Vec<Identity>> {
        self.list_users_with(false).await
    }

    /// All identities, optionally including soft-deleted ones.
    ///
    /// Only the default (active-only) listing replaces the cached listing.
    pub async fn list_users_with(&self, include_deleted: bool) -> ClientResult<Vec<Identity>> {
        require_privileged(&self.store.snapshot())?;

        let mut request = ApiRequest::get(endpoints::USERS);
        if include_deleted {
            request = request.with_query("include_deleted", true);
        }
        let users: Vec<Identity> = self.store.authenticated_json(request).await?;

        if !include_deleted {
            *self.listing.lock().unwrap_or_else(PoisonError::into_inner) = users.clone();
        }
        Ok(users)
    }

    fn cached_entry(&self, id: UserId) -> Option<Identity> {
        self.listing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|u| u.id == id)
            .cloned()
    }

    /// Soft-delete `id`.
    ///
    /// Refused locally (nothing is sent) when the confirmation does not cover
    /// `id`, when `id` is the signed-in identity, or when the target holds the
    /// privileged role. On success the identity is dropped from the cached
    /// listing without a reload.
    pub async fn delete_user(
        &self,
        id: UserId,
        confirmation: &SoftDeleteConfirmation,
    ) -> ClientResult<Ack> {
        let session = self.store.snapshot();
        let me = require_privileged(&session)?;

        if !confirmation.covers(id) {
            return Err(ClientError::Refused("deletion was not confirmed".to_string()));
        }
        if me.id == id {
            return Err(ClientError::Refused("cannot delete yourself".to_string()));
        }

        let target = match self.cached_entry(id) {
            Some(target) => target,
            None => {
                self.list_users().await?;
                self.cached_entry(id)
                    .ok_or_else(|| ClientError::NotFound(format!("user {id} not found")))?
            }
        };
        if target.is_privileged() {
            return Err(ClientError::Refused(format!(
                "'{}' holds the privileged role and cannot be deleted",
                target.username
            )));
        }

        let resp = self
            .store
            .authenticated_call(ApiRequest::delete(endpoints::user(id)))
            .await?;

        if !resp.is_success() {
            let err = ClientError::from_response(&resp);
            tracing::warn!(%id, status = resp.status, detail = %resp.detail(), "delete rejected");
            if err.is_stale_listing() {
                self.refresh_after_failure().await;
            }
            return Err(err);
        }

        self.listing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|u| u.id != id);
        tracing::info!(%id, username = %target.username, "user soft-deleted");

        Ok(resp
            .decode()
            .unwrap_or_else(|_| Ack::new(format!("User {} deleted successfully", target.username))))
    }

    async fn refresh_after_failure(&self) {
        if let Err(e) = self.list_users().await {
            tracing::debug!(error = %e, "listing refresh after failed delete also failed");
        }
    }
}

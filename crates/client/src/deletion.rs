//! Deleted-identity lifecycle: list, restore, purge.
//!
//! Several privileged sessions may act on the same record. A `NotFound`
//! from restore or purge means someone else got there first: it is logged at
//! warn, the record is dropped from the cached listing, the listing is
//! refreshed, and the `NotFound` is returned for the caller to show as a
//! notice.

use std::sync::{Arc, Mutex, PoisonError};

use warden_auth::{DeletedOrder, DeletionRecord, require_privileged};
use warden_core::UserId;

use crate::confirm::PurgeConfirmation;
use crate::error::{ClientError, ClientResult};
use crate::session_store::SessionStore;
use crate::transport::{ApiRequest, ApiResponse, endpoints};
use crate::types::Ack;

#[derive(Debug)]
pub struct DeletionLifecycle {
    store: Arc<SessionStore>,
    listing: Mutex<Vec<DeletionRecord>>,
    order: Mutex<DeletedOrder>,
}

impl DeletionLifecycle {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self {
            store,
            listing: Mutex::new(Vec::new()),
            order: Mutex::new(DeletedOrder::default()),
        }
    }

    pub fn cached(&self) -> Vec<DeletionRecord> {
        self.listing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Deleted identities, newest deletion first.
    pub async fn list_deleted(&self) -> ClientResult<Vec<DeletionRecord>> {
        self.list_deleted_by(DeletedOrder::default()).await
    }

    pub async fn list_deleted_by(&self, order: DeletedOrder) -> ClientResult<Vec<DeletionRecord>> {
        require_privileged(&self.store.snapshot())?;

        let mut records: Vec<DeletionRecord> = self
            .store
            .authenticated_json(ApiRequest::get(endpoints::DELETED_USERS))
            .await?;
        order.sort(&mut records);

        *self.order.lock().unwrap_or_else(PoisonError::into_inner) = order;
        *self.listing.lock().unwrap_or_else(PoisonError::into_inner) = records.clone();
        Ok(records)
    }

    /// SoftDeleted → Active.
    pub async fn restore(&self, id: UserId) -> ClientResult<Ack> {
        require_privileged(&self.store.snapshot())?;

        let resp = self
            .store
            .authenticated_call(ApiRequest::post(endpoints::restore(id)))
            .await?;
        self.settle(id, "restore", resp).await
    }

    /// SoftDeleted → Purged. Irreversible.
    ///
    /// The confirmation must carry the target's username exactly as listed.
    pub async fn permanent_delete(
        &self,
        id: UserId,
        confirmation: &PurgeConfirmation,
    ) -> ClientResult<Ack> {
        require_privileged(&self.store.snapshot())?;

        let record = match self.cached_record(id) {
            Some(record) => record,
            None => {
                self.list_deleted_by(self.current_order()).await?;
                self.cached_record(id)
                    .ok_or_else(|| ClientError::NotFound("Deleted user not found".to_string()))?
            }
        };

        if !confirmation.matches(&record) {
            return Err(ClientError::Refused(
                "typed username does not match the account being purged".to_string(),
            ));
        }

        let resp = self
            .store
            .authenticated_call(
                ApiRequest::delete(endpoints::user(id)).with_query("permanent", true),
            )
            .await?;
        self.settle(id, "purge", resp).await
    }

    async fn settle(&self, id: UserId, action: &'static str, resp: ApiResponse) -> ClientResult<Ack> {
        if resp.is_success() {
            self.forget(id);
            tracing::info!(%id, action, "deleted-user action applied");
            return Ok(resp.decode().unwrap_or_else(|_| Ack::new(format!("{action} succeeded"))));
        }

        let err = ClientError::from_response(&resp);
        match &err {
            ClientError::NotFound(detail) => {
                tracing::warn!(%id, action, %detail, "record already gone, likely handled by another administrator");
                self.forget(id);
                self.refresh().await;
            }
            ClientError::Forbidden(_) => {
                tracing::warn!(%id, action, "action forbidden");
                self.refresh().await;
            }
            _ => tracing::warn!(%id, action, status = resp.status, detail = %resp.detail(), "action failed"),
        }
        Err(err)
    }

    fn cached_record(&self, id: UserId) -> Option<DeletionRecord> {
        self.listing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|r| r.id() == id)
            .cloned()
    }

    fn current_order(&self) -> DeletedOrder {
        *self.order.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn forget(&self, id: UserId) {
        self.listing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|r| r.id() != id);
    }

    async fn refresh(&self) {
        if let Err(e) = self.list_deleted_by(self.current_order()).await {
            tracing::debug!(error = %e, "deleted listing refresh failed");
        }
    }
}

//! Deleted-user lifecycle.
//!
//! ```text
//! Active ──soft_delete──▶ SoftDeleted ──restore──▶ Active
//!                              │
//!                              └──purge──▶ Purged (terminal)
//! ```
//!
//! Any other transition is rejected, so "restored but still flagged deleted"
//! cannot be represented.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use warden_core::UserId;

use crate::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Active,
    SoftDeleted {
        deleted_at: DateTime<Utc>,
        deleted_by: Option<UserId>,
    },
    Purged,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("identity is already deleted")]
    AlreadyDeleted,

    #[error("identity is not deleted")]
    NotDeleted,

    #[error("identity has been purged")]
    Purged,
}

impl LifecycleState {
    pub fn soft_delete(
        self,
        deleted_at: DateTime<Utc>,
        deleted_by: Option<UserId>,
    ) -> Result<Self, LifecycleError> {
        match self {
            LifecycleState::Active => Ok(LifecycleState::SoftDeleted {
                deleted_at,
                deleted_by,
            }),
            LifecycleState::SoftDeleted { .. } => Err(LifecycleError::AlreadyDeleted),
            LifecycleState::Purged => Err(LifecycleError::Purged),
        }
    }

    pub fn restore(self) -> Result<Self, LifecycleError> {
        match self {
            LifecycleState::SoftDeleted { .. } => Ok(LifecycleState::Active),
            LifecycleState::Active => Err(LifecycleError::NotDeleted),
            LifecycleState::Purged => Err(LifecycleError::Purged),
        }
    }

    pub fn purge(self) -> Result<Self, LifecycleError> {
        match self {
            LifecycleState::SoftDeleted { .. } => Ok(LifecycleState::Purged),
            LifecycleState::Active => Err(LifecycleError::NotDeleted),
            LifecycleState::Purged => Err(LifecycleError::Purged),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, LifecycleState::Active)
    }

    pub fn is_soft_deleted(&self) -> bool {
        matches!(self, LifecycleState::SoftDeleted { .. })
    }
}

/// Client view of a soft-deleted identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionRecord {
    #[serde(flatten)]
    pub identity: Identity,
    #[serde(deserialize_with = "crate::timestamp::deserialize")]
    pub deleted_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_by: Option<UserId>,
    #[serde(default)]
    pub deleted_by_username: Option<String>,
}

impl DeletionRecord {
    pub fn id(&self) -> UserId {
        self.identity.id
    }
}

/// Ordering of the deleted-identities listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletedOrder {
    #[default]
    NewestFirst,
    OldestFirst,
    Username,
}

impl DeletedOrder {
    pub fn sort(&self, records: &mut [DeletionRecord]) {
        match self {
            DeletedOrder::NewestFirst => records.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at)),
            DeletedOrder::OldestFirst => records.sort_by(|a, b| a.deleted_at.cmp(&b.deleted_at)),
            DeletedOrder::Username => records.sort_by(|a, b| {
                a.identity
                    .username
                    .to_lowercase()
                    .cmp(&b.identity.username.to_lowercase())
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use chrono::Duration;

    fn record(id: i64, name: &str, deleted_at: DateTime<Utc>) -> DeletionRecord {
        DeletionRecord {
            identity: Identity {
                id: UserId::new(id),
                username: name.to_string(),
                email: format!("{name}@example.com"),
                role: Role::Standard,
                active: true,
                theme_preference: None,
                created_at: deleted_at - Duration::days(30),
            },
            deleted_at,
            deleted_by: Some(UserId::new(1)),
            deleted_by_username: Some("owner".to_string()),
        }
    }

    #[test]
    fn soft_delete_then_restore() {
        let now = Utc::now();
        let deleted = LifecycleState::Active
            .soft_delete(now, Some(UserId::new(1)))
            .unwrap();
        assert!(deleted.is_soft_deleted());
        assert_eq!(deleted.restore().unwrap(), LifecycleState::Active);
    }

    #[test]
    fn purge_is_terminal() {
        let purged = LifecycleState::Active
            .soft_delete(Utc::now(), None)
            .unwrap()
            .purge()
            .unwrap();
        assert_eq!(purged.restore(), Err(LifecycleError::Purged));
        assert_eq!(purged.purge(), Err(LifecycleError::Purged));
        assert_eq!(purged.soft_delete(Utc::now(), None), Err(LifecycleError::Purged));
    }

    #[test]
    fn illegal_transitions_from_active() {
        assert_eq!(LifecycleState::Active.restore(), Err(LifecycleError::NotDeleted));
        assert_eq!(LifecycleState::Active.purge(), Err(LifecycleError::NotDeleted));
    }

    #[test]
    fn double_soft_delete_is_rejected() {
        let deleted = LifecycleState::Active.soft_delete(Utc::now(), None).unwrap();
        assert_eq!(
            deleted.soft_delete(Utc::now(), None),
            Err(LifecycleError::AlreadyDeleted)
        );
    }

    #[test]
    fn default_order_is_newest_first() {
        let now = Utc::now();
        let mut records = vec![
            record(2, "bob", now - Duration::hours(3)),
            record(3, "Alice", now),
            record(4, "carl", now - Duration::hours(1)),
        ];

        DeletedOrder::default().sort(&mut records);
        let ids: Vec<i64> = records.iter().map(|r| r.id().get()).collect();
        assert_eq!(ids, vec![3, 4, 2]);

        DeletedOrder::Username.sort(&mut records);
        let names: Vec<&str> = records.iter().map(|r| r.identity.username.as_str()).collect();
        assert_eq!(names, vec!["Alice", "bob", "carl"]);
    }

    #[test]
    fn record_decodes_flattened_identity() {
        let json = serde_json::json!({
            "id": 42,
            "username": "ursula",
            "email": "ursula@example.com",
            "role": "user",
            "is_active": true,
            "created_at": "2025-03-01T10:00:00Z",
            "deleted_at": "2025-04-01T10:00:00Z",
            "deleted_by": 1,
            "deleted_by_username": "owner"
        });
        let rec: DeletionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(rec.id(), UserId::new(42));
        assert_eq!(rec.deleted_by, Some(UserId::new(1)));
        assert!(rec.deleted_at > rec.identity.created_at);
    }

    #[test]
    fn record_decodes_offsetless_timestamps() {
        let json = serde_json::json!({
            "id": 42,
            "username": "ursula",
            "email": "ursula@example.com",
            "role": "user",
            "is_active": false,
            "created_at": "2025-03-01T10:00:00.123456",
            "deleted_at": "2025-04-01T10:00:00.654321",
            "deleted_by": null,
            "deleted_by_username": null
        });
        let rec: DeletionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(rec.deleted_at.to_rfc3339(), "2025-04-01T10:00:00.654321+00:00");
        assert_eq!(rec.identity.created_at.to_rfc3339(), "2025-03-01T10:00:00.123456+00:00");
        assert_eq!(rec.deleted_by, None);
    }
}

//! Explicit confirmations required before destructive admin actions.
//!
//! A soft delete needs a plain yes. A purge is irreversible, so it needs the
//! target's username typed back exactly.

use warden_auth::DeletionRecord;
use warden_core::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftDeleteConfirmation {
    target: UserId,
    granted: bool,
}

impl SoftDeleteConfirmation {
    pub fn granted(target: UserId) -> Self {
        Self {
            target,
            granted: true,
        }
    }

    pub fn declined(target: UserId) -> Self {
        Self {
            target,
            granted: false,
        }
    }

    pub fn target(&self) -> UserId {
        self.target
    }

    /// True if this is a yes for exactly `id`.
    pub fn covers(&self, id: UserId) -> bool {
        self.granted && self.target == id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeConfirmation {
    target: UserId,
    typed_username: String,
}

impl PurgeConfirmation {
    pub fn new(target: UserId, typed_username: impl Into<String>) -> Self {
        Self {
            target,
            typed_username: typed_username.into(),
        }
    }

    pub fn target(&self) -> UserId {
        self.target
    }

    /// Case-sensitive match against the record's username.
    pub fn matches(&self, record: &DeletionRecord) -> bool {
        self.target == record.id() && self.typed_username.trim() == record.identity.username
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use warden_auth::{Identity, Role};

    fn record(id: i64, username: &str) -> DeletionRecord {
        DeletionRecord {
            identity: Identity {
                id: UserId::new(id),
                username: username.to_string(),
                email: format!("{username}@example.com"),
                role: Role::Standard,
                active: true,
                theme_preference: None,
                created_at: Utc::now(),
            },
            deleted_at: Utc::now(),
            deleted_by: Some(UserId::new(1)),
            deleted_by_username: Some("root".to_string()),
        }
    }

    #[test]
    fn soft_delete_confirmation_is_target_specific() {
        let yes = SoftDeleteConfirmation::granted(UserId::new(42));
        assert!(yes.covers(UserId::new(42)));
        assert!(!yes.covers(UserId::new(43)));
        assert!(!SoftDeleteConfirmation::declined(UserId::new(42)).covers(UserId::new(42)));
    }

    #[test]
    fn purge_needs_the_exact_username() {
        let rec = record(42, "Mallory");
        assert!(PurgeConfirmation::new(UserId::new(42), " Mallory ").matches(&rec));
        assert!(!PurgeConfirmation::new(UserId::new(42), "mallory").matches(&rec));
        assert!(!PurgeConfirmation::new(UserId::new(41), "Mallory").matches(&rec));
    }
}

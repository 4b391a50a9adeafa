//! Identity read model as served by the remote authority.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::UserId;

use crate::Role;

/// Display theme an identity has chosen.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    Light,
    Dark,
    System,
}

/// Read-only cached copy of an identity owned by the remote authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    #[serde(rename = "is_active", default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub theme_preference: Option<ThemePreference>,
    #[serde(deserialize_with = "crate::timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Identity {
    pub fn is_privileged(&self) -> bool {
        self.role.is_privileged()
    }
}

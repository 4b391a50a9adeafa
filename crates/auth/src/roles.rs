use serde::{Deserialize, Serialize};

/// Role of an identity, as assigned by the remote authority.
///
/// On the wire the authority calls these `"user"` and `"owner"`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Role {
    #[default]
    #[serde(rename = "user")]
    Standard,
    #[serde(rename = "owner")]
    Privileged,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Standard => "user",
            Role::Privileged => "owner",
        }
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Privileged)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

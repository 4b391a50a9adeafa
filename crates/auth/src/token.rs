use serde::{Deserialize, Serialize};

/// Opaque bearer credential issued by the remote authority.
///
/// The client never inspects the contents. `Debug` is redacted so tokens do
/// not end up in logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl core::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_is_redacted() {
        let token = BearerToken::new("eyJhbGciOi.secret");
        assert_eq!(format!("{token:?}"), "BearerToken([REDACTED])");
        assert_eq!(token.expose(), "eyJhbGciOi.secret");
    }
}

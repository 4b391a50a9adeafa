//! Session value type.
//!
//! A `Session` is an immutable snapshot; the mutable cell that owns the
//! current session lives in the client crate. Constructors are the only way
//! to build one, so the invariants below hold for every value in the program:
//!
//! - `authenticated` implies an identity and a token are present
//! - `removed` implies not `authenticated`

use serde::Serialize;

use crate::{BearerToken, Identity, Role};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Session {
    #[serde(skip)]
    token: Option<BearerToken>,
    identity: Option<Identity>,
    authenticated: bool,
    removed: bool,
}

impl Session {
    /// Empty session (process start, after logout or forced invalidation).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fully populated session after a successful login or token validation.
    pub fn authenticated(token: BearerToken, identity: Identity) -> Self {
        Self {
            token: Some(token),
            identity: Some(identity),
            authenticated: true,
            removed: false,
        }
    }

    /// Cleared session whose identity was deleted server-side.
    pub fn removed() -> Self {
        Self {
            removed: true,
            ..Self::default()
        }
    }

    pub fn token(&self) -> Option<&BearerToken> {
        self.token.as_ref()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Role of the authenticated identity, if any.
    pub fn role(&self) -> Option<Role> {
        if !self.authenticated {
            return None;
        }
        self.identity.as_ref().map(|i| i.role)
    }

    pub fn is_privileged(&self) -> bool {
        self.role().is_some_and(|r| r.is_privileged())
    }

    /// True when no credential or identity is held.
    pub fn is_cleared(&self) -> bool {
        !self.authenticated && self.token.is_none() && self.identity.is_none()
    }

    /// Check both session invariants.
    pub fn invariants_hold(&self) -> bool {
        let auth_ok = !self.authenticated || (self.identity.is_some() && self.token.is_some());
        let removed_ok = !self.removed || !self.authenticated;
        auth_ok && removed_ok
    }

    /// Same session with the removed flag acknowledged.
    pub fn without_removed_flag(&self) -> Self {
        Self {
            removed: false,
            ..self.clone()
        }
    }
}

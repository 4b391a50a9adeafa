use serde::Serialize;
use thiserror::Error;

use crate::{Identity, Session};

/// Capability a view or action requires.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredRole {
    /// Reachable without a session.
    Public,
    /// Any authenticated identity.
    Authenticated,
    /// Authenticated identity with the privileged role.
    Privileged,
}

/// Outcome of an authorization gate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    ShowLogin,
    RedirectDefault,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("forbidden: privileged role required")]
    Forbidden,
}

/// Decide whether `session` may reach something guarded by `required`.
///
/// - No IO
/// - No panics
/// - Total over every (session, required) pair
pub fn decide(session: &Session, required: RequiredRole) -> Decision {
    match required {
        RequiredRole::Public => Decision::Allow,
        RequiredRole::Authenticated if session.is_authenticated() => Decision::Allow,
        RequiredRole::Authenticated => Decision::ShowLogin,
        RequiredRole::Privileged if session.is_privileged() => Decision::Allow,
        RequiredRole::Privileged if session.is_authenticated() => Decision::RedirectDefault,
        RequiredRole::Privileged => Decision::ShowLogin,
    }
}

/// Command-side check used by admin operations before they touch the network.
pub fn require_privileged(session: &Session) -> Result<&Identity, AuthzError> {
    match decide(session, RequiredRole::Privileged) {
        Decision::Allow => session.identity().ok_or(AuthzError::NotAuthenticated),
        Decision::RedirectDefault => Err(AuthzError::Forbidden),
        Decision::ShowLogin => Err(AuthzError::NotAuthenticated),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation
// ─────────────────────────────────────────────────────────────────────────────

/// Human-readable account of a gate decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required: RequiredRole,
    pub decision: Decision,
    pub reason: String,
}

/// Explain why `decide` returned what it returned.
pub fn explain(session: &Session, required: RequiredRole) -> AuthorizationExplanation {
    let decision = decide(session, required);
    let who = session
        .identity()
        .filter(|_| session.is_authenticated())
        .map(|i| format!("'{}' ({})", i.username, i.role))
        .unwrap_or_else(|| "anonymous visitor".to_string());

    let reason = match (required, decision) {
        (RequiredRole::Public, _) => "public view, no session required".to_string(),
        (_, Decision::Allow) => format!("{who} satisfies {required:?}"),
        (_, Decision::ShowLogin) => format!("{who} must sign in first"),
        (_, Decision::RedirectDefault) => {
            format!("{who} lacks the privileged role; sending to the default view")
        }
    };

    AuthorizationExplanation {
        required,
        decision,
        reason,
    }
}

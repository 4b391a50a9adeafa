//! `warden-auth`
//!
//! **Responsibility:** the pure session and authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP, storage and async
//! runtimes: every function here is deterministic over its inputs.

pub mod authorize;
pub mod guard;
pub mod identity;
pub mod lifecycle;
pub mod registration;
pub mod roles;
pub mod session;
pub mod timestamp;
pub mod token;

pub use authorize::{
    AuthorizationExplanation, AuthzError, Decision, RequiredRole, decide, explain,
    require_privileged,
};
pub use guard::{Screen, View, menu, route};
pub use identity::{Identity, ThemePreference};
pub use lifecycle::{DeletedOrder, DeletionRecord, LifecycleError, LifecycleState};
pub use registration::{Registration, RegistrationForm, ValidationErrors};
pub use roles::Role;
pub use session::Session;
pub use token::BearerToken;

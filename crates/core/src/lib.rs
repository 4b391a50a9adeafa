//! `warden-core`
//!
//! **Responsibility:** identifier and error primitives shared by every crate.
//!
//! Pure domain types only; no infrastructure concerns.

pub mod error;
pub mod id;

pub use error::{DomainError, FieldError};
pub use id::UserId;

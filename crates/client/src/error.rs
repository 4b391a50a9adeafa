//! Client error taxonomy.

use serde_json::Value;
use thiserror::Error;

use warden_auth::{AuthzError, ValidationErrors};
use warden_core::FieldError;

use crate::config::ConfigError;
use crate::token_store::TokenStoreError;
use crate::transport::{ApiResponse, TransportError};

#[derive(Debug, Error)]
pub enum ClientError {
    /// Credentials rejected at login.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Field-scoped validation failure (client-side or reported by the authority).
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Duplicate username/email or similar.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Transport failure or timeout; treated as transient.
    #[error("remote authority unreachable: {0}")]
    Unreachable(String),

    /// The bearer token was rejected; the session has been cleared.
    #[error("authentication expired, please log in again")]
    AuthExpired,

    /// An authenticated call was attempted without a session.
    #[error("not signed in")]
    NotAuthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Target no longer exists, usually because another administrator got there first.
    #[error("not found: {0}")]
    NotFound(String),

    /// The client declined to send the request.
    #[error("refused: {0}")]
    Refused(String),

    /// Any other non-success response; `detail` is the authority's reason verbatim.
    #[error("{detail} (HTTP {status})")]
    Api { status: u16, detail: String },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error(transparent)]
    Storage(#[from] TokenStoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// Map a non-success response onto the taxonomy.
    pub fn from_response(resp: &ApiResponse) -> Self {
        let detail = resp.detail();
        match resp.status {
            401 => ClientError::AuthExpired,
            403 => ClientError::Forbidden(detail),
            404 => ClientError::NotFound(detail),
            409 => ClientError::Conflict(detail),
            422 => ClientError::Validation(validation_from_body(&resp.body, detail)),
            status => ClientError::Api { status, detail },
        }
    }

    /// True for errors the UI should show as a transient notice and then refresh.
    pub fn is_stale_listing(&self) -> bool {
        matches!(self, ClientError::Forbidden(_) | ClientError::NotFound(_))
    }
}

impl From<TransportError> for ClientError {
    fn from(value: TransportError) -> Self {
        ClientError::Unreachable(value.to_string())
    }
}

impl From<ValidationErrors> for ClientError {
    fn from(value: ValidationErrors) -> Self {
        ClientError::Validation(value)
    }
}

impl From<AuthzError> for ClientError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::NotAuthenticated => ClientError::NotAuthenticated,
            AuthzError::Forbidden => ClientError::Forbidden(value.to_string()),
        }
    }
}

/// Field errors from a 422 body of the form
/// `{"detail": [{"loc": ["body", "username"], "msg": "..."}]}`.
fn validation_from_body(body: &Value, fallback: String) -> ValidationErrors {
    let fields: Vec<FieldError> = body
        .get("detail")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let msg = item.get("msg")?.as_str()?;
                    let field = item
                        .get("loc")
                        .and_then(Value::as_array)
                        .and_then(|loc| loc.last())
                        .and_then(Value::as_str)
                        .unwrap_or("form");
                    Some(FieldError::new(field, msg))
                })
                .collect()
        })
        .unwrap_or_default();

    if fields.is_empty() {
        ValidationErrors(vec![FieldError::new("form", fallback)])
    } else {
        ValidationErrors(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_mapping() {
        let cases = [
            (401, "x"),
            (403, "Not enough permissions. Owner role required."),
            (404, "Deleted user not found"),
            (409, "Username already registered"),
            (500, "boom"),
        ];
        let mapped: Vec<ClientError> = cases
            .iter()
            .map(|(status, detail)| {
                ClientError::from_response(&ApiResponse::json(*status, json!({ "detail": detail })))
            })
            .collect();

        assert!(matches!(mapped[0], ClientError::AuthExpired));
        assert!(matches!(&mapped[1], ClientError::Forbidden(d) if d.contains("Owner role")));
        assert!(matches!(&mapped[2], ClientError::NotFound(d) if d == "Deleted user not found"));
        assert!(matches!(mapped[3], ClientError::Conflict(_)));
        assert!(matches!(&mapped[4], ClientError::Api { status: 500, detail } if detail == "boom"));
    }

    #[test]
    fn unprocessable_entity_becomes_field_errors() {
        let resp = ApiResponse::json(
            422,
            json!({ "detail": [
                { "loc": ["body", "username"], "msg": "ensure this value has at least 3 characters" }
            ]}),
        );
        let ClientError::Validation(errors) = ClientError::from_response(&resp) else {
            panic!("expected validation error");
        };
        assert!(errors.for_field("username").is_some());
    }
}

//! Credential gateway: login, registration, logout and startup validation.

use std::sync::Arc;

use warden_auth::{BearerToken, Identity, RegistrationForm, Session, ValidationErrors};
use warden_core::FieldError;

use crate::error::{ClientError, ClientResult};
use crate::session_store::{ClearReason, SessionStore};
use crate::transport::{ApiRequest, ApiResponse, endpoints, send_bounded};
use crate::types::{Ack, LoginRequest, TokenResponse};

/// Outcome of validating a persisted token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValidation {
    Valid(Identity),
    Invalid,
}

#[derive(Debug, Clone)]
pub struct CredentialGateway {
    store: Arc<SessionStore>,
}

impl CredentialGateway {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let transport = self.store.transport().as_ref();
        Ok(send_bounded(transport, request, self.store.request_timeout()).await?)
    }

    /// Exchange credentials for a token, fetch the identity and install the session.
    ///
    /// The token is persisted only once the identity fetch has succeeded.
    /// No retries.
    pub async fn login(&self, username: &str, password: &str) -> ClientResult<Session> {
        let username = username.trim();
        let mut missing = Vec::new();
        if username.is_empty() {
            missing.push(FieldError::new("username", "is required"));
        }
        if password.is_empty() {
            missing.push(FieldError::new("password", "is required"));
        }
        if !missing.is_empty() {
            return Err(ValidationErrors(missing).into());
        }

        let request = ApiRequest::post(endpoints::LOGIN).with_json(&LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })?;
        let resp = self.send(request).await?;

        if !resp.is_success() {
            tracing::info!(%username, status = resp.status, "login rejected");
            return Err(match resp.status {
                400 | 401 => ClientError::InvalidCredentials(resp.detail()),
                _ => ClientError::from_response(&resp),
            });
        }

        let issued: TokenResponse = resp.decode()?;
        let token = BearerToken::new(issued.access_token);
        if token.is_blank() {
            return Err(ClientError::Decode("login response carried an empty token".into()));
        }

        let identity = match self.validate_token(&token).await? {
            TokenValidation::Valid(identity) => identity,
            TokenValidation::Invalid => {
                return Err(ClientError::InvalidCredentials(
                    "failed to get user information".to_string(),
                ));
            }
        };

        self.store.establish(token, identity)?;
        Ok(self.store.snapshot())
    }

    /// Create a standard-role identity.
    ///
    /// The form is validated locally first; nothing is sent if it fails.
    pub async fn register(&self, form: RegistrationForm) -> ClientResult<Ack> {
        let registration = form.validate()?;

        let request = ApiRequest::post(endpoints::REGISTER).with_json(&registration)?;
        let resp = self.send(request).await?;

        if !resp.is_success() {
            tracing::info!(username = %registration.username, status = resp.status, "registration rejected");
            return Err(match resp.status {
                400 | 409 => ClientError::Conflict(resp.detail()),
                _ => ClientError::from_response(&resp),
            });
        }

        tracing::info!(username = %registration.username, "registered");
        let ack = resp.decode().unwrap_or_else(|_| Ack::new("Registration successful"));
        Ok(ack)
    }

    /// End the session.
    ///
    /// Local state is cleared first and unconditionally; the server-side
    /// invalidation afterwards is best-effort and only logged on failure.
    pub async fn logout(&self) {
        let token = self.store.snapshot().token().cloned();
        self.store.clear(ClearReason::Logout, None);

        let Some(token) = token else {
            return;
        };

        match self
            .send(ApiRequest::post(endpoints::LOGOUT).with_bearer(token))
            .await
        {
            Ok(resp) if resp.is_success() => tracing::debug!("server-side logout acknowledged"),
            Ok(resp) => tracing::warn!(
                status = resp.status,
                detail = %resp.detail(),
                "server-side logout failed"
            ),
            Err(e) => tracing::warn!(error = %e, "server-side logout failed"),
        }
    }

    /// Ask the authority who `token` belongs to.
    ///
    /// Any non-success answer means the token is unusable. Transport failures
    /// are returned as errors so the caller can decide.
    pub async fn validate_token(&self, token: &BearerToken) -> ClientResult<TokenValidation> {
        let resp = self
            .send(ApiRequest::get(endpoints::ME).with_bearer(token.clone()))
            .await?;

        if !resp.is_success() {
            tracing::debug!(status = resp.status, "token rejected");
            return Ok(TokenValidation::Invalid);
        }
        Ok(TokenValidation::Valid(resp.decode()?))
    }

    /// Restore a session from the persisted token at startup.
    ///
    /// Never surfaces an error: an unreadable, invalid or unverifiable token
    /// is removed and the session stays empty.
    pub async fn restore_session(&self) -> Session {
        let token = match self.store.tokens().load() {
            Ok(Some(token)) => token,
            Ok(None) => return self.store.snapshot(),
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable persisted token");
                self.store.clear(ClearReason::InvalidToken, None);
                return self.store.snapshot();
            }
        };

        match self.validate_token(&token).await {
            Ok(TokenValidation::Valid(identity)) => {
                if let Err(e) = self.store.establish(token, identity) {
                    tracing::warn!(error = %e, "could not persist restored token");
                    self.store.clear(ClearReason::InvalidToken, None);
                }
            }
            Ok(TokenValidation::Invalid) => {
                tracing::info!("persisted token is no longer valid");
                self.store.clear(ClearReason::InvalidToken, None);
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not validate persisted token");
                self.store.clear(ClearReason::InvalidToken, None);
            }
        }
        self.store.snapshot()
    }
}

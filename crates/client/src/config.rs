//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `WARDEN_API_URL` - Base URL of the remote authority (default: `http://localhost:8000/api`)
//! - `WARDEN_REQUEST_TIMEOUT_SECS` - Upper bound for any single request (default: 10)
//! - `WARDEN_POLL_INTERVAL_SECS` - Existence check interval (default: 30)
//! - `WARDEN_TRANSIENT_WARN_THRESHOLD` - Consecutive failed existence checks before a warning (default: 5)
//! - `WARDEN_TOKEN_PATH` - File holding the persisted bearer token
//!   (default: `{data_dir}/warden/session.json`)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_TRANSIENT_WARN_THRESHOLD: u32 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("could not resolve an application data directory for the token file")]
    NoDataDir,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub request_timeout: Duration,
    pub existence_poll_interval: Duration,
    pub transient_failure_warn_threshold: u32,
    pub token_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            existence_poll_interval: DEFAULT_POLL_INTERVAL,
            transient_failure_warn_threshold: DEFAULT_TRANSIENT_WARN_THRESHOLD,
            token_path: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error when a variable is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("WARDEN_API_URL") {
            config = config.with_api_url(url)?;
        }
        if let Some(secs) = parse_positive(&lookup, "WARDEN_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_positive(&lookup, "WARDEN_POLL_INTERVAL_SECS")? {
            config.existence_poll_interval = Duration::from_secs(secs);
        }
        if let Some(n) = parse_positive(&lookup, "WARDEN_TRANSIENT_WARN_THRESHOLD")? {
            config.transient_failure_warn_threshold = u32::try_from(n).unwrap_or(u32::MAX);
        }
        if let Some(path) = lookup("WARDEN_TOKEN_PATH").filter(|p| !p.trim().is_empty()) {
            config.token_path = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    /// Override the API base URL (trailing slashes are dropped).
    pub fn with_api_url(mut self, url: impl Into<String>) -> Result<Self, ConfigError> {
        let url = url.into();
        let trimmed = url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(ConfigError::Empty("WARDEN_API_URL"));
        }
        self.api_url = trimmed.to_string();
        Ok(self)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.existence_poll_interval = interval;
        self
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = Some(path.into());
        self
    }

    /// Token file location: explicit path or `{data_dir}/warden/session.json`.
    pub fn resolved_token_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.token_path {
            return Ok(path.clone());
        }

        let mut dir = dirs::data_dir()
            .or_else(|| {
                dirs::home_dir().map(|mut h| {
                    h.push(".local");
                    h.push("share");
                    h
                })
            })
            .ok_or(ConfigError::NoDataDir)?;
        dir.push("warden");
        dir.push("session.json");
        Ok(dir)
    }
}

fn parse_positive<F>(lookup: &F, name: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(ConfigError::InvalidNumber { name, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.existence_poll_interval, Duration::from_secs(30));
        assert!(config.token_path.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("WARDEN_API_URL", "https://auth.example.com/api/"),
            ("WARDEN_REQUEST_TIMEOUT_SECS", "3"),
            ("WARDEN_POLL_INTERVAL_SECS", "5"),
            ("WARDEN_TOKEN_PATH", "/tmp/warden-token.json"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://auth.example.com/api");
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.existence_poll_interval, Duration::from_secs(5));
        assert_eq!(
            config.resolved_token_path().unwrap(),
            PathBuf::from("/tmp/warden-token.json")
        );
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[("WARDEN_POLL_INTERVAL_SECS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));

        let err = ClientConfig::from_lookup(lookup(&[("WARDEN_REQUEST_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("WARDEN_REQUEST_TIMEOUT_SECS"));
    }

    #[test]
    fn blank_api_url_is_rejected() {
        assert!(matches!(
            ClientConfig::default().with_api_url(" / "),
            Err(ConfigError::Empty(_))
        ));
    }
}

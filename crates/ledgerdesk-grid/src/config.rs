//! Client configuration and validation.

use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Status that signals a rejected token unless configured otherwise.
pub const DEFAULT_SESSION_INVALID_STATUS: u16 = 401;
/// Screen the session guard redirects to.
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Validated settings for [`crate::client::ResourceClient`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// API root; always ends with `/` so relative paths join under it.
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Statuses treated as an invalid session.
    pub session_invalid_statuses: Vec<u16>,
    /// Navigation target after an invalid session.
    pub login_path: String,
}

impl ClientConfig {
    /// Start building a configuration for the given API root.
    #[must_use]
    pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            session_invalid_statuses: Vec::new(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
        }
    }

    /// Whether `status` signals an invalid session.
    #[must_use]
    pub fn is_session_invalid(&self, status: u16) -> bool {
        self.session_invalid_statuses.contains(&status)
    }
}

/// Builder for [`ClientConfig`].
#[derive(Clone, Debug)]
pub struct ClientConfigBuilder {
    base_url: String,
    timeout: Duration,
    session_invalid_statuses: Vec<u16>,
    login_path: String,
}

impl ClientConfigBuilder {
    /// Override the request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a status that signals an invalid session. When none are added,
    /// only `401` is used.
    #[must_use]
    pub fn session_invalid_status(mut self, status: u16) -> Self {
        if !self.session_invalid_statuses.contains(&status) {
            self.session_invalid_statuses.push(status);
        }
        self
    }

    /// Override the login path.
    #[must_use]
    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Validate and produce the configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError`] for a malformed URL, a zero timeout, a non-error
    /// session status, or a relative login path.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let raw = self.base_url.trim();
        let mut base_url = Url::parse(raw).map_err(|err| ConfigError::InvalidBaseUrl {
            value: raw.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl {
                value: raw.to_string(),
                reason: format!("unsupported scheme `{}`", base_url.scheme()),
            });
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        let mut statuses = self.session_invalid_statuses;
        if statuses.is_empty() {
            statuses.push(DEFAULT_SESSION_INVALID_STATUS);
        }
        if let Some(value) = statuses.iter().copied().find(|s| !(400..600).contains(s)) {
            return Err(ConfigError::InvalidSessionStatus { value });
        }
        let login_path = self.login_path.trim().to_string();
        if !login_path.starts_with('/') {
            return Err(ConfigError::InvalidLoginPath { value: login_path });
        }
        Ok(ClientConfig {
            base_url,
            timeout: self.timeout,
            session_invalid_statuses: statuses,
            login_path,
        })
    }
}

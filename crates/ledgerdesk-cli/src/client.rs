//! Shared context, error types, and session wiring for the CLI.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use ledgerdesk_grid::auth::{FileTokenStore, TokenStore};
use ledgerdesk_grid::client::{HEADER_REQUEST_ID, ReqwestTransport, ResourceClient};
use ledgerdesk_grid::config::ClientConfig;
use ledgerdesk_grid::envelope::envelope_message;
use ledgerdesk_grid::error::{ErrorKind, RequestError};
use ledgerdesk_grid::session::{Navigator, SessionGuard};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use url::Url;

use crate::cli::Cli;

const SESSION_DIR: &str = "ledgerdesk";
const SESSION_FILE: &str = "session.json";

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<RequestError> for CliError {
    fn from(err: RequestError) -> Self {
        match err.kind() {
            ErrorKind::Unauthenticated => {
                Self::validation("not signed in; run `ledgerdesk login` first")
            }
            ErrorKind::SessionInvalid => {
                Self::validation("session is no longer valid; run `ledgerdesk login` again")
            }
            ErrorKind::NetworkOrServer => Self::failure(err),
        }
    }
}

/// Tells the user to sign in again when the server rejects the stored session.
#[derive(Debug, Default)]
pub(crate) struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate_to(&self, path: &str) {
        tracing::debug!(path, "login required");
        eprintln!("session expired: run `ledgerdesk login` to sign in again");
    }
}

/// Application context passed to command handlers.
#[derive(Clone)]
pub(crate) struct AppContext {
    /// Plain HTTP client for unauthenticated calls (login).
    pub(crate) http: Client,
    /// Authenticated client used by every list screen.
    pub(crate) api: ResourceClient,
    pub(crate) base_url: Url,
    pub(crate) tokens: Arc<dyn TokenStore>,
    pub(crate) session: Arc<SessionGuard>,
}

impl AppContext {
    /// Wire the grid client, session guard, and token store.
    pub(crate) fn new(
        config: ClientConfig,
        tokens: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
        trace_id: &str,
    ) -> CliResult<Self> {
        let session = Arc::new(SessionGuard::new(
            Arc::clone(&tokens),
            navigator,
            config.login_path.clone(),
        ));
        let transport = ReqwestTransport::new(config.timeout).map_err(CliError::failure)?;

        let mut default_headers = HeaderMap::new();
        let request_id = HeaderValue::from_str(trace_id).map_err(|_| {
            CliError::failure(anyhow!("trace identifier contains invalid characters"))
        })?;
        default_headers.insert(HEADER_REQUEST_ID, request_id);
        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api: ResourceClient::new(Arc::new(transport), config, Arc::clone(&session)),
            tokens,
            session,
        })
    }

    /// Context built from parsed flags and environment.
    pub(crate) fn from_cli(cli: &Cli, trace_id: &str) -> CliResult<Self> {
        let mut builder = ClientConfig::builder(cli.api_url.as_str())
            .timeout(Duration::from_secs(cli.timeout));
        for status in &cli.session_statuses {
            builder = builder.session_invalid_status(*status);
        }
        let config = builder
            .build()
            .map_err(|err| CliError::validation(err.to_string()))?;
        let path = match &cli.session_file {
            Some(path) => path.clone(),
            None => default_session_path()?,
        };
        tracing::debug!(path = %path.display(), "using session file");
        Self::new(
            config,
            Arc::new(FileTokenStore::new(path)),
            Arc::new(TerminalNavigator),
            trace_id,
        )
    }

    /// Resolve `path` against the API base URL.
    pub(crate) fn endpoint(&self, path: &str) -> CliResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| CliError::failure(anyhow!("invalid base URL: {err}")))
    }
}

/// `<config dir>/ledgerdesk/session.json`.
pub(crate) fn default_session_path() -> CliResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(SESSION_DIR).join(SESSION_FILE))
        .ok_or_else(|| {
            CliError::validation(
                "no configuration directory found; \
                 pass --session-file or set LEDGERDESK_SESSION_FILE",
            )
        })
}

/// Parse the API URL provided to the CLI.
pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

/// Classify an HTTP response into a CLI error.
pub(crate) async fn classify_problem(response: reqwest::Response) -> CliError {
    let status = response.status();
    let bytes = response.bytes().await.unwrap_or_default();
    let body_text = String::from_utf8_lossy(&bytes).trim().to_string();
    let message = serde_json::from_slice::<Value>(&bytes)
        .ok()
        .as_ref()
        .and_then(envelope_message);

    if matches!(
        status,
        StatusCode::BAD_REQUEST
            | StatusCode::UNAUTHORIZED
            | StatusCode::UNPROCESSABLE_ENTITY
    ) {
        CliError::validation(
            message.unwrap_or_else(|| format!("request rejected with status {status}")),
        )
    } else {
        let detail = match message {
            Some(message) => format!("{message} (status {status})"),
            None if !body_text.is_empty() && !body_text.starts_with('<') => {
                format!("{body_text} (status {status})")
            }
            None => format!("request failed with status {status}"),
        };
        CliError::failure(anyhow!(detail))
    }
}

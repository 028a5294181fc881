//! Payload builders and a wired-up client harness.

use std::sync::Arc;

use ledgerdesk_grid::auth::MemoryTokenStore;
use ledgerdesk_grid::client::{HttpResponse, ResourceClient, Transport};
use ledgerdesk_grid::config::ClientConfig;
use ledgerdesk_grid::error::ConfigError;
use ledgerdesk_grid::session::SessionGuard;
use serde_json::{Value, json};

use crate::mocks::RecordingNavigator;

/// Base URL used by harness clients; never contacted.
pub const TEST_BASE_URL: &str = "http://ledgerdesk.test/api/";

/// Client plus the collaborators a test usually inspects.
#[derive(Debug)]
pub struct Harness {
    /// Client under test.
    pub client: ResourceClient,
    /// Token store behind the client.
    pub tokens: Arc<MemoryTokenStore>,
    /// Navigator receiving session-invalid redirects.
    pub navigator: Arc<RecordingNavigator>,
    /// Session guard shared with the client.
    pub session: Arc<SessionGuard>,
}

impl Harness {
    /// Client over `transport`, optionally signed in with `token`.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the default configuration is rejected.
    pub fn new(transport: Arc<dyn Transport>, token: Option<&str>) -> Result<Self, ConfigError> {
        Self::with_config(transport, token, ClientConfig::builder(TEST_BASE_URL).build()?)
    }

    /// Client over `transport` with an explicit configuration.
    ///
    /// # Errors
    /// Currently infallible.
    pub fn with_config(
        transport: Arc<dyn Transport>,
        token: Option<&str>,
        config: ClientConfig,
    ) -> Result<Self, ConfigError> {
        let tokens =
            Arc::new(token.map_or_else(MemoryTokenStore::new, MemoryTokenStore::with_token));
        let navigator = Arc::new(RecordingNavigator::default());
        let session = Arc::new(SessionGuard::new(
            tokens.clone(),
            navigator.clone(),
            config.login_path.clone(),
        ));
        Ok(Self {
            client: ResourceClient::new(transport, config, Arc::clone(&session)),
            tokens,
            navigator,
            session,
        })
    }
}

/// An employee row.
#[must_use]
pub fn employee(id: u64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "email": format!("{}@example.com", name.to_lowercase()),
        "status": "active",
        "department": {"name": "Operations"},
    })
}

/// Double-nested paginated envelope.
#[must_use]
pub fn paged(rows: Vec<Value>, total: usize, current_page: usize) -> Value {
    json!({
        "status": "success",
        "data": {"data": rows, "total": total, "current_page": current_page},
    })
}

/// `200 OK` with a JSON body.
#[must_use]
pub fn ok(body: &Value) -> HttpResponse {
    HttpResponse::json(200, body)
}

/// Error status with a `message` body.
#[must_use]
pub fn failure(status: u16, message: &str) -> HttpResponse {
    HttpResponse::json(status, &json!({"status": "error", "message": message}))
}

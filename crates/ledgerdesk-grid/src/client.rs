//! Token-authenticated JSON client for the remote REST API.
//!
//! # Design
//! - Transport is a trait so stores and screens can be driven by scripted fakes.
//! - The token is read from the injected store on every call; a missing token is reported
//!   as [`RequestError::Unauthenticated`] before any network traffic.
//! - Session-invalid statuses go through the [`SessionGuard`] and surface as their own error.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde_json::Value;
use url::Url;

use crate::config::ClientConfig;
use crate::envelope::envelope_message;
use crate::error::{RequestError, TransportError};
use crate::session::SessionGuard;

/// Header carrying a per-request correlation id.
pub const HEADER_REQUEST_ID: &str = "x-request-id";

const MAX_ERROR_TEXT: usize = 200;

/// HTTP verbs used by the console.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl Method {
    /// Upper-case verb.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully-resolved outbound request.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    /// Verb.
    pub method: Method,
    /// Absolute URL including query.
    pub url: Url,
    /// Bearer token to attach.
    pub bearer: String,
    /// JSON body, if any.
    pub body: Option<Value>,
}

/// Raw response as seen by the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Body text.
    pub body: String,
}

impl HttpResponse {
    /// Response with a JSON body.
    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

/// Sends requests over the wire.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request.
    ///
    /// # Errors
    /// Returns [`TransportError`] when no HTTP status could be obtained.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with the given timeout.
    ///
    /// # Errors
    /// Returns [`TransportError::Other`] when the HTTP client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TransportError::Other(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    #[must_use]
    pub const fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(request.url),
            Method::Post => self.client.post(request.url),
            Method::Put => self.client.put(request.url),
            Method::Patch => self.client.patch(request.url),
            Method::Delete => self.client.delete(request.url),
        };
        let bearer = HeaderValue::from_str(&format!("Bearer {}", request.bearer))
            .map_err(|_| TransportError::Other("token contains invalid characters".into()))?;
        builder = builder
            .header(AUTHORIZATION, bearer)
            .header(HEADER_REQUEST_ID, uuid::Uuid::new_v4().to_string());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response = builder.send().await.map_err(classify_transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_transport)?;
        Ok(HttpResponse { status, body })
    }
}

fn classify_transport(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

/// Authenticated JSON client shared by every screen.
#[derive(Clone)]
pub struct ResourceClient {
    transport: Arc<dyn Transport>,
    config: Arc<ClientConfig>,
    session: Arc<SessionGuard>,
}

impl fmt::Debug for ResourceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceClient")
            .field("base_url", &self.config.base_url.as_str())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl ResourceClient {
    /// Assemble a client from its collaborators.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        config: ClientConfig,
        session: Arc<SessionGuard>,
    ) -> Self {
        Self {
            transport,
            config: Arc::new(config),
            session,
        }
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Session guard shared with this client.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionGuard> {
        &self.session
    }

    /// Issue a request and return the parsed body unmodified.
    ///
    /// # Errors
    /// - [`RequestError::Unauthenticated`] when no token is stored (no request is sent).
    /// - [`RequestError::SessionInvalid`] when the server rejects the token.
    /// - [`RequestError::Http`], [`RequestError::Network`], or [`RequestError::Decode`] otherwise.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value, RequestError> {
        let bearer = self.current_token()?;
        let url = self.resolve(path, query)?;
        tracing::debug!(%method, url = %url, "issuing request");

        let response = self
            .transport
            .send(HttpRequest {
                method,
                url,
                bearer: bearer.clone(),
                body: body.cloned(),
            })
            .await
            .map_err(|err| {
                tracing::warn!(%method, path, error = %err, "request failed before a response");
                RequestError::Network(err)
            })?;

        if self.config.is_session_invalid(response.status) {
            self.session.invalidate(response.status, &bearer);
            return Err(RequestError::SessionInvalid {
                status: response.status,
            });
        }
        if !(200..300).contains(&response.status) {
            let message = error_message(&response.body, response.status);
            tracing::warn!(%method, path, status = response.status, %message, "request rejected");
            return Err(RequestError::Http {
                status: response.status,
                message,
            });
        }
        parse_body(&response.body)
    }

    /// `GET` with query pairs.
    ///
    /// # Errors
    /// See [`ResourceClient::request`].
    pub async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value, RequestError> {
        self.request(Method::Get, path, query, None).await
    }

    /// `POST` with a JSON body.
    ///
    /// # Errors
    /// See [`ResourceClient::request`].
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, RequestError> {
        self.request(Method::Post, path, &[], Some(body)).await
    }

    /// `GET` that degrades to `null` on any failure, for widgets that render
    /// an empty state instead of an error.
    pub async fn get_or_default(&self, path: &str, query: &[(String, String)]) -> Value {
        match self.get(path, query).await {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(path, error = %err, "falling back to empty result");
                Value::Null
            }
        }
    }

    fn current_token(&self) -> Result<String, RequestError> {
        match self.session.store().auth_token() {
            Ok(Some(token)) => Ok(token),
            Ok(None) => Err(RequestError::Unauthenticated),
            Err(err) => {
                tracing::warn!(error = %err, "token store unreadable; treating as signed out");
                Err(RequestError::Unauthenticated)
            }
        }
    }

    fn resolve(&self, path: &str, query: &[(String, String)]) -> Result<Url, RequestError> {
        let mut url = self
            .config
            .base_url
            .join(path.trim().trim_start_matches('/'))
            .map_err(|_| RequestError::InvalidPath {
                path: path.to_string(),
            })?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }
}

fn parse_body(body: &str) -> Result<Value, RequestError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(trimmed).map_err(|err| RequestError::Decode {
        message: err.to_string(),
    })
}

fn error_message(body: &str, status: u16) -> String {
    let trimmed = body.trim();
    if let Some(message) = serde_json::from_str::<Value>(trimmed)
        .ok()
        .as_ref()
        .and_then(envelope_message)
    {
        return message;
    }
    if trimmed.is_empty() || trimmed.starts_with('{') || trimmed.starts_with('<') {
        return format!("request failed with status {status}");
    }
    trimmed.chars().take(MAX_ERROR_TEXT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryTokenStore, TokenStore};
    use crate::testing::{RecordingNavigator, client_for};
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn attaches_bearer_token_and_returns_body_unmodified() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/employees")
                .query_param("page", "1")
                .header("authorization", "Bearer tok-1");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"status": "success", "data": [{"id": 1}], "extra": true}));
        });

        let (client, _, _) = client_for(&server.base_url(), Some("tok-1"));
        let body = client
            .get("/employees", &[("page".into(), "1".into())])
            .await
            .expect("success");

        mock.assert();
        assert_eq!(body["extra"], json!(true));
    }

    #[tokio::test]
    async fn missing_token_short_circuits_without_network() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.any_request();
            then.status(200).json_body(json!([]));
        });

        let (client, _, _) = client_for(&server.base_url(), None);
        let err = client.get("/public", &[]).await.expect_err("no token");

        assert_eq!(err, RequestError::Unauthenticated);
        assert_eq!(mock.hits(), 0);
    }

    #[tokio::test]
    async fn session_invalid_clears_token_and_redirects() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/employees");
            then.status(401).json_body(json!({"message": "Unauthenticated."}));
        });

        let (client, store, navigator): (_, Arc<MemoryTokenStore>, Arc<RecordingNavigator>) =
            client_for(&server.base_url(), Some("expired"));
        let err = client.get("/employees", &[]).await.expect_err("401");

        assert_eq!(err, RequestError::SessionInvalid { status: 401 });
        assert_eq!(store.auth_token().expect("read"), None);
        assert_eq!(navigator.visits(), vec!["/login".to_string()]);

        let second = client.get("/employees", &[]).await.expect_err("signed out");
        assert_eq!(second, RequestError::Unauthenticated);
        assert_eq!(navigator.visits().len(), 1);
    }

    #[tokio::test]
    async fn server_errors_carry_status_and_message() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/prospects/convert");
            then.status(422)
                .json_body(json!({"status": "error", "message": "lead already converted"}));
        });

        let (client, _, navigator) = client_for(&server.base_url(), Some("tok"));
        let err = client
            .post("/prospects/convert", &json!({"ids": [1]}))
            .await
            .expect_err("422");

        assert_eq!(
            err,
            RequestError::Http {
                status: 422,
                message: "lead already converted".into()
            }
        );
        assert!(navigator.visits().is_empty());
    }

    #[tokio::test]
    async fn plain_text_errors_are_trimmed() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.any_request();
            then.status(503).body("  maintenance window  ");
        });
        let (client, _, _) = client_for(&server.base_url(), Some("tok"));
        let err = client.get("/x", &[]).await.expect_err("503");
        assert_eq!(err.status(), Some(503));
        assert!(matches!(
            err,
            RequestError::Http { message, .. } if message == "maintenance window"
        ));
    }

    #[tokio::test]
    async fn empty_body_is_null_and_garbage_is_decode_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.path("/empty");
            then.status(204);
        });
        server.mock(|when, then| {
            when.path("/garbage");
            then.status(200).body("<html>");
        });
        let (client, _, _) = client_for(&server.base_url(), Some("tok"));
        assert_eq!(client.get("/empty", &[]).await.expect("null"), Value::Null);
        assert!(matches!(
            client.get("/garbage", &[]).await,
            Err(RequestError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let (client, _, _) = client_for("http://127.0.0.1:9", Some("tok"));
        let err = client.get("/employees", &[]).await.expect_err("refused");
        assert!(matches!(err, RequestError::Network(_)));
        assert!(err.is_retryable());
        assert_eq!(client.get_or_default("/employees", &[]).await, Value::Null);
    }

    #[test]
    fn error_message_prefers_envelope_fields() {
        assert_eq!(error_message(r#"{"error":"bad id"}"#, 400), "bad id");
        assert_eq!(error_message("", 500), "request failed with status 500");
        assert_eq!(
            error_message("<html>oops</html>", 502),
            "request failed with status 502"
        );
    }
}

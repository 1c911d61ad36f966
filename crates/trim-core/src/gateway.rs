use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::credentials::{CredentialError, CredentialStore};
use crate::overview::OverviewSnapshot;

/// Default backend root, overridable per client.
pub const DEFAULT_API_BASE: &str = "http://localhost:8787/api/v1";

#[derive(Debug, Error)]
pub enum ApiError {
    /// An operation needing a provider scope was invoked without one. This is
    /// a caller bug, not an expected runtime condition.
    #[error("no provider is linked; connect an account first")]
    MissingProvider,
    /// Non-2xx response. The message is shown to the user verbatim.
    #[error("{message}")]
    Request { status: u16, message: String },
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] CredentialError),
}

/// Successful `POST /connect` payload. `connectionId` becomes the bearer
/// token for every subsequent call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub connection_id: String,
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

/// The backend surface the engine depends on. One implementation speaks HTTP
/// ([`ApiClient`]); tests substitute fakes.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn connect(
        &self,
        provider: &str,
        credentials: &Value,
    ) -> Result<ConnectResponse, ApiError>;

    async fn list_projects(&self, provider: &str) -> Result<Vec<Project>, ApiError>;

    async fn get_overview(
        &self,
        provider: &str,
        project: Option<&str>,
    ) -> Result<OverviewSnapshot, ApiError>;

    async fn send_chat(&self, message: &str) -> Result<ChatReply, ApiError>;
}

/// HTTP gateway client. Every network call funnels through [`ApiClient::request`],
/// which injects the bearer token from the credential store and normalizes
/// error bodies.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<CredentialStore>,
}

impl ApiClient {
    pub fn new(store: Arc<CredentialStore>) -> Self {
        Self::with_base_url(store, DEFAULT_API_BASE)
    }

    pub fn with_base_url(store: Arc<CredentialStore>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "issuing API request");

        let mut builder = self.http.request(method, &url);
        if let Some(connection) = self.store.load()? {
            builder = builder.bearer_auth(connection.token);
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let raw = response.text().await?;
        let payload = parse_lenient(&raw);

        if !status.is_success() {
            return Err(ApiError::Request {
                status: status.as_u16(),
                message: server_message(status, &payload),
            });
        }
        Ok(serde_json::from_value(payload)?)
    }
}

/// A successful response with an unparseable body reads as an empty object,
/// never as an error. Keeps empty 204-style replies harmless.
fn parse_lenient(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

/// Prefer the server-supplied message; fall back to the transport status text.
fn server_message(status: StatusCode, payload: &Value) -> String {
    payload
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string())
        })
}

fn overview_path(provider: &str, project: Option<&str>) -> String {
    match project {
        Some(id) => format!("/{provider}/overview?project={}", urlencoding::encode(id)),
        None => format!("/{provider}/overview"),
    }
}

#[async_trait]
impl Gateway for ApiClient {
    async fn connect(
        &self,
        provider: &str,
        credentials: &Value,
    ) -> Result<ConnectResponse, ApiError> {
        if provider.trim().is_empty() {
            return Err(ApiError::MissingProvider);
        }
        self.request(
            Method::POST,
            "/connect",
            Some(serde_json::json!({ "provider": provider, "credentials": credentials })),
        )
        .await
    }

    async fn list_projects(&self, provider: &str) -> Result<Vec<Project>, ApiError> {
        if provider.trim().is_empty() {
            return Err(ApiError::MissingProvider);
        }
        self.request(Method::GET, &format!("/{provider}/projects"), None)
            .await
    }

    async fn get_overview(
        &self,
        provider: &str,
        project: Option<&str>,
    ) -> Result<OverviewSnapshot, ApiError> {
        if provider.trim().is_empty() {
            return Err(ApiError::MissingProvider);
        }
        self.request(Method::GET, &overview_path(provider, project), None)
            .await
    }

    async fn send_chat(&self, message: &str) -> Result<ChatReply, ApiError> {
        self.request(
            Method::POST,
            "/chat",
            Some(serde_json::json!({ "message": message })),
        )
        .await
    }
}

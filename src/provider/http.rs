//! HTTP implementation of the backend contract.
//!
//! All routes live under `{base_url}/integrations/{provider}` and take
//! form-encoded bodies. Error responses carry a `{"detail": "..."}` body,
//! which is surfaced to the user verbatim.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;

use super::{BackendError, BackendResult, IntegrationBackend, ProviderKind};
use crate::registry::is_present;

/// Default backend location.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Route prefix for integration endpoints.
const INTEGRATIONS_PATH: &str = "/integrations";

/// Configuration for the HTTP backend client.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the backend, without trailing slash
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl BackendConfig {
    /// Create a config for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Backend client speaking the integration routes over HTTP.
pub struct HttpBackend {
    client: Client,
    config: BackendConfig,
}

impl HttpBackend {
    /// Create a new backend client.
    pub fn new(config: BackendConfig) -> BackendResult<Self> {
        if config.base_url.trim().is_empty() {
            return Err(BackendError::Config("backend URL is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// URL of a provider route, e.g. `.../integrations/notion/authorize`.
    pub fn endpoint(&self, kind: ProviderKind, route: &str) -> String {
        format!(
            "{}{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            INTEGRATIONS_PATH,
            kind.slug(),
            route
        )
    }

    /// Route used to load data for a provider.
    fn load_route(kind: ProviderKind) -> &'static str {
        match kind {
            ProviderKind::HubSpot => "get_hubspot_items",
            ProviderKind::Notion | ProviderKind::Airtable => "load",
        }
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> BackendResult<Response> {
        tracing::debug!(url, "POST");

        let response = self.client.post(url).form(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                detail: error_detail(&body)
                    .unwrap_or_else(|| format!("HTTP {} error", status.as_u16())),
            });
        }

        Ok(response)
    }

    async fn post_credentials(
        &self,
        kind: ProviderKind,
        route: &str,
        credentials: &Value,
        extra: &[(&str, &str)],
    ) -> BackendResult<Value> {
        let encoded = encode_credentials(credentials)?;
        let mut form = vec![("credentials", encoded.as_str())];
        form.extend_from_slice(extra);

        let response = self.post_form(&self.endpoint(kind, route), &form).await?;
        response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    /// List Notion databases visible to the stored credentials.
    pub async fn notion_databases(&self, credentials: &Value) -> BackendResult<Value> {
        self.post_credentials(ProviderKind::Notion, "databases", credentials, &[])
            .await
    }

    /// List items of one Notion database.
    pub async fn notion_database_items(
        &self,
        credentials: &Value,
        database_id: &str,
    ) -> BackendResult<Value> {
        self.post_credentials(
            ProviderKind::Notion,
            "database_items",
            credentials,
            &[("database_id", database_id)],
        )
        .await
    }
}

#[async_trait]
impl IntegrationBackend for HttpBackend {
    async fn authorize(&self, kind: ProviderKind, user: &str, org: &str) -> BackendResult<String> {
        let url = self.endpoint(kind, "authorize");
        let response = self
            .post_form(&url, &[("user_id", user), ("org_id", org)])
            .await?;

        let body = response.text().await?;
        let auth_url = parse_authorization_url(&body)?;
        tracing::debug!(provider = %kind, "Received authorization URL");
        Ok(auth_url)
    }

    async fn credentials(
        &self,
        kind: ProviderKind,
        user: &str,
        org: &str,
    ) -> BackendResult<Option<Value>> {
        let url = self.endpoint(kind, "credentials");
        let response = self
            .post_form(&url, &[("user_id", user), ("org_id", org)])
            .await?;

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        let credentials: Value =
            serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(is_present(&credentials).then_some(credentials))
    }

    async fn load(&self, kind: ProviderKind, credentials: &Value) -> BackendResult<Value> {
        self.post_credentials(kind, Self::load_route(kind), credentials, &[])
            .await
    }
}

/// Extract `detail` from a FastAPI style error body.
fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(detail) => Some(detail.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// The authorize route answers with a JSON string; tolerate a bare URL too.
fn parse_authorization_url(body: &str) -> BackendResult<String> {
    let url = match serde_json::from_str::<Value>(body) {
        Ok(Value::String(url)) => url,
        Ok(other) => {
            return Err(BackendError::Decode(format!(
                "expected authorization URL, got {}",
                other
            )))
        }
        Err(_) => body.trim().to_string(),
    };

    if url.is_empty() {
        return Err(BackendError::Decode("empty authorization URL".to_string()));
    }
    Ok(url)
}

/// Credentials are sent as a JSON document in the `credentials` form field.
///
/// Blobs stored as JSON strings are unwrapped first so the backend never
/// receives a doubly encoded document.
fn encode_credentials(credentials: &Value) -> BackendResult<String> {
    if let Value::String(raw) = credentials {
        if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
            return serde_json::to_string(&parsed).map_err(|e| BackendError::Decode(e.to_string()));
        }
    }
    serde_json::to_string(credentials).map_err(|e| BackendError::Decode(e.to_string()))
}

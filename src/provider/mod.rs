//! Provider kinds and the backend contract.
//!
//! This module defines the supported third-party providers and the
//! `IntegrationBackend` trait through which connectors talk to the backend
//! that owns the actual OAuth integration with each provider.

pub mod http;

pub use http::{BackendConfig, HttpBackend};

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A third-party service that can be connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderKind {
    /// HubSpot CRM
    HubSpot,
    /// Notion workspace
    Notion,
    /// Airtable bases
    Airtable,
}

impl ProviderKind {
    /// Every supported provider, in display order.
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::HubSpot,
        ProviderKind::Notion,
        ProviderKind::Airtable,
    ];

    /// Name shown to users and written as the record type.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::HubSpot => "HubSpot",
            ProviderKind::Notion => "Notion",
            ProviderKind::Airtable => "Airtable",
        }
    }

    /// Path segment used by the backend routes.
    pub fn slug(&self) -> &'static str {
        match self {
            ProviderKind::HubSpot => "hubspot",
            ProviderKind::Notion => "notion",
            ProviderKind::Airtable => "airtable",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Error returned when parsing an unknown provider name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.slug().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

/// Errors from backend calls.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request could not be sent or the connection failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("{detail}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Detail message from the backend, or a generic fallback
        detail: String,
    },

    /// The response body was not the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The backend client is misconfigured.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// The backend's per-provider contract.
///
/// The backend performs the real OAuth exchange with the provider and holds
/// the issued tokens until the client fetches them. Token refresh is not part
/// of the contract; credentials are treated as valid until disconnected.
#[async_trait]
pub trait IntegrationBackend: Send + Sync {
    /// Begin authorization and return the URL to open for the user.
    async fn authorize(&self, kind: ProviderKind, user: &str, org: &str) -> BackendResult<String>;

    /// Fetch credentials issued for this user/org.
    ///
    /// Returns `None` when the backend has nothing yet, which is the normal
    /// answer after the user closes the window without authorizing.
    async fn credentials(
        &self,
        kind: ProviderKind,
        user: &str,
        org: &str,
    ) -> BackendResult<Option<Value>>;

    /// Load provider data using stored credentials.
    async fn load(&self, kind: ProviderKind, credentials: &Value) -> BackendResult<Value>;
}

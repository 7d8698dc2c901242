//! Persisted record shapes for the integration registry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Credential fields that identify an authorized account.
///
/// Equality between two credential blobs only considers these fields.
pub const IDENTITY_FIELDS: [&str; 4] = ["access_token", "token", "refresh_token", "id"];

/// A provider connection as persisted in the store.
///
/// `credentials` is an opaque blob issued by the backend. It is never
/// inspected for business meaning, only for presence and identity fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Provider type as supplied by the caller (e.g. "HubSpot").
    #[serde(rename = "type", default)]
    pub provider_type: String,
    /// Opaque credential blob.
    #[serde(default)]
    pub credentials: Value,
}

impl CredentialRecord {
    /// Create a new record.
    pub fn new(provider_type: impl Into<String>, credentials: Value) -> Self {
        Self {
            provider_type: provider_type.into(),
            credentials,
        }
    }

    /// A record counts as connected only when both fields are present.
    pub fn is_valid(&self) -> bool {
        !self.provider_type.is_empty() && is_present(&self.credentials)
    }

    /// Returns true if this record belongs to `provider_type`, ignoring case.
    pub fn matches(&self, provider_type: &str) -> bool {
        !self.provider_type.is_empty()
            && normalize_key(&self.provider_type) == normalize_key(provider_type)
    }
}

/// All connected providers, keyed by lower-cased provider type.
pub type ConnectionTable = BTreeMap<String, CredentialRecord>;

/// Canonical table key for a provider type.
pub fn normalize_key(provider_type: &str) -> String {
    provider_type.to_lowercase()
}

/// Returns true if a credential value is non-empty.
///
/// `null`, `false`, `0` and `""` are empty. Objects and arrays are always
/// present, even when they have no members.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Ancillary UI state that survives reloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// User identifier sent with authorization requests.
    pub user: Option<String>,
    /// Organization identifier sent with authorization requests.
    pub org: Option<String>,
    /// Provider type currently being configured.
    pub current_type: Option<String>,
}

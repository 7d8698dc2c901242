//! Integration registry over the credential store.
//!
//! The registry is the only component that reads or writes the credential
//! store. It normalizes provider names, merges connection records, answers
//! connectivity queries and compares credentials by identity fields.
//!
//! Every operation is synchronous and fails soft: store and parse failures
//! are logged and turned into a safe default (`false`, `None` or an empty
//! table). Nothing here returns an error to the caller.
//!
//! Writes are read-modify-write over the whole persisted structure with no
//! version check. Two concurrent reconnects of the same provider race and
//! the last writer wins; the registry does not prevent this.

pub mod record;

pub use record::{
    is_present, normalize_key, ConnectionTable, CredentialRecord, SessionState, IDENTITY_FIELDS,
};

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;

use crate::store::{CredentialStore, StoreResult};

/// Store key holding the table of all connected providers.
pub const ALL_INTEGRATIONS_KEY: &str = "allIntegrations";

/// Store key holding the most recently touched provider record.
pub const CURRENT_INTEGRATION_KEY: &str = "integrationParams";

/// Store key for the user identifier.
pub const USER_KEY: &str = "user";

/// Store key for the organization identifier.
pub const ORG_KEY: &str = "org";

/// Store key for the provider currently being configured.
pub const CURRENT_TYPE_KEY: &str = "currType";

/// Mediator between the application and the credential store.
pub struct IntegrationRegistry {
    store: Arc<dyn CredentialStore>,
    /// Revision counter bumped after every successful write.
    revision: watch::Sender<u64>,
}

impl IntegrationRegistry {
    /// Create a registry over the given store.
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        let (revision, _) = watch::channel(0);
        Self { store, revision }
    }

    /// Subscribe to change notifications.
    ///
    /// The received value is a revision counter; it changes after every
    /// write that went through this registry.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Current revision counter.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    /// Read the persisted table. `Ok(None)` when nothing is stored.
    ///
    /// Entries that are not credential records are skipped so that one bad
    /// entry does not hide its siblings.
    fn read_table(&self) -> StoreResult<Option<ConnectionTable>> {
        let json = match self.store.get_item(ALL_INTEGRATIONS_KEY)? {
            Some(json) if !json.is_empty() => json,
            _ => return Ok(None),
        };

        let entries: BTreeMap<String, Value> = serde_json::from_str(&json)?;
        let table: ConnectionTable = entries
            .into_iter()
            .filter_map(|(key, value)| match serde_json::from_value::<CredentialRecord>(value) {
                Ok(record) => Some((key, record)),
                Err(e) => {
                    tracing::warn!(error = %e, key = %key, "Skipping malformed integration entry");
                    None
                }
            })
            .collect();
        Ok(Some(table))
    }

    /// Read the current pointer. `Ok(None)` when nothing is stored.
    fn read_current(&self) -> StoreResult<Option<CredentialRecord>> {
        match self.store.get_item(CURRENT_INTEGRATION_KEY)? {
            Some(json) if !json.is_empty() => Ok(serde_json::from_str(&json)?),
            _ => Ok(None),
        }
    }

    fn write_table(&self, table: &ConnectionTable) -> StoreResult<()> {
        if table.is_empty() {
            self.store.remove_item(ALL_INTEGRATIONS_KEY)
        } else {
            let json = serde_json::to_string(table)?;
            self.store.set_item(ALL_INTEGRATIONS_KEY, &json)
        }
    }

    fn write_current(&self, record: &CredentialRecord) -> StoreResult<()> {
        let json = serde_json::to_string(record)?;
        self.store.set_item(CURRENT_INTEGRATION_KEY, &json)
    }

    /// Resolve the table, falling back to a one-entry table synthesized
    /// from the current pointer.
    fn resolve_table(&self) -> StoreResult<ConnectionTable> {
        if let Some(table) = self.read_table()? {
            return Ok(table);
        }

        let mut table = ConnectionTable::new();
        if let Some(current) = self.read_current()? {
            if current.is_valid() {
                table.insert(normalize_key(&current.provider_type), current);
            }
        }
        Ok(table)
    }

    /// Return every connected provider.
    ///
    /// Falls back to the current pointer when no table is persisted, and to
    /// an empty table when the persisted state is missing or malformed.
    pub fn get_all_integrations(&self) -> ConnectionTable {
        self.resolve_table().unwrap_or_else(|e| {
            tracing::error!(error = %e, "Error getting all integrations");
            ConnectionTable::new()
        })
    }

    /// Look up credentials for a provider, ignoring case.
    pub fn get_integration_credentials(&self, provider_type: &str) -> Option<Value> {
        if provider_type.is_empty() {
            return None;
        }

        let table = self.get_all_integrations();
        if let Some(record) = find_record(&table, provider_type) {
            return present(&record.credentials);
        }

        match self.read_current() {
            Ok(Some(current)) if current.matches(provider_type) => present(&current.credentials),
            Ok(_) => None,
            Err(e) => {
                tracing::error!(error = %e, provider = provider_type, "Error getting single integration");
                None
            }
        }
    }

    /// Store credentials for a provider and make it the current pointer.
    ///
    /// Returns false without side effects when either argument is empty,
    /// and false when persisting fails.
    pub fn save_integration(&self, provider_type: &str, credentials: &Value) -> bool {
        if provider_type.is_empty() || !is_present(credentials) {
            return false;
        }

        let record = CredentialRecord::new(provider_type, credentials.clone());
        let mut table = self.get_all_integrations();
        table.insert(normalize_key(provider_type), record.clone());
        let result = self
            .write_table(&table)
            .and_then(|()| self.write_current(&record));

        match result {
            Ok(()) => {
                tracing::debug!(provider = provider_type, "Saved integration");
                self.bump_revision();
                true
            }
            Err(e) => {
                tracing::error!(error = %e, provider = provider_type, "Error saving integration");
                false
            }
        }
    }

    /// Remove a provider and, if it is the current pointer, clear that too.
    ///
    /// An emptied table is removed from the store instead of being
    /// persisted as `{}`. Returns false for an empty provider type, and
    /// false when the table or the current pointer could not be updated.
    pub fn remove_integration(&self, provider_type: &str) -> bool {
        if provider_type.is_empty() {
            return false;
        }

        let normalized = normalize_key(provider_type);
        let mut table = self.get_all_integrations();
        table.retain(|key, _| normalize_key(key) != normalized);

        if let Err(e) = self.write_table(&table) {
            tracing::error!(error = %e, provider = provider_type, "Error removing integration");
            return false;
        }

        let cleared = match self.read_current() {
            Ok(Some(current)) if current.matches(provider_type) => {
                match self.store.remove_item(CURRENT_INTEGRATION_KEY) {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::error!(error = %e, provider = provider_type, "Error clearing current integration");
                        false
                    }
                }
            }
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Error checking current integration");
                true
            }
        };

        self.bump_revision();
        if cleared {
            tracing::debug!(provider = provider_type, "Removed integration");
        }
        cleared
    }

    /// Returns true if the provider has non-empty credentials stored.
    ///
    /// Read-only; safe to call on every poll tick.
    pub fn is_integration_connected(&self, provider_type: &str) -> bool {
        if provider_type.is_empty() {
            return false;
        }

        match self.read_table() {
            Ok(Some(table)) => {
                if find_record(&table, provider_type)
                    .is_some_and(|record| is_present(&record.credentials))
                {
                    return true;
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed integration table");
            }
        }

        match self.read_current() {
            Ok(Some(current)) => current.matches(provider_type) && is_present(&current.credentials),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed current integration");
                false
            }
        }
    }

    /// Save credentials and, when `set_current` is true, rewrite the
    /// current pointer to this provider.
    ///
    /// Both paths write the same record, so the pointer converges to the
    /// same value whether or not `set_current` is requested.
    pub fn update_integration(
        &self,
        provider_type: &str,
        credentials: &Value,
        set_current: bool,
    ) -> bool {
        if !self.save_integration(provider_type, credentials) {
            return false;
        }

        if set_current {
            let record = CredentialRecord::new(provider_type, credentials.clone());
            if let Err(e) = self.write_current(&record) {
                tracing::error!(error = %e, provider = provider_type, "Error updating integration");
                return false;
            }
        }

        true
    }

    /// Returns true if the stored credentials for a provider identify the
    /// same account as `credentials`.
    pub fn has_matching_credentials(&self, provider_type: &str, credentials: &Value) -> bool {
        if provider_type.is_empty() || !is_present(credentials) {
            return false;
        }

        let table = self.get_all_integrations();
        find_record(&table, provider_type)
            .is_some_and(|record| Self::are_credentials_equal(&record.credentials, credentials))
    }

    /// Compare two credential blobs on their identity fields only.
    ///
    /// Blobs given as JSON strings are parsed first. A field absent (or
    /// empty) on both sides is not a mismatch; everything outside
    /// `IDENTITY_FIELDS` is ignored.
    pub fn are_credentials_equal(a: &Value, b: &Value) -> bool {
        if !is_present(a) || !is_present(b) {
            return false;
        }

        let (Some(a), Some(b)) = (parse_blob(a), parse_blob(b)) else {
            return false;
        };

        IDENTITY_FIELDS.iter().all(|field| {
            let left = a.get(field);
            let right = b.get(field);
            left == right
                || (!left.is_some_and(is_present) && !right.is_some_and(is_present))
        })
    }

    /// The current pointer, when it holds a complete record.
    pub fn current_integration(&self) -> Option<CredentialRecord> {
        match self.read_current() {
            Ok(current) => current.filter(CredentialRecord::is_valid),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed current integration");
                None
            }
        }
    }

    /// Clear the current pointer without touching the table.
    pub fn clear_current(&self) -> bool {
        match self.store.remove_item(CURRENT_INTEGRATION_KEY) {
            Ok(()) => {
                self.bump_revision();
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Error clearing current integration");
                false
            }
        }
    }

    /// Load the ancillary session fields.
    pub fn session_state(&self) -> SessionState {
        SessionState {
            user: self.read_field(USER_KEY),
            org: self.read_field(ORG_KEY),
            current_type: self.read_field(CURRENT_TYPE_KEY),
        }
    }

    /// Persist the ancillary session fields. `None` fields are removed.
    pub fn save_session_state(&self, state: &SessionState) -> bool {
        let result = self
            .write_field(USER_KEY, state.user.as_deref())
            .and_then(|()| self.write_field(ORG_KEY, state.org.as_deref()))
            .and_then(|()| self.write_field(CURRENT_TYPE_KEY, state.current_type.as_deref()));

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "Error saving session state");
                false
            }
        }
    }

    fn read_field(&self, key: &str) -> Option<String> {
        match self.store.get_item(key) {
            // Older clients stored a missing value as the literal "null".
            Ok(Some(value)) if !value.is_empty() && value != "null" => Some(value),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, key, "Error reading session field");
                None
            }
        }
    }

    fn write_field(&self, key: &str, value: Option<&str>) -> StoreResult<()> {
        match value {
            Some(value) => self.store.set_item(key, value),
            None => self.store.remove_item(key),
        }
    }
}

/// Find a record by normalized key, tolerating keys written with other casing.
fn find_record<'a>(table: &'a ConnectionTable, provider_type: &str) -> Option<&'a CredentialRecord> {
    let normalized = normalize_key(provider_type);
    table.get(&normalized).or_else(|| {
        table
            .iter()
            .find(|(key, _)| normalize_key(key) == normalized)
            .map(|(_, record)| record)
    })
}

fn present(credentials: &Value) -> Option<Value> {
    is_present(credentials).then(|| credentials.clone())
}

fn parse_blob(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => serde_json::from_str(s).ok(),
        other => Some(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn registry() -> (Arc<MemoryStore>, IntegrationRegistry) {
        let store = Arc::new(MemoryStore::new());
        let registry = IntegrationRegistry::new(store.clone());
        (store, registry)
    }

    #[test]
    fn test_empty_registry() {
        let (_, registry) = registry();
        assert!(registry.get_all_integrations().is_empty());
        assert!(registry.get_integration_credentials("HubSpot").is_none());
        assert!(!registry.is_integration_connected("HubSpot"));
        assert!(registry.current_integration().is_none());
    }

    #[test]
    fn test_save_round_trip() {
        let (_, registry) = registry();
        let credentials = json!({"access_token": "t1", "expires_in": 1800});

        assert!(registry.save_integration("HubSpot", &credentials));

        assert_eq!(
            registry.get_integration_credentials("HubSpot"),
            Some(credentials.clone())
        );
        assert_eq!(
            registry.get_integration_credentials("hubspot"),
            Some(credentials)
        );
    }

    #[test]
    fn test_save_rejects_empty_arguments() {
        let (store, registry) = registry();

        assert!(!registry.save_integration("", &json!({"access_token": "t"})));
        assert!(!registry.save_integration("Notion", &Value::Null));
        assert!(!registry.save_integration("Notion", &json!("")));

        assert!(store.is_empty());
        assert_eq!(registry.revision(), 0);
    }

    #[test]
    fn test_save_writes_lowercase_key_and_pointer() {
        let (store, registry) = registry();
        registry.save_integration("HubSpot", &json!({"access_token": "t1"}));

        let table: ConnectionTable =
            serde_json::from_str(&store.get_item(ALL_INTEGRATIONS_KEY).unwrap().unwrap()).unwrap();
        assert!(table.contains_key("hubspot"));
        assert_eq!(table["hubspot"].provider_type, "HubSpot");

        let current = registry.current_integration().unwrap();
        assert_eq!(current.provider_type, "HubSpot");
    }

    #[test]
    fn test_save_twice_keeps_single_entry() {
        let (_, registry) = registry();
        let credentials = json!({"access_token": "t1"});
        registry.save_integration("Notion", &credentials);
        let first = registry.get_all_integrations();

        registry.save_integration("Notion", &credentials);

        assert_eq!(registry.get_all_integrations(), first);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn test_remove_clears_entry_and_pointer() {
        let (store, registry) = registry();
        registry.save_integration("HubSpot", &json!({"access_token": "t1"}));

        assert!(registry.remove_integration("hubspot"));

        assert!(!registry.is_integration_connected("HubSpot"));
        assert!(store.get_item(ALL_INTEGRATIONS_KEY).unwrap().is_none());
        assert!(store.get_item(CURRENT_INTEGRATION_KEY).unwrap().is_none());
    }

    #[test]
    fn test_remove_keeps_pointer_for_other_provider() {
        let (_, registry) = registry();
        registry.save_integration("HubSpot", &json!({"access_token": "t1"}));
        registry.save_integration("Notion", &json!({"access_token": "t2"}));

        registry.remove_integration("HubSpot");

        assert_eq!(
            registry.current_integration().unwrap().provider_type,
            "Notion"
        );
    }

    #[test]
    fn test_remove_rejects_empty_type() {
        let (_, registry) = registry();
        assert!(!registry.remove_integration(""));
    }

    #[test]
    fn test_remove_drops_mixed_case_keys() {
        let (store, registry) = registry();
        store
            .set_item(
                ALL_INTEGRATIONS_KEY,
                r#"{"HubSpot":{"type":"HubSpot","credentials":{"access_token":"old"}}}"#,
            )
            .unwrap();
        assert!(registry.is_integration_connected("hubspot"));

        registry.remove_integration("HUBSPOT");

        assert!(!registry.is_integration_connected("HubSpot"));
    }

    #[test]
    fn test_pointer_fallback_when_no_table() {
        let (store, registry) = registry();
        store
            .set_item(
                CURRENT_INTEGRATION_KEY,
                r#"{"type":"Airtable","credentials":{"access_token":"a"}}"#,
            )
            .unwrap();

        let table = registry.get_all_integrations();
        assert_eq!(table.len(), 1);
        assert_eq!(table["airtable"].provider_type, "Airtable");
        assert!(registry.is_integration_connected("airtable"));
        assert_eq!(
            registry.get_integration_credentials("AIRTABLE"),
            Some(json!({"access_token": "a"}))
        );
    }

    #[test]
    fn test_incomplete_pointer_is_ignored() {
        let (store, registry) = registry();
        store.set_item(CURRENT_INTEGRATION_KEY, "{}").unwrap();

        assert!(registry.get_all_integrations().is_empty());
        assert!(registry.current_integration().is_none());
        assert!(!registry.is_integration_connected("Notion"));
    }

    #[test]
    fn test_malformed_table_is_empty() {
        let (store, registry) = registry();
        store.set_item(ALL_INTEGRATIONS_KEY, "{broken").unwrap();

        assert!(registry.get_all_integrations().is_empty());
        assert!(registry.get_integration_credentials("HubSpot").is_none());
        assert!(!registry.is_integration_connected("HubSpot"));
    }

    #[test]
    fn test_save_replaces_malformed_table() {
        let (store, registry) = registry();
        store.set_item(ALL_INTEGRATIONS_KEY, "{broken").unwrap();

        assert!(registry.save_integration("HubSpot", &json!({"access_token": "t"})));

        assert_eq!(registry.get_all_integrations().len(), 1);
        assert!(registry.is_integration_connected("HubSpot"));
    }

    #[test]
    fn test_malformed_table_still_checks_pointer() {
        let (store, registry) = registry();
        store.set_item(ALL_INTEGRATIONS_KEY, "{broken").unwrap();
        store
            .set_item(
                CURRENT_INTEGRATION_KEY,
                r#"{"type":"Notion","credentials":{"access_token":"n"}}"#,
            )
            .unwrap();

        assert!(registry.is_integration_connected("notion"));
    }

    #[test]
    fn test_is_connected_has_no_side_effects() {
        let (store, registry) = registry();
        registry.save_integration("Notion", &json!({"access_token": "t"}));
        let before = store.get_item(ALL_INTEGRATIONS_KEY).unwrap();
        let revision = registry.revision();

        for _ in 0..10 {
            assert!(registry.is_integration_connected("Notion"));
        }

        assert_eq!(store.get_item(ALL_INTEGRATIONS_KEY).unwrap(), before);
        assert_eq!(registry.revision(), revision);
    }

    #[test]
    fn test_update_integration_sets_pointer() {
        let (_, registry) = registry();
        registry.update_integration("HubSpot", &json!({"access_token": "t1"}), true);
        registry.update_integration("Notion", &json!({"access_token": "t2"}), true);

        assert_eq!(
            registry.current_integration().unwrap().provider_type,
            "Notion"
        );
        assert_eq!(registry.get_all_integrations().len(), 2);
    }

    #[test]
    fn test_update_integration_without_set_current_converges() {
        let (_, registry) = registry();
        registry.update_integration("Airtable", &json!({"access_token": "a"}), false);

        let current = registry.current_integration().unwrap();
        assert_eq!(current.provider_type, "Airtable");
        assert_eq!(current.credentials, json!({"access_token": "a"}));
    }

    #[test]
    fn test_update_integration_rejects_empty_credentials() {
        let (_, registry) = registry();
        assert!(!registry.update_integration("Notion", &json!(false), true));
        assert!(registry.get_all_integrations().is_empty());
    }

    #[test]
    fn test_credentials_equality_whitelist() {
        assert!(IntegrationRegistry::are_credentials_equal(
            &json!({"access_token": "a"}),
            &json!({"access_token": "a", "extra": "x"})
        ));
        assert!(!IntegrationRegistry::are_credentials_equal(
            &json!({"access_token": "a"}),
            &json!({"access_token": "b"})
        ));
        assert!(!IntegrationRegistry::are_credentials_equal(
            &json!({"access_token": "a"}),
            &json!({"access_token": "a", "refresh_token": "r"})
        ));
        assert!(IntegrationRegistry::are_credentials_equal(
            &json!({"id": 42, "token": null}),
            &json!({"id": 42})
        ));
    }

    #[test]
    fn test_credentials_equality_parses_strings() {
        assert!(IntegrationRegistry::are_credentials_equal(
            &json!(r#"{"access_token":"a"}"#),
            &json!({"access_token": "a"})
        ));
        assert!(!IntegrationRegistry::are_credentials_equal(
            &json!("not json"),
            &json!({"access_token": "a"})
        ));
    }

    #[test]
    fn test_credentials_equality_rejects_empty() {
        assert!(!IntegrationRegistry::are_credentials_equal(
            &Value::Null,
            &json!({"access_token": "a"})
        ));
        assert!(!IntegrationRegistry::are_credentials_equal(
            &json!({"access_token": "a"}),
            &json!("")
        ));
    }

    #[test]
    fn test_has_matching_credentials() {
        let (_, registry) = registry();
        registry.save_integration("HubSpot", &json!({"access_token": "t1", "expires_in": 10}));

        assert!(registry.has_matching_credentials("hubspot", &json!({"access_token": "t1"})));
        assert!(!registry.has_matching_credentials("HubSpot", &json!({"access_token": "t2"})));
        assert!(!registry.has_matching_credentials("Notion", &json!({"access_token": "t1"})));
        assert!(!registry.has_matching_credentials("", &json!({"access_token": "t1"})));
    }

    #[test]
    fn test_clear_current_keeps_table() {
        let (_, registry) = registry();
        registry.save_integration("HubSpot", &json!({"access_token": "t1"}));

        assert!(registry.clear_current());

        assert!(registry.current_integration().is_none());
        assert!(registry.is_integration_connected("HubSpot"));
    }

    #[test]
    fn test_session_state_round_trip() {
        let (store, registry) = registry();
        let state = SessionState {
            user: Some("TestUser".to_string()),
            org: Some("TestOrg".to_string()),
            current_type: Some("Notion".to_string()),
        };

        assert!(registry.save_session_state(&state));
        assert_eq!(registry.session_state(), state);

        registry.save_session_state(&SessionState {
            current_type: None,
            ..state
        });
        assert!(store.get_item(CURRENT_TYPE_KEY).unwrap().is_none());
    }

    #[test]
    fn test_session_state_treats_null_literal_as_missing() {
        let (store, registry) = registry();
        store.set_item(CURRENT_TYPE_KEY, "null").unwrap();

        assert!(registry.session_state().current_type.is_none());
    }

    #[test]
    fn test_non_ascii_type_survives_pointer_move() {
        let (_, registry) = registry();
        registry.save_integration("Ärzte", &json!({"access_token": "a"}));
        registry.save_integration("Notion", &json!({"access_token": "n"}));

        assert_eq!(
            registry.get_integration_credentials("Ärzte"),
            Some(json!({"access_token": "a"}))
        );
        assert!(registry.is_integration_connected("ÄRZTE"));
        assert!(registry.has_matching_credentials("ärzte", &json!({"access_token": "a"})));

        assert!(registry.remove_integration("ÄRZTE"));
        assert!(!registry.is_integration_connected("Ärzte"));
        assert!(registry.is_integration_connected("Notion"));
    }

    #[test]
    fn test_off_shape_entry_keeps_siblings() {
        let (store, registry) = registry();
        store
            .set_item(
                ALL_INTEGRATIONS_KEY,
                r#"{"hubspot":{"type":"HubSpot","credentials":{"access_token":"h"}},"notion":null,"airtable":{"type":7}}"#,
            )
            .unwrap();

        assert!(registry.is_integration_connected("HubSpot"));
        assert_eq!(registry.get_all_integrations().len(), 1);

        assert!(registry.save_integration("Airtable", &json!({"access_token": "a"})));

        let table = registry.get_all_integrations();
        assert_eq!(table.len(), 2);
        assert_eq!(table["hubspot"].credentials, json!({"access_token": "h"}));
        assert!(registry.is_integration_connected("Airtable"));
    }

    /// Store whose current-pointer removal always fails.
    struct StickyPointerStore {
        inner: MemoryStore,
    }

    impl CredentialStore for StickyPointerStore {
        fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> StoreResult<()> {
            if key == CURRENT_INTEGRATION_KEY {
                return Err(crate::store::StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only",
                )));
            }
            self.inner.remove_item(key)
        }
    }

    #[test]
    fn test_remove_reports_failure_when_pointer_sticks() {
        let registry = IntegrationRegistry::new(Arc::new(StickyPointerStore {
            inner: MemoryStore::new(),
        }));
        registry.save_integration("HubSpot", &json!({"access_token": "t"}));

        assert!(!registry.remove_integration("HubSpot"));
    }

    #[test]
    fn test_remove_succeeds_when_pointer_is_elsewhere() {
        let registry = IntegrationRegistry::new(Arc::new(StickyPointerStore {
            inner: MemoryStore::new(),
        }));
        registry.save_integration("HubSpot", &json!({"access_token": "t"}));
        registry.save_integration("Notion", &json!({"access_token": "n"}));

        assert!(registry.remove_integration("HubSpot"));
        assert!(!registry.is_integration_connected("HubSpot"));
    }

    #[test]
    fn test_writes_bump_revision() {
        let (_, registry) = registry();
        let mut changes = registry.subscribe();

        registry.save_integration("Notion", &json!({"access_token": "t"}));
        assert!(changes.has_changed().unwrap());
        assert_eq!(*changes.borrow_and_update(), 1);

        registry.remove_integration("Notion");
        assert_eq!(*changes.borrow_and_update(), 2);
    }
}

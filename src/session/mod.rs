//! Integration session controller.
//!
//! The controller tracks which provider the user is configuring, receives
//! credential events from connectors, routes them into the registry and
//! emits at most one success notification per provider while the session
//! identity stays the same.
//!
//! Dedup rules:
//! - providers already connected when the controller starts count as
//!   notified, so state re-derived from storage never toasts;
//! - changing the user or organization clears the processed set;
//! - disconnecting a provider drops it from the set, so reconnecting it
//!   notifies again.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::connector::{ConnectorError, CredentialEvent};
use crate::notification::Notification;
use crate::provider::ProviderKind;
use crate::registry::{is_present, CredentialRecord, IntegrationRegistry, SessionState};

/// Default delay between a success notification and the success callback.
pub const DEFAULT_SUCCESS_DELAY: Duration = Duration::from_millis(1000);

/// Callback run after a provider connected for the first time.
pub type SuccessCallback = Arc<dyn Fn(ProviderKind) + Send + Sync>;

/// Orchestrates connectors, notifications and disconnects for one session.
pub struct SessionController {
    registry: Arc<IntegrationRegistry>,
    user: Option<String>,
    org: Option<String>,
    current_type: Option<ProviderKind>,
    current: Option<CredentialRecord>,
    processed: HashSet<ProviderKind>,
    notifications: mpsc::UnboundedSender<Notification>,
    on_success: Option<SuccessCallback>,
    success_delay: Duration,
}

impl SessionController {
    /// Create a controller, restoring the persisted session fields.
    pub fn new(
        registry: Arc<IntegrationRegistry>,
        notifications: mpsc::UnboundedSender<Notification>,
    ) -> Self {
        let state = registry.session_state();
        let current_type = state
            .current_type
            .as_deref()
            .and_then(|name| name.parse().ok());
        let processed = ProviderKind::ALL
            .into_iter()
            .filter(|kind| registry.is_integration_connected(kind.display_name()))
            .collect();
        let current = registry.current_integration();

        Self {
            registry,
            user: state.user,
            org: state.org,
            current_type,
            current,
            processed,
            notifications,
            on_success: None,
            success_delay: DEFAULT_SUCCESS_DELAY,
        }
    }

    /// Run `callback` after each first-time success.
    pub fn with_success_callback(mut self, callback: SuccessCallback) -> Self {
        self.on_success = Some(callback);
        self
    }

    /// Set the delay before the success callback runs.
    pub fn with_success_delay(mut self, delay: Duration) -> Self {
        self.success_delay = delay;
        self
    }

    /// User identifier, if set.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Organization identifier, if set.
    pub fn org(&self) -> Option<&str> {
        self.org.as_deref()
    }

    /// Provider currently being configured.
    pub fn current_type(&self) -> Option<ProviderKind> {
        self.current_type
    }

    /// Most recently written record.
    pub fn current_record(&self) -> Option<&CredentialRecord> {
        self.current.as_ref()
    }

    /// Returns true if a success notification already fired for `kind`.
    pub fn has_notified(&self, kind: ProviderKind) -> bool {
        self.processed.contains(&kind)
    }

    /// Set the session identity. A change clears the processed set.
    pub fn set_identity(&mut self, user: impl Into<String>, org: impl Into<String>) {
        let user = Some(user.into());
        let org = Some(org.into());
        if user != self.user || org != self.org {
            tracing::debug!(user = ?user, org = ?org, "Session identity changed");
            self.processed.clear();
        }
        self.user = user;
        self.org = org;
        self.persist();
    }

    /// Select the provider being configured.
    ///
    /// Selecting a provider that is already connected is allowed; a warning
    /// is emitted and returned.
    pub fn select_provider(&mut self, kind: Option<ProviderKind>) -> Option<Notification> {
        self.current_type = kind;
        self.persist();

        let kind = kind?;
        if !self.registry.is_integration_connected(kind.display_name()) {
            return None;
        }

        let warning = Notification::already_connected(kind);
        self.notify(warning.clone());
        Some(warning)
    }

    /// Route newly written credentials through the registry.
    ///
    /// Returns true if this produced a success notification.
    pub fn record_credentials(&mut self, kind: ProviderKind, credentials: Value) -> bool {
        if !is_present(&credentials) {
            return false;
        }

        if !self
            .registry
            .update_integration(kind.display_name(), &credentials, true)
        {
            tracing::warn!(provider = %kind, "Could not store integration credentials");
        }
        self.current = Some(CredentialRecord::new(kind.display_name(), credentials));

        if !self.processed.insert(kind) {
            tracing::debug!(provider = %kind, "Success already notified, updated silently");
            return false;
        }

        self.notify(Notification::connected(kind));
        self.schedule_success(kind);
        true
    }

    /// Handle one connector event.
    pub fn handle_event(&mut self, event: CredentialEvent) -> bool {
        self.record_credentials(event.provider, event.credentials)
    }

    /// Report a failed connect attempt to the user.
    pub fn report_failure(&self, kind: ProviderKind, error: &ConnectorError) {
        if matches!(error, ConnectorError::Busy(_)) {
            return;
        }
        self.notify(Notification::failed(kind, error.to_string()));
    }

    /// Disconnect the provider currently being configured.
    pub fn disconnect(&mut self) -> bool {
        let kind = self.current_type.or_else(|| {
            self.current
                .as_ref()
                .and_then(|record| record.provider_type.parse().ok())
        });
        match kind {
            Some(kind) => self.disconnect_provider(kind),
            None => false,
        }
    }

    /// Remove a provider's credentials and clear the local selection.
    pub fn disconnect_provider(&mut self, kind: ProviderKind) -> bool {
        if !self.registry.remove_integration(kind.display_name()) {
            return false;
        }

        self.processed.remove(&kind);
        if self
            .current
            .as_ref()
            .is_some_and(|record| record.matches(kind.display_name()))
        {
            self.current = None;
        }
        if self.current_type == Some(kind) {
            self.current_type = None;
            self.persist();
        }

        tracing::info!(provider = %kind, "Integration disconnected");
        self.notify(Notification::disconnected(kind));
        true
    }

    /// Consume connector events until every sender is gone.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<CredentialEvent>) -> Self {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        self
    }

    fn notify(&self, notification: Notification) {
        if self.notifications.send(notification).is_err() {
            tracing::debug!("Notification receiver dropped");
        }
    }

    fn schedule_success(&self, kind: ProviderKind) {
        let Some(callback) = self.on_success.clone() else {
            return;
        };

        let delay = self.success_delay;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    callback(kind);
                });
            }
            Err(_) => callback(kind),
        }
    }

    fn persist(&self) {
        let state = SessionState {
            user: self.user.clone(),
            org: self.org.clone(),
            current_type: self.current_type.map(|kind| kind.display_name().to_string()),
        };
        self.registry.save_session_state(&state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Mutex;

    fn controller() -> (
        Arc<IntegrationRegistry>,
        SessionController,
        mpsc::UnboundedReceiver<Notification>,
    ) {
        let registry = Arc::new(IntegrationRegistry::new(Arc::new(MemoryStore::new())));
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = SessionController::new(registry.clone(), tx);
        (registry, controller, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(notification) = rx.try_recv() {
            out.push(notification);
        }
        out
    }

    #[test]
    fn test_duplicate_success_notifies_once() {
        let (registry, mut controller, mut rx) = controller();
        let credentials = json!({"access_token": "t1"});

        assert!(controller.record_credentials(ProviderKind::HubSpot, credentials.clone()));
        assert!(!controller.record_credentials(ProviderKind::HubSpot, credentials));

        assert_eq!(drain(&mut rx), vec![Notification::connected(ProviderKind::HubSpot)]);
        assert!(registry.is_integration_connected("HubSpot"));
    }

    #[test]
    fn test_empty_credentials_ignored() {
        let (registry, mut controller, mut rx) = controller();

        assert!(!controller.record_credentials(ProviderKind::Notion, Value::Null));

        assert!(drain(&mut rx).is_empty());
        assert!(!registry.is_integration_connected("Notion"));
    }

    #[test]
    fn test_stored_providers_are_seeded() {
        let registry = Arc::new(IntegrationRegistry::new(Arc::new(MemoryStore::new())));
        registry.save_integration("Notion", &json!({"access_token": "n"}));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut controller = SessionController::new(registry, tx);

        assert!(controller.has_notified(ProviderKind::Notion));
        assert!(!controller.record_credentials(ProviderKind::Notion, json!({"access_token": "n"})));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_identity_change_clears_processed() {
        let (_, mut controller, mut rx) = controller();
        controller.set_identity("TestUser", "TestOrg");
        controller.record_credentials(ProviderKind::Airtable, json!({"access_token": "a"}));

        controller.set_identity("TestUser", "TestOrg");
        assert!(controller.has_notified(ProviderKind::Airtable));

        controller.set_identity("OtherUser", "TestOrg");
        assert!(!controller.has_notified(ProviderKind::Airtable));

        assert!(controller.record_credentials(ProviderKind::Airtable, json!({"access_token": "a"})));
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[test]
    fn test_select_connected_provider_warns() {
        let (registry, mut controller, mut rx) = controller();
        registry.save_integration("HubSpot", &json!({"access_token": "t"}));

        assert!(controller.select_provider(Some(ProviderKind::Notion)).is_none());
        let warning = controller.select_provider(Some(ProviderKind::HubSpot));

        assert_eq!(warning, Some(Notification::already_connected(ProviderKind::HubSpot)));
        assert_eq!(controller.current_type(), Some(ProviderKind::HubSpot));
        assert_eq!(
            registry.session_state().current_type.as_deref(),
            Some("HubSpot")
        );
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_disconnect_then_reconnect_notifies_again() {
        let (registry, mut controller, mut rx) = controller();
        controller.select_provider(Some(ProviderKind::Notion));
        controller.record_credentials(ProviderKind::Notion, json!({"access_token": "n"}));

        assert!(controller.disconnect());

        assert!(!registry.is_integration_connected("Notion"));
        assert!(controller.current_type().is_none());
        assert!(controller.current_record().is_none());
        assert!(!controller.has_notified(ProviderKind::Notion));

        assert!(controller.record_credentials(ProviderKind::Notion, json!({"access_token": "n"})));
        assert_eq!(
            drain(&mut rx),
            vec![
                Notification::connected(ProviderKind::Notion),
                Notification::disconnected(ProviderKind::Notion),
                Notification::connected(ProviderKind::Notion),
            ]
        );
    }

    #[test]
    fn test_disconnect_without_selection() {
        let (_, mut controller, _rx) = controller();
        assert!(!controller.disconnect());
    }

    #[test]
    fn test_report_failure_skips_busy() {
        let (_, controller, mut rx) = controller();
        controller.report_failure(ProviderKind::HubSpot, &ConnectorError::Busy(ProviderKind::HubSpot));
        controller.report_failure(
            ProviderKind::HubSpot,
            &ConnectorError::Persist(ProviderKind::HubSpot),
        );

        assert_eq!(
            drain(&mut rx),
            vec![Notification::failed(
                ProviderKind::HubSpot,
                "Failed to store HubSpot credentials"
            )]
        );
    }

    #[test]
    fn test_success_callback_without_runtime_runs_inline() {
        let (_, controller, _rx) = controller();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut controller = controller.with_success_callback(Arc::new(move |kind| {
            sink.lock().unwrap().push(kind);
        }));

        controller.record_credentials(ProviderKind::HubSpot, json!({"access_token": "t"}));

        assert_eq!(*seen.lock().unwrap(), vec![ProviderKind::HubSpot]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_callback_waits_for_delay() {
        let (_, controller, _rx) = controller();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let mut controller = controller
            .with_success_delay(Duration::from_millis(1000))
            .with_success_callback(Arc::new(move |kind| {
                let _ = done_tx.send(kind);
            }));

        controller.record_credentials(ProviderKind::Notion, json!({"access_token": "n"}));
        tokio::task::yield_now().await;
        assert!(done_rx.try_recv().is_err());

        tokio::time::advance(Duration::from_millis(1001)).await;
        assert_eq!(done_rx.recv().await, Some(ProviderKind::Notion));
    }

    #[tokio::test]
    async fn test_run_consumes_events() {
        let (_, controller, mut rx) = controller();
        let (tx, events) = mpsc::unbounded_channel();
        for _ in 0..2 {
            tx.send(CredentialEvent {
                provider: ProviderKind::Airtable,
                credentials: json!({"access_token": "a"}),
            })
            .unwrap();
        }
        drop(tx);

        let controller = controller.run(events).await;

        assert!(controller.has_notified(ProviderKind::Airtable));
        assert_eq!(drain(&mut rx).len(), 1);
    }
}

//! Provider connector: the per-provider authorization handshake.
//!
//! A connector moves through `Idle -> Connecting -> Connected`. Connecting
//! requests an authorization URL, opens it in a window, and polls that
//! window until it closes. Closing the window for any reason leads to a
//! credentials fetch; non-empty credentials are written through the
//! registry and forwarded to the session controller.
//!
//! Within one connector the order is always authorize, then fetch, then
//! write, enforced by sequential awaits. Connectors for different providers
//! are independent and each owns its own poll timer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::provider::{BackendError, IntegrationBackend, ProviderKind};
use crate::registry::IntegrationRegistry;
use crate::window::{WindowOpener, WindowRequest};

/// Default interval between window liveness checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// State of a provider connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectorState {
    /// No authorization in progress.
    #[default]
    Idle,
    /// Waiting for the authorization window to close.
    Connecting,
    /// Credentials were issued and stored.
    Connected,
}

/// Result of a connect request that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectOutcome {
    /// The provider was already connected; nothing happened.
    AlreadyConnected,
    /// Credentials were issued and stored.
    Connected(Value),
    /// The window closed but the backend has no credentials yet.
    NotAuthorized,
    /// The connector was shut down while waiting.
    Cancelled,
}

/// Errors from a connect attempt. The connector is back to `Idle` after
/// any of these, except `Busy` which leaves the running attempt untouched.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Requesting the authorization URL failed.
    #[error("{0}")]
    Authorize(#[source] BackendError),

    /// Fetching issued credentials failed.
    #[error("{0}")]
    Credentials(#[source] BackendError),

    /// The registry refused to store the issued credentials.
    #[error("Failed to store {0} credentials")]
    Persist(ProviderKind),

    /// A connect attempt is already in progress.
    #[error("{0} authorization is already in progress")]
    Busy(ProviderKind),
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// Credentials arriving from a completed handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialEvent {
    /// Provider the credentials belong to
    pub provider: ProviderKind,
    /// Issued credential blob
    pub credentials: Value,
}

/// Drives the authorization handshake for one provider.
pub struct ProviderConnector {
    kind: ProviderKind,
    registry: Arc<IntegrationRegistry>,
    backend: Arc<dyn IntegrationBackend>,
    opener: Arc<dyn WindowOpener>,
    poll_interval: Duration,
    state: RwLock<ConnectorState>,
    /// Set on shutdown; an in-flight poll stops at its next tick.
    stop_flag: Arc<AtomicBool>,
    events: Option<mpsc::UnboundedSender<CredentialEvent>>,
}

impl ProviderConnector {
    /// Create a connector. Its initial state is derived from the registry.
    pub fn new(
        kind: ProviderKind,
        registry: Arc<IntegrationRegistry>,
        backend: Arc<dyn IntegrationBackend>,
        opener: Arc<dyn WindowOpener>,
    ) -> Self {
        let connector = Self {
            kind,
            registry,
            backend,
            opener,
            poll_interval: DEFAULT_POLL_INTERVAL,
            state: RwLock::new(ConnectorState::Idle),
            stop_flag: Arc::new(AtomicBool::new(false)),
            events: None,
        };
        connector.sync_from_registry();
        connector
    }

    /// Set the window liveness poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Forward completed handshakes to a session controller.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<CredentialEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// The provider this connector drives.
    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Current state.
    pub fn state(&self) -> ConnectorState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns true once connected.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectorState::Connected
    }

    fn set_state(&self, state: ConnectorState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Move to `Connecting` unless connected or already connecting.
    fn begin(&self) -> ConnectorResult<bool> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        match *state {
            ConnectorState::Connected => Ok(false),
            ConnectorState::Connecting => Err(ConnectorError::Busy(self.kind)),
            ConnectorState::Idle => {
                *state = ConnectorState::Connecting;
                Ok(true)
            }
        }
    }

    /// Re-derive the connected state from the registry.
    ///
    /// An in-flight `Connecting` is left alone.
    pub fn sync_from_registry(&self) -> ConnectorState {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if *state != ConnectorState::Connecting {
            *state = if self
                .registry
                .is_integration_connected(self.kind.display_name())
            {
                ConnectorState::Connected
            } else {
                ConnectorState::Idle
            };
        }
        *state
    }

    /// Return to `Idle` after an explicit disconnect.
    pub fn reset(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if *state == ConnectorState::Connected {
            *state = ConnectorState::Idle;
        }
    }

    /// Stop any in-flight poll. Call when the owner goes away.
    pub fn shutdown(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    fn is_stopped(&self) -> bool {
        self.stop_flag.load(Ordering::SeqCst)
    }

    /// Run the authorization handshake.
    ///
    /// A connected provider is never reconnected here; disconnect first.
    /// No step is retried: after a failure the user starts over.
    pub async fn connect(&self, user: &str, org: &str) -> ConnectorResult<ConnectOutcome> {
        if !self.begin()? {
            tracing::debug!(provider = %self.kind, "Already connected, ignoring connect request");
            return Ok(ConnectOutcome::AlreadyConnected);
        }
        self.stop_flag.store(false, Ordering::SeqCst);

        let auth_url = match self.backend.authorize(self.kind, user, org).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(provider = %self.kind, error = %e, "Authorization request failed");
                self.set_state(ConnectorState::Idle);
                return Err(ConnectorError::Authorize(e));
            }
        };

        if !self.wait_for_window(&auth_url).await {
            tracing::info!(provider = %self.kind, "Authorization cancelled");
            self.set_state(ConnectorState::Idle);
            return Ok(ConnectOutcome::Cancelled);
        }

        self.on_window_closed(user, org).await
    }

    /// Open the window and poll until it closes. Returns false if the
    /// connector was shut down first.
    async fn wait_for_window(&self, auth_url: &str) -> bool {
        let request = WindowRequest::new(auth_url, format!("{} Authorization", self.kind));
        let window = match self.opener.open(&request) {
            Ok(window) => window,
            Err(e) => {
                // A blocked window is handled like one closed right away.
                tracing::warn!(provider = %self.kind, error = %e, "Could not open authorization window");
                return !self.is_stopped();
            }
        };

        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            if self.is_stopped() {
                return false;
            }
            if window.is_closed() {
                tracing::debug!(provider = %self.kind, "Authorization window closed");
                return true;
            }
        }
    }

    async fn on_window_closed(&self, user: &str, org: &str) -> ConnectorResult<ConnectOutcome> {
        let credentials = match self.backend.credentials(self.kind, user, org).await {
            Ok(credentials) => credentials,
            Err(e) => {
                tracing::warn!(provider = %self.kind, error = %e, "Credentials request failed");
                self.set_state(ConnectorState::Idle);
                return Err(ConnectorError::Credentials(e));
            }
        };

        let Some(credentials) = credentials else {
            tracing::info!(provider = %self.kind, "No credentials issued, staying idle");
            self.set_state(ConnectorState::Idle);
            return Ok(ConnectOutcome::NotAuthorized);
        };

        if self.is_stopped() {
            self.set_state(ConnectorState::Idle);
            return Ok(ConnectOutcome::Cancelled);
        }

        if !self
            .registry
            .update_integration(self.kind.display_name(), &credentials, true)
        {
            self.set_state(ConnectorState::Idle);
            return Err(ConnectorError::Persist(self.kind));
        }

        self.set_state(ConnectorState::Connected);
        tracing::info!(provider = %self.kind, "Integration connected");

        if let Some(events) = &self.events {
            let event = CredentialEvent {
                provider: self.kind,
                credentials: credentials.clone(),
            };
            if events.send(event).is_err() {
                tracing::debug!(provider = %self.kind, "Session controller is gone, event dropped");
            }
        }

        Ok(ConnectOutcome::Connected(credentials))
    }
}

impl Drop for ProviderConnector {
    fn drop(&mut self) {
        self.shutdown();
    }
}

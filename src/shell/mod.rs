//! Application shell: periodic connectivity re-derivation and view gating.
//!
//! The shell shows the dashboard while at least one provider is connected
//! and the landing view otherwise. Connectivity is re-checked on a fixed
//! interval while the dashboard is shown, so losing every connection drops
//! back to the landing view on the next tick rather than instantly.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::provider::ProviderKind;
use crate::registry::IntegrationRegistry;

/// Default interval between connectivity checks.
pub const DEFAULT_SHELL_INTERVAL: Duration = Duration::from_secs(2);

/// Per-provider connected flags.
pub type ConnectionFlags = BTreeMap<ProviderKind, bool>;

/// Top-level view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    /// No provider connected.
    #[default]
    Landing,
    /// At least one provider connected.
    Dashboard,
}

/// Changes published by a running shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellEvent {
    /// The top-level view flipped.
    ViewChanged(View),
    /// The connected flags changed.
    FlagsChanged(ConnectionFlags),
}

/// Gates the top-level view on registry connectivity.
pub struct ApplicationShell {
    registry: Arc<IntegrationRegistry>,
    flags: ConnectionFlags,
    authenticated: bool,
    /// Connectivity as last observed from registry changes.
    observed: bool,
    /// Also re-check connectivity on the interval while on the landing view.
    poll_landing: bool,
    interval: Duration,
}

impl ApplicationShell {
    /// Create an unmounted shell showing the landing view.
    pub fn new(registry: Arc<IntegrationRegistry>) -> Self {
        Self {
            registry,
            flags: ProviderKind::ALL.into_iter().map(|kind| (kind, false)).collect(),
            authenticated: false,
            observed: false,
            poll_landing: false,
            interval: DEFAULT_SHELL_INTERVAL,
        }
    }

    /// Set the connectivity check interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Poll the registry on the landing view as well.
    ///
    /// Needed when another process may write the store: those writes never
    /// reach this registry's change channel.
    pub fn with_landing_poll(mut self, enabled: bool) -> Self {
        self.poll_landing = enabled;
        self
    }

    /// Initial connectivity check.
    pub fn mount(&mut self) -> View {
        self.refresh();
        self.observed = self.authenticated;
        tracing::debug!(view = ?self.view(), "Shell mounted");
        self.view()
    }

    /// Re-query every provider and derive the authenticated flag.
    pub fn refresh(&mut self) -> &ConnectionFlags {
        self.flags = self.query_flags();
        self.authenticated = self.flags.values().any(|connected| *connected);
        &self.flags
    }

    fn query_flags(&self) -> ConnectionFlags {
        ProviderKind::ALL
            .into_iter()
            .map(|kind| (kind, self.registry.is_integration_connected(kind.display_name())))
            .collect()
    }

    /// Periodic check. Only runs while the dashboard is shown.
    ///
    /// Returns the new view if it changed.
    pub fn tick(&mut self) -> Option<View> {
        if !self.authenticated {
            return None;
        }

        let before = self.view();
        self.refresh();
        let after = self.view();
        if after != before {
            tracing::info!("No provider connected any more, returning to landing view");
            return Some(after);
        }
        None
    }

    /// Interval handler: `tick` on the dashboard, and a connectivity
    /// re-check on the landing view when landing polling is enabled.
    pub fn poll(&mut self) -> Option<View> {
        if self.authenticated {
            self.tick()
        } else if self.poll_landing {
            self.on_registry_change()
        } else {
            None
        }
    }

    /// Promote to the dashboard right after a provider connected.
    pub fn on_integration_success(&mut self, kind: ProviderKind) -> Option<View> {
        let before = self.view();
        self.flags.insert(kind, true);
        self.authenticated = true;
        self.observed = true;
        (before != View::Dashboard).then_some(View::Dashboard)
    }

    /// Clear the current pointer and return to the landing view.
    ///
    /// The connection table is kept; providers stay connected.
    pub fn logout(&mut self) -> View {
        self.registry.clear_current();
        self.authenticated = false;
        self.flags.values_mut().for_each(|connected| *connected = false);
        tracing::info!("Logged out");
        View::Landing
    }

    /// Current view.
    pub fn view(&self) -> View {
        if self.authenticated {
            View::Dashboard
        } else {
            View::Landing
        }
    }

    /// Returns true while the dashboard is shown.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Per-provider flags from the last check.
    pub fn flags(&self) -> &ConnectionFlags {
        &self.flags
    }

    /// Handle a registry change. Promotes only when connectivity goes from
    /// none to some, so a logout is not undone by its own write.
    fn on_registry_change(&mut self) -> Option<View> {
        let connected = self.query_flags().values().any(|connected| *connected);
        let rising = connected && !self.observed;
        self.observed = connected;

        if rising && !self.authenticated {
            self.refresh();
            return Some(self.view());
        }
        None
    }

    /// Drive the shell until `shutdown` flips to true or is dropped.
    ///
    /// `successes` carries providers that just connected; they promote
    /// immediately. View and flag changes are published on `events`.
    pub async fn run(
        mut self,
        events: mpsc::UnboundedSender<ShellEvent>,
        mut successes: mpsc::UnboundedReceiver<ProviderKind>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Self {
        let mut changes = self.registry.subscribe();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; mount already did that check.
        ticker.tick().await;

        // Catch writes made between mount and subscribing.
        if let Some(view) = self.on_registry_change() {
            let _ = events.send(ShellEvent::FlagsChanged(self.flags.clone()));
            let _ = events.send(ShellEvent::ViewChanged(view));
        }

        let mut successes_open = true;
        loop {
            let before = self.flags.clone();
            let view = tokio::select! {
                _ = ticker.tick() => self.poll(),
                changed = changes.changed() => match changed {
                    Ok(()) => self.on_registry_change(),
                    Err(_) => break,
                },
                success = successes.recv(), if successes_open => match success {
                    Some(kind) => self.on_integration_success(kind),
                    None => {
                        successes_open = false;
                        None
                    }
                },
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        break;
                    }
                    None
                }
            };

            if self.flags != before {
                let _ = events.send(ShellEvent::FlagsChanged(self.flags.clone()));
            }
            if let Some(view) = view {
                let _ = events.send(ShellEvent::ViewChanged(view));
            }
        }

        tracing::debug!("Shell stopped");
        self
    }
}

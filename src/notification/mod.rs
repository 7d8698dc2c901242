//! User-facing notifications for connection lifecycle events.
//!
//! Notifications are transient, non-blocking messages: a provider was
//! connected, a reconnect would replace existing credentials, a provider
//! was disconnected, or a connect attempt failed.

mod renderer;

pub use renderer::NotificationRenderer;

use crate::provider::ProviderKind;

/// Severity of a notification, used for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Something completed successfully
    Success,
    /// Neutral information
    Info,
    /// Action allowed but worth a second look
    Warning,
    /// An operation failed
    Error,
}

/// A transient message for the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// A provider was connected for the first time in this session.
    Connected {
        /// The provider that was connected.
        provider: ProviderKind,
    },

    /// A provider is already connected; connecting again replaces it.
    AlreadyConnected {
        /// The provider being reconfigured.
        provider: ProviderKind,
    },

    /// A provider was disconnected.
    Disconnected {
        /// The provider that was removed.
        provider: ProviderKind,
    },

    /// A connect attempt failed.
    Failed {
        /// The provider the attempt was for.
        provider: ProviderKind,
        /// Message from the backend or transport.
        message: String,
    },
}

impl Notification {
    /// Creates a new Connected notification.
    pub fn connected(provider: ProviderKind) -> Self {
        Self::Connected { provider }
    }

    /// Creates a new AlreadyConnected notification.
    pub fn already_connected(provider: ProviderKind) -> Self {
        Self::AlreadyConnected { provider }
    }

    /// Creates a new Disconnected notification.
    pub fn disconnected(provider: ProviderKind) -> Self {
        Self::Disconnected { provider }
    }

    /// Creates a new Failed notification.
    pub fn failed(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::Failed {
            provider,
            message: message.into(),
        }
    }

    /// The provider this notification is about.
    pub fn provider(&self) -> ProviderKind {
        match self {
            Self::Connected { provider }
            | Self::AlreadyConnected { provider }
            | Self::Disconnected { provider }
            | Self::Failed { provider, .. } => *provider,
        }
    }

    /// Severity used when rendering.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Connected { .. } => Severity::Success,
            Self::AlreadyConnected { .. } => Severity::Warning,
            Self::Disconnected { .. } => Severity::Info,
            Self::Failed { .. } => Severity::Error,
        }
    }

    /// Returns true for success notifications.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected { provider } => {
                write!(f, "Successfully connected to {}!", provider)
            }
            Self::AlreadyConnected { provider } => {
                write!(
                    f,
                    "You already have a {} integration connected. Connecting a new one will replace it.",
                    provider
                )
            }
            Self::Disconnected { .. } => write!(f, "Integration disconnected successfully"),
            Self::Failed { provider, message } => {
                write!(f, "Could not connect to {}: {}", provider, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connected_notification() {
        let notification = Notification::connected(ProviderKind::HubSpot);
        assert!(notification.is_success());
        assert_eq!(notification.severity(), Severity::Success);
        assert_eq!(notification.provider(), ProviderKind::HubSpot);
    }

    #[test]
    fn test_failed_notification() {
        let notification = Notification::failed(ProviderKind::Notion, "State validation failed");
        assert!(matches!(
            notification,
            Notification::Failed { provider: ProviderKind::Notion, ref message }
                if message == "State validation failed"
        ));
        assert!(!notification.is_success());
        assert_eq!(notification.severity(), Severity::Error);
    }

    #[test]
    fn test_display_connected() {
        let notification = Notification::connected(ProviderKind::Airtable);
        assert_eq!(notification.to_string(), "Successfully connected to Airtable!");
    }

    #[test]
    fn test_display_already_connected() {
        let notification = Notification::already_connected(ProviderKind::HubSpot);
        assert_eq!(
            notification.to_string(),
            "You already have a HubSpot integration connected. Connecting a new one will replace it."
        );
        assert_eq!(notification.severity(), Severity::Warning);
    }

    #[test]
    fn test_display_disconnected() {
        let notification = Notification::disconnected(ProviderKind::Notion);
        assert_eq!(notification.to_string(), "Integration disconnected successfully");
        assert_eq!(notification.severity(), Severity::Info);
    }

    #[test]
    fn test_display_failed() {
        let notification = Notification::failed(ProviderKind::HubSpot, "No credentials found");
        assert_eq!(
            notification.to_string(),
            "Could not connect to HubSpot: No credentials found"
        );
    }
}

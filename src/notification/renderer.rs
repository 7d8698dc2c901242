//! Terminal renderer for notifications.

use owo_colors::OwoColorize;

use super::{Notification, Severity};

/// Renders notifications as single-line terminal toasts.
#[derive(Debug, Clone, Copy)]
pub struct NotificationRenderer {
    /// Whether to emit ANSI colors
    use_color: bool,
}

impl Default for NotificationRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationRenderer {
    /// Creates a renderer with colors enabled.
    pub fn new() -> Self {
        Self { use_color: true }
    }

    /// Enables or disables colors.
    pub fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }

    fn icon(severity: Severity) -> &'static str {
        match severity {
            Severity::Success => "✓",
            Severity::Info => "i",
            Severity::Warning => "!",
            Severity::Error => "✗",
        }
    }

    /// Renders one notification, without a trailing newline.
    pub fn render(&self, notification: &Notification) -> String {
        let severity = notification.severity();
        let line = format!("{} {}", Self::icon(severity), notification);

        if !self.use_color {
            return line;
        }

        let styled = match severity {
            Severity::Success => line.green().to_string(),
            Severity::Info => line.cyan().to_string(),
            Severity::Warning => line.yellow().to_string(),
            Severity::Error => line.red().bold().to_string(),
        };
        styled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderKind;

    #[test]
    fn test_render_plain() {
        let renderer = NotificationRenderer::new().with_color(false);
        let output = renderer.render(&Notification::connected(ProviderKind::Notion));
        assert_eq!(output, "✓ Successfully connected to Notion!");
    }

    #[test]
    fn test_render_plain_error() {
        let renderer = NotificationRenderer::new().with_color(false);
        let output = renderer.render(&Notification::failed(ProviderKind::HubSpot, "boom"));
        assert_eq!(output, "✗ Could not connect to HubSpot: boom");
    }

    #[test]
    fn test_render_colored_contains_ansi() {
        let renderer = NotificationRenderer::new();
        let output = renderer.render(&Notification::disconnected(ProviderKind::Airtable));
        assert!(output.contains("\u{1b}["));
        assert!(output.contains("Integration disconnected successfully"));
    }
}

//! Terminal rendering of connection state.

use owo_colors::{OwoColorize, Rgb};

use crate::provider::ProviderKind;
use crate::shell::{ConnectionFlags, View};

/// Colors used for connection state.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    /// Connected provider - green (34, 197, 94)
    pub connected: Rgb,
    /// Disconnected provider - gray (107, 114, 128)
    pub disconnected: Rgb,
    /// Current pointer marker - cyan (34, 211, 238)
    pub current: Rgb,
    /// Headings - blue (59, 130, 246)
    pub heading: Rgb,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            connected: Rgb(34, 197, 94),
            disconnected: Rgb(107, 114, 128),
            current: Rgb(34, 211, 238),
            heading: Rgb(59, 130, 246),
        }
    }
}

/// Renders the provider table and view banners.
#[derive(Debug, Clone)]
pub struct ConnectionDisplay {
    theme: Theme,
    colors_enabled: bool,
}

impl Default for ConnectionDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionDisplay {
    /// Create a display; colors follow `NO_COLOR`.
    pub fn new() -> Self {
        Self {
            theme: Theme::default(),
            colors_enabled: std::env::var("NO_COLOR").is_err(),
        }
    }

    /// Enable or disable colors.
    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.colors_enabled = enabled;
        self
    }

    /// Returns true if colors are enabled.
    pub fn colors_enabled(&self) -> bool {
        self.colors_enabled
    }

    fn paint(&self, text: &str, color: Rgb) -> String {
        if self.colors_enabled {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    /// One line per provider with its connected flag.
    ///
    /// `current` marks the provider held by the current pointer.
    pub fn render_status(&self, flags: &ConnectionFlags, current: Option<&str>) -> String {
        let mut out = self.paint("Integrations", self.theme.heading);
        out.push('\n');

        for kind in ProviderKind::ALL {
            let connected = flags.get(&kind).copied().unwrap_or(false);
            let (marker, label, color) = if connected {
                ("●", "connected", self.theme.connected)
            } else {
                ("○", "not connected", self.theme.disconnected)
            };

            let mut line = format!(
                "  {} {:<10} {}",
                self.paint(marker, color),
                kind.display_name(),
                self.paint(label, color)
            );
            if current.is_some_and(|name| name.eq_ignore_ascii_case(kind.display_name())) {
                line.push(' ');
                line.push_str(&self.paint("(current)", self.theme.current));
            }
            out.push_str(&line);
            out.push('\n');
        }
        out
    }

    /// Banner for a view change.
    pub fn render_view(&self, view: View) -> String {
        match view {
            View::Dashboard => self.paint(
                "Dashboard: at least one provider is connected",
                self.theme.connected,
            ),
            View::Landing => {
                self.paint("Landing: no provider is connected", self.theme.disconnected)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(connected: &[ProviderKind]) -> ConnectionFlags {
        ProviderKind::ALL
            .into_iter()
            .map(|kind| (kind, connected.contains(&kind)))
            .collect()
    }

    #[test]
    fn test_render_status_plain() {
        let display = ConnectionDisplay::new().with_colors(false);
        let output = display.render_status(&flags(&[ProviderKind::Notion]), Some("Notion"));

        assert!(output.starts_with("Integrations\n"));
        assert!(output.contains("○ HubSpot    not connected\n"));
        assert!(output.contains("● Notion     connected (current)\n"));
        assert!(output.contains("○ Airtable   not connected\n"));
    }

    #[test]
    fn test_render_status_current_is_case_insensitive() {
        let display = ConnectionDisplay::new().with_colors(false);
        let output = display.render_status(&flags(&[ProviderKind::HubSpot]), Some("hubspot"));
        assert!(output.contains("HubSpot    connected (current)"));
    }

    #[test]
    fn test_render_view() {
        let display = ConnectionDisplay::new().with_colors(false);
        assert_eq!(
            display.render_view(View::Landing),
            "Landing: no provider is connected"
        );
    }

    #[test]
    fn test_colored_output() {
        let display = ConnectionDisplay::new().with_colors(true);
        let output = display.render_status(&flags(&[]), None);
        assert!(output.contains("\u{1b}["));
        assert!(display.colors_enabled());
    }
}

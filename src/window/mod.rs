//! Authorization window abstraction.
//!
//! A connector opens the provider's authorization URL in a window and then
//! polls that window for closure. Closure is the only completion signal:
//! success, cancel and a manual close all look the same from here.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Fixed width of the authorization window.
pub const WINDOW_WIDTH: u32 = 600;

/// Fixed height of the authorization window.
pub const WINDOW_HEIGHT: u32 = 600;

/// Errors raised when a window cannot be opened.
#[derive(Debug, Error)]
pub enum WindowError {
    /// The window was blocked or the platform refused to open it.
    #[error("Authorization window blocked: {0}")]
    Blocked(String),

    /// IO error while presenting the window.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for window operations.
pub type WindowResult<T> = Result<T, WindowError>;

/// Request to open an authorization window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRequest {
    /// URL to load in the window
    pub url: String,
    /// Window title, e.g. "Notion Authorization"
    pub title: String,
    /// Window width in pixels
    pub width: u32,
    /// Window height in pixels
    pub height: u32,
}

impl WindowRequest {
    /// Create a request with the fixed authorization window size.
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            width: WINDOW_WIDTH,
            height: WINDOW_HEIGHT,
        }
    }
}

/// An open authorization window.
pub trait AuthWindow: Send + Sync {
    /// Returns true once the window has been closed for any reason.
    fn is_closed(&self) -> bool;
}

/// Opens authorization windows.
pub trait WindowOpener: Send + Sync {
    /// Open a window for the given request.
    fn open(&self, request: &WindowRequest) -> WindowResult<Box<dyn AuthWindow>>;
}

/// A window whose closed state is a shared flag.
///
/// Cloning shares the flag, so one handle can be given to the connector
/// while another is closed from elsewhere.
#[derive(Debug, Clone, Default)]
pub struct FlagWindow {
    closed: Arc<AtomicBool>,
}

impl FlagWindow {
    /// Create an open window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the window as closed.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl AuthWindow for FlagWindow {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Presents the authorization URL on the terminal.
///
/// The window counts as closed once the user presses Enter. The blocking
/// stdin read runs on a dedicated thread so polling is never blocked.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalWindowOpener;

impl TerminalWindowOpener {
    /// Create a terminal window opener.
    pub fn new() -> Self {
        Self
    }
}

impl WindowOpener for TerminalWindowOpener {
    fn open(&self, request: &WindowRequest) -> WindowResult<Box<dyn AuthWindow>> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", request.title)?;
        writeln!(stdout, "  Open this URL to authorize:")?;
        writeln!(stdout, "  {}", request.url)?;
        writeln!(stdout, "  Press Enter when you are done (or to cancel).")?;
        stdout.flush()?;

        let window = FlagWindow::new();
        let handle = window.clone();
        std::thread::Builder::new()
            .name("auth-window".to_string())
            .spawn(move || {
                let mut line = String::new();
                // EOF or a read error also counts as the window going away.
                let _ = io::stdin().lock().read_line(&mut line);
                handle.close();
            })?;

        Ok(Box::new(window))
    }
}

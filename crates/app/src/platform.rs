//! Display server detection and clipboard access
//!
//! Clipboard writes go through arboard first, then `wl-copy` when running
//! under Wayland.

use std::env;

/// Detected display server type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayServer {
    Wayland,
    X11,
    /// Unknown or headless
    Unknown,
}

impl DisplayServer {
    /// Detect the current display server from environment
    pub fn detect() -> Self {
        Self::from_vars(
            env::var_os("WAYLAND_DISPLAY").is_some(),
            env::var_os("DISPLAY").is_some(),
        )
    }

    fn from_vars(wayland: bool, x11: bool) -> Self {
        if wayland {
            DisplayServer::Wayland
        } else if x11 {
            DisplayServer::X11
        } else {
            DisplayServer::Unknown
        }
    }

    pub fn is_wayland(&self) -> bool {
        matches!(self, DisplayServer::Wayland)
    }
}

impl std::fmt::Display for DisplayServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayServer::Wayland => write!(f, "Wayland"),
            DisplayServer::X11 => write!(f, "X11"),
            DisplayServer::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Copy text to the system clipboard. Returns false when every method failed.
pub fn copy_to_clipboard(text: &str) -> bool {
    let server = DisplayServer::detect();
    tracing::debug!(display_server = %server, "Copying to clipboard");

    // arboard covers X11 and most Wayland compositors
    if let Ok(mut clipboard) = arboard::Clipboard::new() {
        if clipboard.set_text(text).is_ok() {
            tracing::debug!("Copied to clipboard via arboard");
            return true;
        }
    }

    if server.is_wayland() && try_wl_copy(text) {
        tracing::debug!("Copied to clipboard via wl-copy");
        return true;
    }

    tracing::warn!(display_server = %server, "All clipboard methods failed");
    false
}

/// Try to copy using wl-copy (Wayland clipboard tool)
fn try_wl_copy(text: &str) -> bool {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let mut child = match Command::new("wl-copy")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(_) => return false,
    };

    if let Some(mut stdin) = child.stdin.take() {
        if stdin.write_all(text.as_bytes()).is_err() {
            return false;
        }
    }

    matches!(child.wait(), Ok(status) if status.success())
}

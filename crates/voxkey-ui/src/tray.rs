//! System tray icon management.
//!
//! On Windows, creates a system tray icon with a context menu using the
//! `tray-icon` crate. The icon color reflects the session state:
//! - Grey: Idle
//! - Red: Recording
//! - Amber: Processing
//! - Orange: Error
//!
//! On non-Windows, provides a stub that only tracks the state in memory.

use voxkey_core::error::Result;
#[cfg(target_os = "windows")]
use voxkey_core::error::VoxkeyError;

/// Visual state of the tray icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayState {
    /// Ready for a hotkey press (grey icon).
    Idle,
    /// Microphone is live (red icon).
    Recording,
    /// Transcribing captured audio (amber icon).
    Processing,
    /// Something went wrong (orange icon).
    Error,
}

impl std::fmt::Display for TrayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrayState::Idle => write!(f, "Idle"),
            TrayState::Recording => write!(f, "Recording"),
            TrayState::Processing => write!(f, "Processing"),
            TrayState::Error => write!(f, "Error"),
        }
    }
}

/// Menu action returned when the user clicks a context menu item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayMenuAction {
    /// Quit the application.
    Quit,
}

/// Manages the system tray icon and its context menu.
pub struct TrayService {
    state: TrayState,
    #[cfg(target_os = "windows")]
    _tray: Option<tray_icon::TrayIcon>,
    #[cfg(target_os = "windows")]
    quit_id: Option<tray_icon::menu::MenuId>,
}

impl TrayService {
    /// Create the tray icon and context menu.
    #[cfg(target_os = "windows")]
    pub fn new(tooltip: &str) -> Result<Self> {
        use tray_icon::menu::{Menu, MenuItem};
        use tray_icon::{Icon, TrayIconBuilder};

        let icon_data = create_icon_rgba(128, 128, 128, 255); // Grey for idle
        let icon = Icon::from_rgba(icon_data, 16, 16)
            .map_err(|e| VoxkeyError::Config(format!("Failed to create tray icon: {}", e)))?;

        let menu = Menu::new();
        let quit_item = MenuItem::new("Quit", true, None);
        let quit_id = quit_item.id().clone();
        let _ = menu.append(&quit_item);

        let tray = TrayIconBuilder::new()
            .with_tooltip(tooltip)
            .with_icon(icon)
            .with_menu(Box::new(menu))
            .build()
            .map_err(|e| VoxkeyError::Config(format!("Failed to create tray icon: {}", e)))?;

        tracing::info!("System tray icon created");

        Ok(Self {
            state: TrayState::Idle,
            _tray: Some(tray),
            quit_id: Some(quit_id),
        })
    }

    /// Stub constructor for non-Windows.
    #[cfg(not(target_os = "windows"))]
    pub fn new(_tooltip: &str) -> Result<Self> {
        tracing::warn!("System tray is only available on Windows");
        Ok(Self {
            state: TrayState::Idle,
        })
    }

    /// Get the current tray state.
    pub fn state(&self) -> TrayState {
        self.state
    }

    /// Update the tray icon to reflect a new state.
    #[cfg(target_os = "windows")]
    pub fn set_state(&mut self, state: TrayState) -> Result<()> {
        use tray_icon::Icon;

        let (r, g, b) = match state {
            TrayState::Idle => (128, 128, 128),      // Grey
            TrayState::Recording => (230, 70, 70),   // Red
            TrayState::Processing => (240, 190, 60), // Amber
            TrayState::Error => (230, 120, 40),      // Orange
        };

        let icon_data = create_icon_rgba(r, g, b, 255);
        let icon = Icon::from_rgba(icon_data, 16, 16)
            .map_err(|e| VoxkeyError::Config(format!("Failed to create icon: {}", e)))?;

        if let Some(ref tray) = self._tray {
            tray.set_icon(Some(icon))
                .map_err(|e| VoxkeyError::Config(format!("Failed to set tray icon: {}", e)))?;
            tray.set_tooltip(Some(format!("Voxkey - {}", state)))
                .map_err(|e| VoxkeyError::Config(format!("Failed to set tooltip: {}", e)))?;
        }

        self.state = state;
        tracing::debug!(state = %state, "Tray icon state updated");
        Ok(())
    }

    /// Stub set_state on non-Windows.
    #[cfg(not(target_os = "windows"))]
    pub fn set_state(&mut self, state: TrayState) -> Result<()> {
        self.state = state;
        Ok(())
    }

    /// Check for menu events.
    ///
    /// Returns `Some(action)` if a menu item was clicked since last check.
    #[cfg(target_os = "windows")]
    pub fn poll_menu_event(&self) -> Option<TrayMenuAction> {
        use tray_icon::menu::MenuEvent;

        if let Ok(event) = MenuEvent::receiver().try_recv() {
            if Some(event.id()) == self.quit_id.as_ref() {
                return Some(TrayMenuAction::Quit);
            }
        }
        None
    }

    /// Stub: always returns None on non-Windows.
    #[cfg(not(target_os = "windows"))]
    pub fn poll_menu_event(&self) -> Option<TrayMenuAction> {
        None
    }
}

/// Create a 16x16 solid-color RGBA icon.
#[cfg(target_os = "windows")]
fn create_icon_rgba(r: u8, g: u8, b: u8, a: u8) -> Vec<u8> {
    let size = 16 * 16;
    let mut data = Vec::with_capacity(size * 4);
    for _ in 0..size {
        data.push(r);
        data.push(g);
        data.push(b);
        data.push(a);
    }
    data
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

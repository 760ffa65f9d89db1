//! Global hotkey registration for dictation toggling.
//!
//! On Windows, uses the `global-hotkey` crate to register a system-wide
//! key combination. The application polls `was_pressed` on a blocking
//! thread and forwards presses as `SessionEvent::HotkeyPressed`.
//!
//! On non-Windows, provides a stub that never reports a press.

use voxkey_core::error::Result;
#[cfg(target_os = "windows")]
use voxkey_core::error::VoxkeyError;

/// Configuration for the dictation hotkey.
#[derive(Debug, Clone)]
pub struct HotkeyConfig {
    /// Key combination string (e.g., "Ctrl+Shift+Space").
    pub key: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            key: "Ctrl+Shift+Space".to_string(),
        }
    }
}

/// Manages the global hotkey that toggles recording.
pub struct HotkeyService {
    config: HotkeyConfig,
    #[cfg(target_os = "windows")]
    manager: global_hotkey::GlobalHotKeyManager,
    #[cfg(target_os = "windows")]
    hotkey: Option<global_hotkey::hotkey::HotKey>,
}

impl HotkeyService {
    /// Create and register the global hotkey.
    #[cfg(target_os = "windows")]
    pub fn new(config: HotkeyConfig) -> Result<Self> {
        use global_hotkey::hotkey::HotKey;
        use global_hotkey::GlobalHotKeyManager;
        use std::str::FromStr;

        let manager = GlobalHotKeyManager::new().map_err(|e| {
            VoxkeyError::Session(format!("Failed to create hotkey manager: {}", e))
        })?;

        let hotkey = HotKey::from_str(&config.key).map_err(|e| {
            VoxkeyError::Session(format!("Failed to parse hotkey '{}': {}", config.key, e))
        })?;

        manager.register(hotkey).map_err(|e| {
            VoxkeyError::Session(format!("Failed to register hotkey '{}': {}", config.key, e))
        })?;

        tracing::info!(key = %config.key, "Global hotkey registered");

        Ok(Self {
            config,
            manager,
            hotkey: Some(hotkey),
        })
    }

    /// Stub constructor for non-Windows platforms.
    #[cfg(not(target_os = "windows"))]
    pub fn new(config: HotkeyConfig) -> Result<Self> {
        tracing::warn!("Global hotkey is only available on Windows");
        Ok(Self { config })
    }

    pub fn config(&self) -> &HotkeyConfig {
        &self.config
    }

    /// Whether the hotkey was pressed since the last check.
    ///
    /// Call this in a polling loop on a blocking thread.
    #[cfg(target_os = "windows")]
    pub fn was_pressed(&self) -> bool {
        use global_hotkey::GlobalHotKeyEvent;

        if let Some(hotkey) = &self.hotkey {
            if let Ok(event) = GlobalHotKeyEvent::receiver().try_recv() {
                return event.id() == hotkey.id();
            }
        }
        false
    }

    /// Stub: always returns false on non-Windows.
    #[cfg(not(target_os = "windows"))]
    pub fn was_pressed(&self) -> bool {
        false
    }

    /// Unregister the hotkey.
    #[cfg(target_os = "windows")]
    pub fn unregister(&mut self) {
        if let Some(hotkey) = self.hotkey.take() {
            let _ = self.manager.unregister(hotkey);
            tracing::info!(key = %self.config.key, "Global hotkey unregistered");
        }
    }

    /// Stub unregister.
    #[cfg(not(target_os = "windows"))]
    pub fn unregister(&mut self) {}
}

#[cfg(target_os = "windows")]
impl Drop for HotkeyService {
    fn drop(&mut self) {
        self.unregister();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

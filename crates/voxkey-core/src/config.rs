use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, VoxkeyError};

/// Top-level configuration for the Voxkey application.
///
/// Loaded from a TOML file (see `voxkey-app` for path resolution). Each
/// section corresponds to one crate's concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoxkeyConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub tray: TrayConfig,
}

impl VoxkeyConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: VoxkeyConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| VoxkeyError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Whether to start Voxkey on login.
    pub autostart: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            autostart: false,
        }
    }
}

/// Microphone capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device name, or `None` for the system default.
    pub microphone: Option<String>,
    /// Capture sample rate in Hz. Whisper expects 16000.
    pub sample_rate: u32,
    /// Capture block duration in milliseconds.
    pub block_ms: u32,
    /// Cap on the accumulation buffer, in seconds of audio. Oldest samples
    /// are dropped beyond this.
    pub max_buffer_secs: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            microphone: None,
            sample_rate: crate::types::SAMPLE_RATE,
            block_ms: crate::types::BLOCK_MS,
            max_buffer_secs: 300,
        }
    }
}

/// Dictation session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Global hotkey that toggles recording.
    pub hotkey: String,
    /// Quiet interval after which recording auto-stops, in milliseconds.
    pub silence_timeout_ms: u64,
    /// Mean-absolute amplitude above which a chunk counts as speech.
    pub amplitude_threshold: f32,
    /// Language hint passed to the transcription gateway.
    pub language: String,
    /// When true, no language hint is passed and the model auto-detects.
    pub auto_detect_language: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            hotkey: "Ctrl+Shift+Space".to_string(),
            silence_timeout_ms: 1500,
            amplitude_threshold: 0.01,
            language: "nl".to_string(),
            auto_detect_language: false,
        }
    }
}

/// Transcription engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Path to the Whisper GGML model file.
    pub model_path: String,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            model_path: String::new(),
        }
    }
}

/// Text delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Prefer clipboard paste over simulated typing.
    pub prefer_clipboard: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            prefer_clipboard: false,
        }
    }
}

/// System tray settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrayConfig {
    /// Show the tray icon.
    pub show_icon: bool,
    /// Show user-facing notifications (model loading, errors).
    pub show_notifications: bool,
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            show_icon: true,
            show_notifications: true,
        }
    }
}

//! CLI argument definitions for the Voxkey application.
//!
//! Uses `clap` with derive macros. Priority resolution: CLI args > env
//! vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Voxkey - hotkey-triggered dictation that types what you say.
#[derive(Parser, Debug)]
#[command(name = "voxkey", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Input device name override (substring match).
    #[arg(short = 'm', long = "microphone")]
    pub microphone: Option<String>,

    /// List available input devices and exit.
    #[arg(long = "list-devices")]
    pub list_devices: bool,

    /// Run without the system tray icon.
    #[arg(long = "headless")]
    pub headless: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > VOXKEY_CONFIG env var > platform default.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("VOXKEY_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(app_data) = std::env::var("APPDATA") {
        return PathBuf::from(app_data).join("voxkey").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("voxkey")
            .join("config.toml");
    }
    PathBuf::from("config.toml")
}

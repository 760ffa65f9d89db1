//! Voxkey UI crate - system tray icon reflecting session state.

pub mod tray;

pub use tray::{TrayMenuAction, TrayService, TrayState};

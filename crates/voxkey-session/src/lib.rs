//! Voxkey session crate - the dictation session state machine.
//!
//! Coordinates hotkey triggers, audio capture, silence detection, and the
//! transcription gateway behind a single event loop: every state change
//! happens in one place, driven by typed events on one channel. The state
//! machine enforces Idle -> Recording -> Processing -> Idle.

pub mod controller;
pub mod hotkey;
pub mod state;

pub use controller::{OutputSink, SessionController, SessionEvent, UiNotifier};
pub use hotkey::{HotkeyConfig, HotkeyService};
pub use state::SessionState;

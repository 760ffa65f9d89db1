//! Session state machine with thread-safe transitions.
//!
//! Enforces valid state transitions for the dictation lifecycle:
//! - Idle -> Recording (hotkey trigger)
//! - Recording -> Processing (toggle, silence, or stream interruption)
//! - Recording -> Idle (capture failed to start)
//! - Processing -> Idle (transcription result delivered)

use std::fmt;
use std::sync::{Arc, Mutex};

use voxkey_core::error::{Result, VoxkeyError};

/// Visible state of the dictation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No session in progress. Ready to record.
    Idle,
    /// Actively capturing microphone input.
    Recording,
    /// Transcribing the captured buffer.
    Processing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Recording => write!(f, "Recording"),
            SessionState::Processing => write!(f, "Processing"),
        }
    }
}

impl SessionState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        matches!(
            (self, target),
            (SessionState::Idle, SessionState::Recording)
                | (SessionState::Recording, SessionState::Processing)
                // Capture-start failure reverts without a session.
                | (SessionState::Recording, SessionState::Idle)
                | (SessionState::Processing, SessionState::Idle)
        )
    }
}

/// Thread-safe cell holding the single process-wide session state.
///
/// All transitions are validated before being applied; invalid requests
/// leave the state untouched and return an error. Critical sections are a
/// check and a store, nothing else.
#[derive(Debug, Clone)]
pub struct StateCell {
    state: Arc<Mutex<SessionState>>,
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCell {
    /// Create a new cell initialized to `Idle`.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::Idle)),
        }
    }

    /// Returns the current state.
    pub fn current(&self) -> SessionState {
        *self.state.lock().expect("state mutex poisoned")
    }

    /// Attempt to transition to the target state.
    pub fn transition(&self, target: SessionState) -> Result<()> {
        let mut state = self.state.lock().expect("state mutex poisoned");
        if state.can_transition_to(&target) {
            tracing::debug!("Session state: {} -> {}", *state, target);
            *state = target;
            Ok(())
        } else {
            Err(VoxkeyError::Session(format!(
                "Invalid state transition: {} -> {}",
                *state, target
            )))
        }
    }

    /// Force the state back to Idle (shutdown and error recovery).
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("state mutex poisoned");
        if *state != SessionState::Idle {
            tracing::warn!("Session state reset to Idle from {}", *state);
            *state = SessionState::Idle;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Text injection via Windows SendInput.
//!
//! On Windows, simulates keyboard input to type text into the focused
//! application. Each character is sent as a Unicode keystroke using
//! `SendInput` with `KEYEVENTF_UNICODE`.
//!
//! On non-Windows, provides a stub that reports the missing capability.

#[cfg(not(target_os = "windows"))]
use tracing::warn;

use voxkey_core::error::{Result, VoxkeyError};

/// Types text into the currently focused application.
pub struct TextInjector;

impl TextInjector {
    pub fn new() -> Self {
        Self
    }

    /// Inject the given text as a batch of Unicode key-down / key-up pairs.
    #[cfg(target_os = "windows")]
    pub fn inject(&self, text: &str) -> Result<()> {
        use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
            SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYEVENTF_KEYUP,
            KEYEVENTF_UNICODE,
        };

        if text.is_empty() {
            return Ok(());
        }

        tracing::debug!(text_len = text.len(), "Injecting text via SendInput");

        let mut inputs: Vec<INPUT> = Vec::new();

        for unit in text.encode_utf16() {
            // Key down
            inputs.push(INPUT {
                r#type: INPUT_KEYBOARD,
                Anonymous: INPUT_0 {
                    ki: KEYBDINPUT {
                        wVk: 0,
                        wScan: unit,
                        dwFlags: KEYEVENTF_UNICODE,
                        time: 0,
                        dwExtraInfo: 0,
                    },
                },
            });

            // Key up
            inputs.push(INPUT {
                r#type: INPUT_KEYBOARD,
                Anonymous: INPUT_0 {
                    ki: KEYBDINPUT {
                        wVk: 0,
                        wScan: unit,
                        dwFlags: KEYEVENTF_UNICODE | KEYEVENTF_KEYUP,
                        time: 0,
                        dwExtraInfo: 0,
                    },
                },
            });
        }

        let sent = unsafe {
            SendInput(
                inputs.len() as u32,
                inputs.as_ptr(),
                std::mem::size_of::<INPUT>() as i32,
            )
        };

        if sent as usize != inputs.len() {
            return Err(VoxkeyError::Output(format!(
                "SendInput only sent {} of {} events",
                sent,
                inputs.len()
            )));
        }

        tracing::info!(chars = text.chars().count(), "Text injected");
        Ok(())
    }

    /// Stub inject on non-Windows.
    #[cfg(not(target_os = "windows"))]
    pub fn inject(&self, text: &str) -> Result<()> {
        warn!(
            text_len = text.len(),
            "TextInjector: SendInput not available on this platform"
        );
        Err(VoxkeyError::Output(
            "Text injection is only available on Windows".into(),
        ))
    }
}

impl Default for TextInjector {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

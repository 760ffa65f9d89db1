//! Clipboard-paste delivery path.
//!
//! Places text on the system clipboard as `CF_UNICODETEXT` and synthesizes
//! a Ctrl+V keystroke. Used when direct typing fails (some applications
//! filter synthetic Unicode input) or when the user prefers pasting.

#[cfg(not(target_os = "windows"))]
use tracing::warn;

use voxkey_core::error::{Result, VoxkeyError};

/// Delivers text by clipboard replacement plus a paste keystroke.
pub struct ClipboardPaster;

impl ClipboardPaster {
    pub fn new() -> Self {
        Self
    }

    /// Put `text` on the clipboard and send Ctrl+V to the focused window.
    #[cfg(target_os = "windows")]
    pub fn paste(&self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }

        set_clipboard_text(text)?;
        // Give the clipboard owner a moment before the paste lands.
        std::thread::sleep(std::time::Duration::from_millis(50));
        send_paste_keystroke()?;

        tracing::info!(chars = text.chars().count(), "Text pasted via clipboard");
        Ok(())
    }

    /// Stub paste on non-Windows.
    #[cfg(not(target_os = "windows"))]
    pub fn paste(&self, text: &str) -> Result<()> {
        warn!(
            text_len = text.len(),
            "ClipboardPaster: clipboard paste not available on this platform"
        );
        Err(VoxkeyError::Output(
            "Clipboard paste is only available on Windows".into(),
        ))
    }
}

impl Default for ClipboardPaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace the clipboard contents with `text` as UTF-16.
#[cfg(target_os = "windows")]
fn set_clipboard_text(text: &str) -> Result<()> {
    use windows_sys::Win32::Foundation::HANDLE;
    use windows_sys::Win32::System::DataExchange::{
        CloseClipboard, EmptyClipboard, OpenClipboard, SetClipboardData,
    };
    use windows_sys::Win32::System::Memory::{GlobalAlloc, GlobalLock, GlobalUnlock, GMEM_MOVEABLE};

    const CF_UNICODETEXT: u32 = 13;

    let utf16: Vec<u16> = text.encode_utf16().chain(std::iter::once(0)).collect();
    let bytes = utf16.len() * std::mem::size_of::<u16>();

    unsafe {
        if OpenClipboard(0) == 0 {
            return Err(VoxkeyError::Output("OpenClipboard failed".into()));
        }

        // Everything below must close the clipboard on the way out.
        let result = (|| {
            if EmptyClipboard() == 0 {
                return Err(VoxkeyError::Output("EmptyClipboard failed".into()));
            }

            let hmem = GlobalAlloc(GMEM_MOVEABLE, bytes);
            if hmem.is_null() {
                return Err(VoxkeyError::Output("GlobalAlloc failed".into()));
            }

            let ptr = GlobalLock(hmem) as *mut u16;
            if ptr.is_null() {
                return Err(VoxkeyError::Output("GlobalLock failed".into()));
            }
            std::ptr::copy_nonoverlapping(utf16.as_ptr(), ptr, utf16.len());
            GlobalUnlock(hmem);

            // On success the system owns the memory; freeing it here would
            // hand the clipboard a dangling handle.
            if SetClipboardData(CF_UNICODETEXT, hmem as HANDLE).is_null() {
                return Err(VoxkeyError::Output("SetClipboardData failed".into()));
            }
            Ok(())
        })();

        CloseClipboard();
        result
    }
}

/// Send a Ctrl+V chord through SendInput.
#[cfg(target_os = "windows")]
fn send_paste_keystroke() -> Result<()> {
    use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
        SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYEVENTF_KEYUP, VK_CONTROL, VK_V,
    };

    fn key(vk: u16, flags: u32) -> INPUT {
        INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: vk,
                    wScan: 0,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        }
    }

    let inputs = [
        key(VK_CONTROL, 0),
        key(VK_V, 0),
        key(VK_V, KEYEVENTF_KEYUP),
        key(VK_CONTROL, KEYEVENTF_KEYUP),
    ];

    let sent = unsafe {
        SendInput(
            inputs.len() as u32,
            inputs.as_ptr(),
            std::mem::size_of::<INPUT>() as i32,
        )
    };

    if sent as usize != inputs.len() {
        return Err(VoxkeyError::Output(format!(
            "SendInput only sent {} of {} paste events",
            sent,
            inputs.len()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clipboard_paster_creation() {
        let _paster = ClipboardPaster::new();
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_paste_returns_error_on_non_windows() {
        let paster = ClipboardPaster::new();
        let result = paster.paste("hello");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("only available on Windows"));
    }
}

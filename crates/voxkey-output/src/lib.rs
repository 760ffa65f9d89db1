//! Voxkey output crate - delivering transcribed text to the foreground window.
//!
//! Primary path is simulated typing via `SendInput`; when that fails the
//! text goes through the clipboard with a synthesized paste keystroke.
//! Non-Windows builds carry stubs that report the missing capability.

pub mod clipboard;
pub mod text_inject;

pub use clipboard::ClipboardPaster;
pub use text_inject::TextInjector;

use tracing::warn;
use voxkey_core::error::Result;

/// Delivers final text, trying direct typing first with a clipboard-paste
/// fallback. The order flips when `prefer_clipboard` is set.
pub struct TextDelivery {
    injector: TextInjector,
    paster: ClipboardPaster,
    prefer_clipboard: bool,
}

impl TextDelivery {
    pub fn new(prefer_clipboard: bool) -> Self {
        Self {
            injector: TextInjector::new(),
            paster: ClipboardPaster::new(),
            prefer_clipboard,
        }
    }

    /// Deliver text into the focused application.
    ///
    /// Empty text is a no-op. Errors mean both delivery paths failed.
    pub fn deliver(&self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }

        if self.prefer_clipboard {
            return self.paster.paste(text);
        }

        match self.injector.inject(text) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Direct typing failed, falling back to clipboard paste");
                self.paster.paste(text)
            }
        }
    }
}

impl Default for TextDelivery {
    fn default() -> Self {
        Self::new(false)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_is_noop() {
        let delivery = TextDelivery::new(false);
        assert!(delivery.deliver("").is_ok());
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_delivery_fails_on_non_windows() {
        // Both paths are stubs off Windows; the error surfaces to the
        // caller, which logs it without touching session state.
        let delivery = TextDelivery::new(false);
        assert!(delivery.deliver("hello").is_err());

        let clipboard_first = TextDelivery::new(true);
        assert!(clipboard_first.deliver("hello").is_err());
    }
}

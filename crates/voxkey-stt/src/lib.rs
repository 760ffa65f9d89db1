//! Voxkey STT crate - the transcription gateway boundary.
//!
//! Provides a trait-based abstraction for speech-to-text conversion, a
//! Whisper-backed implementation (feature-gated), and test doubles that
//! let the session controller be exercised without loading a model.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use voxkey_core::error::{Result, VoxkeyError};

pub mod whisper_service;

pub use whisper_service::WhisperService;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Whisper transcription engine.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path to the Whisper GGML model file.
    pub model_path: String,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: String::new(),
        }
    }
}

// =============================================================================
// Result types
// =============================================================================

/// A single time-aligned segment within a transcription.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Start time in seconds from the beginning of the audio.
    pub start: f32,
    /// End time in seconds from the beginning of the audio.
    pub end: f32,
    /// Transcribed text for this segment.
    pub text: String,
}

/// The complete result of a transcription operation.
#[derive(Debug, Clone)]
pub struct TranscriptionResult {
    /// Full transcribed text.
    pub text: String,
    /// Time-aligned segments.
    pub segments: Vec<Segment>,
    /// Detected or requested language.
    pub language: String,
    /// Total audio duration in seconds.
    pub duration_secs: f32,
}

// =============================================================================
// Trait
// =============================================================================

/// Service for transcribing a finished audio buffer to text.
///
/// The buffer is moved in: one session's audio is transcribed once and then
/// discarded. Implementations may take seconds; callers run them off the
/// event-handling path.
pub trait TranscriptionService: Send + Sync {
    /// Transcribe audio samples into text.
    ///
    /// # Arguments
    /// * `samples` - PCM audio as f32 values in [-1.0, 1.0], moved in.
    /// * `sample_rate` - Sample rate of the audio in Hz (e.g., 16000).
    /// * `language` - Language hint, or `None` to auto-detect.
    fn transcribe(
        &self,
        samples: Vec<f32>,
        sample_rate: u32,
        language: Option<&str>,
    ) -> impl Future<Output = Result<TranscriptionResult>> + Send;
}

// =============================================================================
// Test doubles
// =============================================================================

/// Mock transcription service that returns a fixed dummy result.
#[derive(Debug, Clone, Default)]
pub struct MockTranscriptionService;

impl MockTranscriptionService {
    pub fn new() -> Self {
        Self
    }
}

impl TranscriptionService for MockTranscriptionService {
    async fn transcribe(
        &self,
        samples: Vec<f32>,
        sample_rate: u32,
        language: Option<&str>,
    ) -> Result<TranscriptionResult> {
        if samples.is_empty() {
            return Err(VoxkeyError::Transcription(
                "Cannot transcribe empty audio data".to_string(),
            ));
        }
        if sample_rate == 0 {
            return Err(VoxkeyError::Transcription(
                "Sample rate must be greater than 0".to_string(),
            ));
        }

        let duration_secs = samples.len() as f32 / sample_rate as f32;
        let mock_text = "[mock transcription]".to_string();

        Ok(TranscriptionResult {
            text: mock_text.clone(),
            segments: vec![Segment {
                start: 0.0,
                end: duration_secs,
                text: mock_text,
            }],
            language: language.unwrap_or("auto").to_string(),
            duration_secs,
        })
    }
}

/// One recorded call to a [`ScriptedTranscription`].
#[derive(Debug, Clone)]
pub struct TranscriptionCall {
    pub samples: usize,
    pub sample_rate: u32,
    pub language: Option<String>,
}

/// Scriptable transcription double for controller tests.
///
/// Returns a configurable text (or failure) after an optional delay, and
/// records every call it receives.
pub struct ScriptedTranscription {
    text: Mutex<String>,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<TranscriptionCall>>,
}

impl Default for ScriptedTranscription {
    fn default() -> Self {
        Self::new("hello world")
    }
}

impl ScriptedTranscription {
    pub fn new(text: &str) -> Self {
        Self {
            text: Mutex::new(text.to_string()),
            fail: AtomicBool::new(false),
            delay: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Make every call return a `Transcription` error.
    pub fn fail(&self) {
        self.fail.store(true, Ordering::Relaxed);
    }

    /// Delay each call by the given duration before responding.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().expect("delay mutex poisoned") = Some(delay);
    }

    pub fn calls(&self) -> Vec<TranscriptionCall> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls mutex poisoned").len()
    }
}

impl TranscriptionService for ScriptedTranscription {
    async fn transcribe(
        &self,
        samples: Vec<f32>,
        sample_rate: u32,
        language: Option<&str>,
    ) -> Result<TranscriptionResult> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push(TranscriptionCall {
                samples: samples.len(),
                sample_rate,
                language: language.map(str::to_string),
            });

        let delay = *self.delay.lock().expect("delay mutex poisoned");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail.load(Ordering::Relaxed) {
            return Err(VoxkeyError::Transcription("scripted failure".to_string()));
        }

        let text = self.text.lock().expect("text mutex poisoned").clone();
        let duration_secs = samples.len() as f32 / sample_rate.max(1) as f32;
        Ok(TranscriptionResult {
            text: text.clone(),
            segments: vec![Segment {
                start: 0.0,
                end: duration_secs,
                text,
            }],
            language: language.unwrap_or("auto").to_string(),
            duration_secs,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

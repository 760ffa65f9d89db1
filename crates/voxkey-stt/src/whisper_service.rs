//! Whisper transcription service via whisper-rs (whisper.cpp bindings).
//!
//! When compiled with the `whisper` feature, loads a GGML model file and
//! runs speech-to-text inference on raw PCM audio. Without the feature, the
//! constructor succeeds with a warning and transcription errors cleanly.

#[cfg(feature = "whisper")]
use std::path::Path;

use voxkey_core::error::{Result, VoxkeyError};

#[cfg(feature = "whisper")]
use crate::Segment;
use crate::{TranscriptionResult, TranscriptionService, WhisperConfig};

/// Whisper transcription service backed by whisper.cpp.
///
/// Holds a loaded model context that is reused across transcription calls.
pub struct WhisperService {
    #[cfg(feature = "whisper")]
    ctx: whisper_rs::WhisperContext,
    config: WhisperConfig,
}

impl WhisperService {
    /// Create a new service by loading a GGML model file.
    ///
    /// # Errors
    /// Returns `VoxkeyError::Transcription` if the model file doesn't exist
    /// or fails to load.
    #[cfg(feature = "whisper")]
    pub fn new(config: WhisperConfig) -> Result<Self> {
        use whisper_rs::{WhisperContext, WhisperContextParameters};

        let model_path = &config.model_path;
        if !Path::new(model_path).exists() {
            return Err(VoxkeyError::Transcription(format!(
                "Whisper model file not found: {}",
                model_path
            )));
        }

        tracing::info!(model = %model_path, "Loading Whisper model");

        let params = WhisperContextParameters::default();
        let ctx = WhisperContext::new_with_params(model_path, params).map_err(|e| {
            VoxkeyError::Transcription(format!("Failed to load Whisper model: {}", e))
        })?;

        tracing::info!("Whisper model loaded");
        Ok(Self { ctx, config })
    }

    /// Stub constructor when the `whisper` feature is disabled.
    #[cfg(not(feature = "whisper"))]
    pub fn new(config: WhisperConfig) -> Result<Self> {
        tracing::warn!("WhisperService created without `whisper` feature - transcription will fail");
        Ok(Self { config })
    }

    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

// ---------------------------------------------------------------------------
// Real implementation (whisper feature enabled)
// ---------------------------------------------------------------------------

#[cfg(feature = "whisper")]
impl TranscriptionService for WhisperService {
    async fn transcribe(
        &self,
        samples: Vec<f32>,
        sample_rate: u32,
        language: Option<&str>,
    ) -> Result<TranscriptionResult> {
        use whisper_rs::{FullParams, SamplingStrategy};

        if samples.is_empty() {
            return Err(VoxkeyError::Transcription(
                "Cannot transcribe empty audio data".into(),
            ));
        }
        if sample_rate == 0 {
            return Err(VoxkeyError::Transcription(
                "Sample rate must be greater than 0".into(),
            ));
        }

        // Whisper expects 16 kHz mono PCM.
        let samples_16k = if sample_rate != 16000 {
            resample(&samples, sample_rate, 16000)
        } else {
            samples
        };

        let duration_secs = samples_16k.len() as f32 / 16000.0;
        tracing::debug!(
            samples = samples_16k.len(),
            duration_secs,
            "Starting Whisper transcription"
        );

        let mut state = self.ctx.create_state().map_err(|e| {
            VoxkeyError::Transcription(format!("Failed to create Whisper state: {}", e))
        })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        // No hint (or "auto") lets the model detect the language.
        let lang = language.filter(|l| *l != "auto");
        params.set_language(lang);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_single_segment(false);

        state
            .full(params, &samples_16k)
            .map_err(|e| VoxkeyError::Transcription(format!("Whisper inference failed: {}", e)))?;

        let n_segments = state.full_n_segments().map_err(|e| {
            VoxkeyError::Transcription(format!("Failed to get segment count: {}", e))
        })?;

        let mut segments = Vec::with_capacity(n_segments as usize);
        let mut full_text = String::new();

        for i in 0..n_segments {
            let text = state.full_get_segment_text(i).map_err(|e| {
                VoxkeyError::Transcription(format!("Failed to get segment {} text: {}", i, e))
            })?;

            // Timestamps are in centiseconds.
            let t0 = state.full_get_segment_t0(i).map_err(|e| {
                VoxkeyError::Transcription(format!("Failed to get segment {} t0: {}", i, e))
            })?;
            let t1 = state.full_get_segment_t1(i).map_err(|e| {
                VoxkeyError::Transcription(format!("Failed to get segment {} t1: {}", i, e))
            })?;

            if !full_text.is_empty() {
                full_text.push(' ');
            }
            full_text.push_str(text.trim());

            segments.push(Segment {
                start: t0 as f32 / 100.0,
                end: t1 as f32 / 100.0,
                text: text.trim().to_string(),
            });
        }

        tracing::info!(
            segments = n_segments,
            text_len = full_text.len(),
            "Transcription complete"
        );

        Ok(TranscriptionResult {
            text: full_text,
            segments,
            language: lang.unwrap_or("auto").to_string(),
            duration_secs,
        })
    }
}

// ---------------------------------------------------------------------------
// Stub implementation (whisper feature disabled)
// ---------------------------------------------------------------------------

#[cfg(not(feature = "whisper"))]
impl TranscriptionService for WhisperService {
    async fn transcribe(
        &self,
        _samples: Vec<f32>,
        _sample_rate: u32,
        _language: Option<&str>,
    ) -> Result<TranscriptionResult> {
        Err(VoxkeyError::Transcription(
            "Whisper transcription requires the `whisper` feature to be enabled".into(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Resampling helper
// ---------------------------------------------------------------------------

/// Linear resampling guard for callers that hand in non-16 kHz audio.
#[cfg(feature = "whisper")]
fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (input.len() as f64 / ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_idx = i as f64 * ratio;
        let idx0 = src_idx.floor() as usize;
        let idx1 = (idx0 + 1).min(input.len() - 1);
        let frac = (src_idx - idx0 as f64) as f32;

        output.push(input[idx0] * (1.0 - frac) + input[idx1] * frac);
    }

    output
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

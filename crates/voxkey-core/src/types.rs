//! Shared audio and session types.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Fixed capture sample rate in Hz. Whisper-compatible mono PCM.
pub const SAMPLE_RATE: u32 = 16_000;

/// Duration of one capture block in milliseconds.
pub const BLOCK_MS: u32 = 100;

/// Number of samples in one capture block (100 ms at 16 kHz).
pub const fn samples_per_block() -> usize {
    (SAMPLE_RATE as usize * BLOCK_MS as usize) / 1000
}

/// One fixed-duration block of captured audio with a summary amplitude.
///
/// Produced by the capture callback, observed by the silence monitor, and
/// accumulated into the session buffer. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    samples: Vec<f32>,
    amplitude: f32,
}

impl AudioChunk {
    /// Build a chunk from raw samples, computing the mean absolute amplitude.
    pub fn new(samples: Vec<f32>) -> Self {
        let amplitude = if samples.is_empty() {
            0.0
        } else {
            samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len() as f32
        };
        Self { samples, amplitude }
    }

    /// The mono PCM samples for this block.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Mean absolute amplitude of the block, in [0.0, 1.0] for normalized input.
    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Consume the chunk, yielding its samples.
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

/// Bookkeeping for one recording-to-transcription cycle.
///
/// Carries the identifiers used to correlate log lines across the capture
/// callback, the silence watcher, and the transcription task.
#[derive(Debug, Clone)]
pub struct RecordingSession {
    /// Unique identifier for this session.
    pub id: Uuid,
    /// When recording started.
    pub started_at: DateTime<Utc>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }

    /// Elapsed duration of this session in seconds.
    pub fn elapsed_secs(&self) -> f32 {
        let elapsed = Utc::now() - self.started_at;
        elapsed.num_milliseconds() as f32 / 1000.0
    }
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_per_block() {
        assert_eq!(samples_per_block(), 1600);
    }

    #[test]
    fn test_chunk_amplitude_mean_abs() {
        let chunk = AudioChunk::new(vec![0.5, -0.5, 0.5, -0.5]);
        assert!((chunk.amplitude() - 0.5).abs() < 1e-6);
        assert_eq!(chunk.len(), 4);
    }

    #[test]
    fn test_chunk_amplitude_mixed_signs() {
        let chunk = AudioChunk::new(vec![0.1, -0.3]);
        assert!((chunk.amplitude() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_empty_chunk() {
        let chunk = AudioChunk::new(Vec::new());
        assert!(chunk.is_empty());
        assert_eq!(chunk.amplitude(), 0.0);
    }

    #[test]
    fn test_chunk_into_samples() {
        let chunk = AudioChunk::new(vec![0.1, 0.2, 0.3]);
        assert_eq!(chunk.into_samples(), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_silent_chunk_amplitude_zero() {
        let chunk = AudioChunk::new(vec![0.0; 1600]);
        assert_eq!(chunk.amplitude(), 0.0);
    }

    #[test]
    fn test_recording_session_ids_unique() {
        let a = RecordingSession::new();
        let b = RecordingSession::new();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_recording_session_elapsed() {
        let session = RecordingSession::new();
        // Right after creation elapsed is essentially zero.
        assert!(session.elapsed_secs() < 1.0);
    }
}

//! Voxkey audio crate - microphone capture, chunk assembly, silence monitoring.
//!
//! Provides trait-based abstractions for audio capture plus a mock
//! implementation for testing without real audio hardware. The silence
//! monitor turns per-chunk amplitude observations into a single
//! end-of-utterance signal per session.

pub mod capture;
pub mod devices;
pub mod silence;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use voxkey_core::error::{Result, VoxkeyError};
use voxkey_core::types::AudioChunk;

pub use capture::{AudioBuffer, ChunkAssembler, MicCapture};
pub use silence::{spawn_watcher, SilenceMonitor, POLL_INTERVAL};

// =============================================================================
// Traits
// =============================================================================

/// Receives per-block callbacks from an active capture stream.
///
/// Both methods are invoked on the audio driver's callback thread and must
/// not block: amplitude observation, a timestamp store, or a channel send
/// at most.
pub trait ChunkSink: Send + Sync {
    /// A fixed-duration block of converted audio arrived.
    fn chunk(&self, chunk: &AudioChunk);

    /// The device disappeared or the stream errored mid-capture.
    fn interrupted(&self, reason: &str);
}

/// Service for managing audio capture from an input device.
///
/// Implementations open the device on `start`, deliver converted blocks to
/// the registered sink, and hand back the full session buffer on `stop`.
pub trait CaptureService: Send + Sync {
    /// Open the input stream and begin delivering chunks to `sink`.
    fn start(&self, sink: Arc<dyn ChunkSink>) -> Result<()>;

    /// Stop the stream, release the device, and return all samples captured
    /// since `start`, in arrival order.
    ///
    /// Idempotent: when no capture is active this returns an empty buffer
    /// and performs no device operation.
    fn stop(&self) -> Vec<f32>;

    /// Whether a capture stream is currently open.
    fn is_active(&self) -> bool;
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Mock capture service for testing.
///
/// Simulates capture without hardware: start failures can be scripted, the
/// buffer returned by `stop` can be preloaded, and chunks can be fed to the
/// registered sink by hand.
pub struct MockCapture {
    active: AtomicBool,
    /// A session was started and not yet stopped. Outlives `active` when the
    /// stream is interrupted, so `stop` still drains the partial buffer.
    started: AtomicBool,
    fail_next_start: AtomicBool,
    stop_samples: Mutex<Vec<f32>>,
    sink: Mutex<Option<Arc<dyn ChunkSink>>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl Default for MockCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCapture {
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            started: AtomicBool::new(false),
            fail_next_start: AtomicBool::new(false),
            stop_samples: Mutex::new(Vec::new()),
            sink: Mutex::new(None),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    /// Preload the buffer that the next `stop` will return.
    pub fn set_stop_samples(&self, samples: Vec<f32>) {
        *self.stop_samples.lock().expect("mock samples mutex poisoned") = samples;
    }

    /// Make the next `start` call fail with `DeviceUnavailable`.
    pub fn fail_next_start(&self) {
        self.fail_next_start.store(true, Ordering::Relaxed);
    }

    /// Deliver a chunk to the sink registered by `start`.
    pub fn feed(&self, chunk: &AudioChunk) {
        if let Some(sink) = self.sink.lock().expect("mock sink mutex poisoned").as_ref() {
            sink.chunk(chunk);
        }
    }

    /// Simulate the device disappearing mid-capture.
    pub fn interrupt(&self, reason: &str) {
        self.active.store(false, Ordering::Relaxed);
        if let Some(sink) = self.sink.lock().expect("mock sink mutex poisoned").as_ref() {
            sink.interrupted(reason);
        }
    }

    /// Number of successful `start` calls so far.
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::Relaxed)
    }

    /// Number of `stop` calls that actually stopped an active capture.
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::Relaxed)
    }
}

impl CaptureService for MockCapture {
    fn start(&self, sink: Arc<dyn ChunkSink>) -> Result<()> {
        if self.fail_next_start.swap(false, Ordering::Relaxed) {
            return Err(VoxkeyError::DeviceUnavailable {
                device: "mock".to_string(),
            });
        }
        if self.started.swap(true, Ordering::Relaxed) {
            return Err(VoxkeyError::Audio("capture already active".to_string()));
        }
        self.active.store(true, Ordering::Relaxed);
        *self.sink.lock().expect("mock sink mutex poisoned") = Some(sink);
        self.starts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&self) -> Vec<f32> {
        if !self.started.swap(false, Ordering::Relaxed) {
            return Vec::new();
        }
        self.active.store(false, Ordering::Relaxed);
        self.stops.fetch_add(1, Ordering::Relaxed);
        *self.sink.lock().expect("mock sink mutex poisoned") = None;
        std::mem::take(&mut *self.stop_samples.lock().expect("mock samples mutex poisoned"))
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Tests
// =============================================================================

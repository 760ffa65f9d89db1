//! Silence monitoring for end-of-utterance detection.
//!
//! A `SilenceMonitor` tracks the timestamp of the last chunk whose
//! amplitude exceeded the threshold. A watcher task polls it; once the
//! quiet interval reaches the configured timeout (and at least one chunk
//! has ever been observed), the end-of-utterance signal fires exactly
//! once. Monitors are single-shot: each recording session arms a fresh one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::debug;

use voxkey_core::types::AudioChunk;

/// How often the watcher checks the quiet interval.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Observes chunk amplitudes and decides when the speaker has stopped.
///
/// `observe` runs on the audio callback thread; `poll` runs on the watcher
/// task. The deadline is a mutex-protected timestamp with store/load
/// critical sections only, so the callback never stalls on the watcher.
pub struct SilenceMonitor {
    timeout: Duration,
    threshold: f32,
    /// Timestamp of the most recent above-threshold chunk. Starts at
    /// construction time and only ever moves forward.
    last_loud: Mutex<Instant>,
    /// Set once the first chunk (loud or quiet) arrives. The signal never
    /// fires on an empty or slow-starting stream.
    observed: AtomicBool,
    fired: AtomicBool,
    cancelled: AtomicBool,
}

impl SilenceMonitor {
    pub fn new(timeout: Duration, threshold: f32) -> Self {
        Self {
            timeout,
            threshold,
            last_loud: Mutex::new(Instant::now()),
            observed: AtomicBool::new(false),
            fired: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Record a captured chunk. Above-threshold amplitude advances the
    /// deadline to now; quiet chunks only mark the stream as started.
    pub fn observe(&self, chunk: &AudioChunk) {
        self.observe_at(chunk, Instant::now());
    }

    fn observe_at(&self, chunk: &AudioChunk, at: Instant) {
        self.observed.store(true, Ordering::Release);

        if chunk.amplitude() > self.threshold {
            let mut last = self.last_loud.lock().expect("deadline mutex poisoned");
            if at > *last {
                *last = at;
            }
        }
    }

    /// Check whether the end-of-utterance signal should fire now.
    ///
    /// Returns `true` at most once per monitor.
    pub fn poll(&self) -> bool {
        self.should_fire_at(Instant::now())
    }

    fn should_fire_at(&self, now: Instant) -> bool {
        if self.cancelled.load(Ordering::Acquire)
            || self.fired.load(Ordering::Acquire)
            || !self.observed.load(Ordering::Acquire)
        {
            return false;
        }

        let deadline = *self.last_loud.lock().expect("deadline mutex poisoned");
        if now.duration_since(deadline) >= self.timeout {
            // swap guarantees a single firing even with concurrent polls.
            !self.fired.swap(true, Ordering::AcqRel)
        } else {
            false
        }
    }

    /// Disarm the monitor; `poll` returns `false` from now on.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Current deadline (last above-threshold chunk, or construction time).
    pub fn deadline(&self) -> Instant {
        *self.last_loud.lock().expect("deadline mutex poisoned")
    }
}

/// Spawn the watcher task for one monitoring session.
///
/// Polls every [`POLL_INTERVAL`] and invokes `on_silence` exactly once when
/// the monitor fires, then exits. Cancelling the monitor ends the task
/// without firing.
pub fn spawn_watcher<F>(monitor: Arc<SilenceMonitor>, on_silence: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        loop {
            interval.tick().await;
            if monitor.is_cancelled() {
                debug!("Silence watcher cancelled");
                return;
            }
            if monitor.poll() {
                debug!("End of utterance detected");
                on_silence();
                return;
            }
        }
    })
}

// =============================================================================
// Tests
// =============================================================================

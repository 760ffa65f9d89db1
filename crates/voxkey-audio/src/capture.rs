//! Microphone capture via cpal.
//!
//! Opens the configured input device at its preferred configuration and
//! converts the incoming stream to mono 16 kHz: channel downmix, stateful
//! linear resampling, then re-blocking into fixed 100 ms chunks. Samples
//! accumulate in a bounded shared buffer that `stop` drains.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, info};

use voxkey_core::config::AudioConfig;
use voxkey_core::error::{Result, VoxkeyError};
use voxkey_core::types::AudioChunk;

use crate::devices;
use crate::{CaptureService, ChunkSink};

/// Thread-safe accumulation buffer for audio samples.
///
/// The cpal callback thread pushes converted samples; `take` drains
/// everything for transcription. Bounded: when full, the oldest samples are
/// dropped so the callback never blocks on a slow consumer.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    samples: Arc<Mutex<Vec<f32>>>,
    max_samples: usize,
}

impl AudioBuffer {
    /// Create a new buffer holding at most `max_samples` samples.
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: Arc::new(Mutex::new(Vec::new())),
            max_samples,
        }
    }

    /// Push samples, dropping the oldest if the buffer is over capacity.
    pub fn push(&self, data: &[f32]) {
        if let Ok(mut buf) = self.samples.lock() {
            buf.extend_from_slice(data);
            if buf.len() > self.max_samples {
                let excess = buf.len() - self.max_samples;
                buf.drain(..excess);
            }
        }
    }

    /// Take all buffered samples, leaving the buffer empty.
    pub fn take(&self) -> Vec<f32> {
        if let Ok(mut buf) = self.samples.lock() {
            std::mem::take(&mut *buf)
        } else {
            Vec::new()
        }
    }

    /// Number of samples currently buffered.
    pub fn len(&self) -> usize {
        self.samples.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Re-blocks an arbitrary sample stream into fixed-length chunks.
///
/// cpal delivers whatever block size the driver picked; the silence monitor
/// contract is one `AudioChunk` per 100 ms. Leftover samples carry over to
/// the next push.
pub struct ChunkAssembler {
    block_len: usize,
    pending: Vec<f32>,
}

impl ChunkAssembler {
    pub fn new(block_len: usize) -> Self {
        Self {
            block_len,
            pending: Vec::with_capacity(block_len * 2),
        }
    }

    /// Append samples and return every complete block they produce.
    pub fn push(&mut self, samples: &[f32]) -> Vec<AudioChunk> {
        self.pending.extend_from_slice(samples);

        let mut chunks = Vec::new();
        while self.pending.len() >= self.block_len {
            let block: Vec<f32> = self.pending.drain(..self.block_len).collect();
            chunks.push(AudioChunk::new(block));
        }
        chunks
    }

    /// Samples waiting for the next complete block.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Downmix interleaved multi-channel samples to mono by averaging frames.
pub fn downmix_to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    let ch = channels as usize;
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Linear resampler that keeps its fractional read position across calls.
///
/// Per-callback resampling would reset the phase at every block boundary;
/// carrying the position keeps the output continuous over a whole session.
pub struct LinearResampler {
    from_rate: u32,
    to_rate: u32,
    pos: f64,
}

impl LinearResampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        Self {
            from_rate,
            to_rate,
            pos: 0.0,
        }
    }

    /// Resample one block of mono input to the target rate.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if input.is_empty() {
            return Vec::new();
        }
        if self.from_rate == self.to_rate {
            return input.to_vec();
        }

        let ratio = self.from_rate as f64 / self.to_rate as f64;
        let mut out = Vec::with_capacity((input.len() as f64 / ratio).ceil() as usize);
        let mut pos = self.pos;

        while pos + 1.0 < input.len() as f64 {
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let sample = input[idx] * (1.0 - frac) + input[idx + 1] * frac;
            out.push(sample);
            pos += ratio;
        }

        self.pos = pos - input.len() as f64;
        out
    }
}

/// Wrapper to make `cpal::Stream` storable inside a `Mutex`.
///
/// `cpal::Stream` carries a `*mut ()` marker that prevents auto
/// `Send`/`Sync`. The handle is only ever stored (to keep the stream alive)
/// or dropped (to stop capture); audio data flows through the callback on a
/// thread cpal manages itself.
struct SendStream(#[allow(dead_code)] cpal::Stream);

// SAFETY: the Stream handle is never used to share data across threads.
// Callbacks run on a separate OS thread owned by cpal, and the handle is
// only dropped under the mutex to close the device.
unsafe impl Send for SendStream {}
unsafe impl Sync for SendStream {}

/// Microphone capture service backed by cpal.
///
/// Converted samples land in the shared `AudioBuffer`; fixed-size chunks go
/// to the `ChunkSink` registered at `start`.
pub struct MicCapture {
    config: AudioConfig,
    active: Arc<AtomicBool>,
    buffer: AudioBuffer,
    stream: Mutex<Option<SendStream>>,
}

impl MicCapture {
    /// Create a new capture service with the given configuration.
    pub fn new(config: AudioConfig) -> Self {
        let max_samples = config.sample_rate as usize * config.max_buffer_secs as usize;
        Self {
            config,
            active: Arc::new(AtomicBool::new(false)),
            buffer: AudioBuffer::new(max_samples),
            stream: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// The shared accumulation buffer.
    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }
}

impl CaptureService for MicCapture {
    fn start(&self, sink: Arc<dyn ChunkSink>) -> Result<()> {
        if self.active.load(Ordering::Relaxed) {
            return Err(VoxkeyError::Audio("capture already active".into()));
        }

        let host = cpal::default_host();

        let device = match self.config.microphone {
            None => host.default_input_device().ok_or_else(|| {
                VoxkeyError::DeviceUnavailable {
                    device: "default".to_string(),
                }
            })?,
            Some(ref name) => devices::find_input_device(&host, name)?,
        };

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        debug!(device = %device_name, "Selected input device");

        // Use the device's preferred config; many devices refuse arbitrary
        // sample rates, so conversion happens in the callback instead.
        let stream_config = match device.default_input_config() {
            Ok(supported) => cpal::StreamConfig {
                channels: supported.channels(),
                sample_rate: supported.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            },
            Err(e) => {
                debug!(error = %e, "No default input config, requesting target format");
                cpal::StreamConfig {
                    channels: 1,
                    sample_rate: cpal::SampleRate(self.config.sample_rate),
                    buffer_size: cpal::BufferSize::Default,
                }
            }
        };

        let device_rate = stream_config.sample_rate.0;
        let device_channels = stream_config.channels;
        let target_rate = self.config.sample_rate;

        if device_rate != target_rate || device_channels != 1 {
            info!(
                device_rate,
                device_channels, target_rate, "Converting input to mono at target rate"
            );
        }

        let buffer = self.buffer.clone();
        let data_sink = Arc::clone(&sink);
        let mut resampler = LinearResampler::new(device_rate, target_rate);
        let block_len = (target_rate as usize * self.config.block_ms as usize) / 1000;
        let mut assembler = ChunkAssembler::new(block_len.max(1));

        let error_sink = sink;
        let active_flag = Arc::clone(&self.active);

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mono = downmix_to_mono(data, device_channels);
                    let converted = resampler.process(&mono);
                    if converted.is_empty() {
                        return;
                    }
                    buffer.push(&converted);
                    for chunk in assembler.push(&converted) {
                        data_sink.chunk(&chunk);
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    active_flag.store(false, Ordering::Relaxed);
                    error_sink.interrupted(&err.to_string());
                },
                None,
            )
            .map_err(|e| VoxkeyError::Audio(format!("Failed to build input stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| VoxkeyError::Audio(format!("Failed to start input stream: {}", e)))?;

        if let Ok(mut guard) = self.stream.lock() {
            *guard = Some(SendStream(stream));
        }
        self.active.store(true, Ordering::Relaxed);

        info!(
            device = %device_name,
            device_rate,
            device_channels,
            target_rate,
            "Audio capture started"
        );
        Ok(())
    }

    fn stop(&self) -> Vec<f32> {
        let was_active = self.active.swap(false, Ordering::Relaxed);

        // Dropping the stream releases the device. Done even when the
        // active flag was already cleared by a stream error so the handle
        // never outlives the session.
        let had_stream = if let Ok(mut guard) = self.stream.lock() {
            guard.take().is_some()
        } else {
            false
        };

        if !was_active && !had_stream {
            return Vec::new();
        }

        let samples = self.buffer.take();
        info!(samples = samples.len(), "Audio capture stopped");
        samples
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Tests
// =============================================================================

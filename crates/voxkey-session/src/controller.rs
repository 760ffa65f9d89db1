//! The session controller: single owner of the dictation lifecycle.
//!
//! Every event source (hotkey poller, silence watcher, capture error
//! callback, transcription task) pushes a typed `SessionEvent` onto one
//! channel; the controller's event loop is the only place state changes
//! happen. The transcription call runs on its own task and re-enters the
//! loop through the same channel, so neither chunk delivery nor hotkey
//! handling ever waits on the model.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use voxkey_audio::{spawn_watcher, CaptureService, ChunkSink, SilenceMonitor};
use voxkey_core::config::SessionConfig;
use voxkey_core::error::Result;
use voxkey_core::types::{AudioChunk, RecordingSession, SAMPLE_RATE};
use voxkey_stt::TranscriptionService;

use crate::state::{SessionState, StateCell};

/// Events consumed by the controller's event loop.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The global hotkey was pressed (toggle semantics).
    HotkeyPressed,
    /// The silence watcher detected end of utterance.
    SilenceDetected,
    /// The capture stream errored mid-recording.
    StreamInterrupted(String),
    /// The transcription task finished (empty text on failure).
    TranscriptionDone(String),
    /// Stop the controller.
    Shutdown,
}

/// Receives state-change and freeform notifications. Fire-and-forget.
pub trait UiNotifier: Send + Sync {
    fn phase_changed(&self, phase: SessionState);
    fn notify(&self, title: &str, message: &str);
}

/// Delivers final transcribed text to the environment.
///
/// Failures are reported to the caller but never affect session state.
pub trait OutputSink: Send + Sync {
    fn emit(&self, text: &str) -> Result<()>;
}

/// Capture-side callbacks for one recording session.
///
/// Runs on the audio callback thread: amplitude observation and channel
/// sends only, nothing that can block.
struct SessionChunkSink {
    monitor: Arc<SilenceMonitor>,
    events: UnboundedSender<SessionEvent>,
}

impl ChunkSink for SessionChunkSink {
    fn chunk(&self, chunk: &AudioChunk) {
        self.monitor.observe(chunk);
    }

    fn interrupted(&self, reason: &str) {
        let _ = self
            .events
            .send(SessionEvent::StreamInterrupted(reason.to_string()));
    }
}

/// Coordinates one dictation session at a time.
///
/// Generic over its collaborators so tests can substitute mocks for the
/// capture device and the transcription gateway.
pub struct SessionController<C, T, U, O> {
    config: SessionConfig,
    state: StateCell,
    capture: Arc<C>,
    gateway: Arc<T>,
    notifier: Arc<U>,
    output: Arc<O>,
    events_tx: UnboundedSender<SessionEvent>,
    events_rx: Mutex<Option<UnboundedReceiver<SessionEvent>>>,
    monitor: Mutex<Option<Arc<SilenceMonitor>>>,
    session: Mutex<Option<RecordingSession>>,
}

impl<C, T, U, O> SessionController<C, T, U, O>
where
    C: CaptureService + 'static,
    T: TranscriptionService + 'static,
    U: UiNotifier + 'static,
    O: OutputSink + 'static,
{
    pub fn new(
        config: SessionConfig,
        capture: Arc<C>,
        gateway: Arc<T>,
        notifier: Arc<U>,
        output: Arc<O>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            state: StateCell::new(),
            capture,
            gateway,
            notifier,
            output,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            monitor: Mutex::new(None),
            session: Mutex::new(None),
        }
    }

    /// Returns the current session state.
    pub fn current_state(&self) -> SessionState {
        self.state.current()
    }

    /// A sender handle for pushing events into the controller.
    pub fn event_sender(&self) -> UnboundedSender<SessionEvent> {
        self.events_tx.clone()
    }

    /// Run the event loop until a `Shutdown` event arrives.
    ///
    /// Panics if called twice: there is exactly one event loop.
    pub async fn run(self: Arc<Self>) {
        let mut rx = self
            .events_rx
            .lock()
            .expect("receiver mutex poisoned")
            .take()
            .expect("controller event loop already running");

        info!("Session controller started");
        while let Some(event) = rx.recv().await {
            if !self.handle_event(event) {
                break;
            }
        }
        info!("Session controller stopped");
    }

    /// Dispatch one event. Returns `false` when the loop should exit.
    pub fn handle_event(&self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::HotkeyPressed => {
                self.on_hotkey();
                true
            }
            SessionEvent::SilenceDetected => {
                self.on_silence();
                true
            }
            SessionEvent::StreamInterrupted(reason) => {
                self.on_interrupted(&reason);
                true
            }
            SessionEvent::TranscriptionDone(text) => {
                self.on_transcription_done(text);
                true
            }
            SessionEvent::Shutdown => {
                self.abort();
                false
            }
        }
    }

    fn on_hotkey(&self) {
        match self.state.current() {
            SessionState::Idle => self.start_recording(),
            SessionState::Recording => self.finish_recording("hotkey"),
            SessionState::Processing => {
                // Defined no-op: a second press while transcribing must not
                // race a new recording session.
                debug!("Hotkey ignored while processing");
            }
        }
    }

    fn on_silence(&self) {
        if self.state.current() == SessionState::Recording {
            self.finish_recording("silence");
        } else {
            debug!("Stale silence signal ignored");
        }
    }

    fn on_interrupted(&self, reason: &str) {
        if self.state.current() == SessionState::Recording {
            warn!(reason, "Capture stream interrupted, finalizing session");
            self.finish_recording("stream interruption");
        } else {
            debug!(reason, "Stream interruption outside recording ignored");
        }
    }

    fn start_recording(&self) {
        if let Err(e) = self.state.transition(SessionState::Recording) {
            warn!(error = %e, "Cannot start recording");
            return;
        }
        self.notifier.phase_changed(SessionState::Recording);

        let monitor = Arc::new(SilenceMonitor::new(
            Duration::from_millis(self.config.silence_timeout_ms),
            self.config.amplitude_threshold,
        ));
        let sink = Arc::new(SessionChunkSink {
            monitor: Arc::clone(&monitor),
            events: self.events_tx.clone(),
        });

        match self.capture.start(sink) {
            Ok(()) => {
                let session = RecordingSession::new();
                info!(session_id = %session.id, "Recording started");

                let events = self.events_tx.clone();
                spawn_watcher(Arc::clone(&monitor), move || {
                    let _ = events.send(SessionEvent::SilenceDetected);
                });

                *self.monitor.lock().expect("monitor mutex poisoned") = Some(monitor);
                *self.session.lock().expect("session mutex poisoned") = Some(session);
            }
            Err(e) => {
                warn!(error = %e, "Failed to start capture");
                let _ = self.state.transition(SessionState::Idle);
                self.notifier.phase_changed(SessionState::Idle);
                self.notifier.notify(
                    "Recording failed",
                    "Could not start recording. Check your microphone.",
                );
            }
        }
    }

    fn finish_recording(&self, cause: &str) {
        if let Err(e) = self.state.transition(SessionState::Processing) {
            warn!(error = %e, "Cannot finish recording");
            return;
        }
        self.notifier.phase_changed(SessionState::Processing);

        if let Some(monitor) = self.monitor.lock().expect("monitor mutex poisoned").take() {
            monitor.cancel();
        }

        let samples = self.capture.stop();
        let session = self.session.lock().expect("session mutex poisoned").take();
        if let Some(ref session) = session {
            info!(
                session_id = %session.id,
                cause,
                samples = samples.len(),
                elapsed_secs = session.elapsed_secs(),
                "Recording finished"
            );
        }

        if samples.is_empty() {
            // Nothing captured: skip the gateway, complete with empty text
            // so Processing -> Idle still happens in exactly one place.
            debug!("Empty capture buffer, skipping transcription");
            let _ = self
                .events_tx
                .send(SessionEvent::TranscriptionDone(String::new()));
            return;
        }

        let gateway = Arc::clone(&self.gateway);
        let events = self.events_tx.clone();
        let language = self.language_hint();
        tokio::spawn(async move {
            let text = match gateway
                .transcribe(samples, SAMPLE_RATE, language.as_deref())
                .await
            {
                Ok(result) => result.text,
                Err(e) => {
                    warn!(error = %e, "Transcription failed");
                    String::new()
                }
            };
            let _ = events.send(SessionEvent::TranscriptionDone(text));
        });
    }

    fn on_transcription_done(&self, text: String) {
        if self.state.current() != SessionState::Processing {
            debug!("Stale transcription result dropped");
            return;
        }

        let trimmed = text.trim();
        if !trimmed.is_empty() {
            if let Err(e) = self.output.emit(trimmed) {
                warn!(error = %e, "Failed to deliver transcribed text");
            }
        }

        if let Err(e) = self.state.transition(SessionState::Idle) {
            warn!(error = %e, "Cannot return to idle");
        }
        self.notifier.phase_changed(SessionState::Idle);
    }

    /// Stop everything for shutdown. In-flight transcription is abandoned.
    fn abort(&self) {
        if let Some(monitor) = self.monitor.lock().expect("monitor mutex poisoned").take() {
            monitor.cancel();
        }
        if self.capture.is_active() {
            let _ = self.capture.stop();
        }
        self.session.lock().expect("session mutex poisoned").take();
        self.state.reset();
    }

    fn language_hint(&self) -> Option<String> {
        if self.config.auto_detect_language {
            None
        } else {
            Some(self.config.language.clone())
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use voxkey_audio::MockCapture;
    use voxkey_core::error::VoxkeyError;
    use voxkey_stt::ScriptedTranscription;

    /// Records every notification it receives.
    #[derive(Default)]
    struct RecordingNotifier {
        phases: Mutex<Vec<SessionState>>,
        messages: Mutex<Vec<String>>,
    }

    impl UiNotifier for RecordingNotifier {
        fn phase_changed(&self, phase: SessionState) {
            self.phases.lock().unwrap().push(phase);
        }

        fn notify(&self, title: &str, _message: &str) {
            self.messages.lock().unwrap().push(title.to_string());
        }
    }

    /// Collects emitted text; can be scripted to fail.
    #[derive(Default)]
    struct RecordingSink {
        texts: Mutex<Vec<String>>,
        failures: AtomicUsize,
        fail: std::sync::atomic::AtomicBool,
    }

    impl OutputSink for RecordingSink {
        fn emit(&self, text: &str) -> Result<()> {
            if self.fail.load(Ordering::Relaxed) {
                self.failures.fetch_add(1, Ordering::Relaxed);
                return Err(VoxkeyError::Output("scripted output failure".into()));
            }
            self.texts.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct Harness {
        controller: Arc<
            SessionController<MockCapture, ScriptedTranscription, RecordingNotifier, RecordingSink>,
        >,
        capture: Arc<MockCapture>,
        gateway: Arc<ScriptedTranscription>,
        notifier: Arc<RecordingNotifier>,
        sink: Arc<RecordingSink>,
        events: UnboundedSender<SessionEvent>,
        loop_handle: tokio::task::JoinHandle<()>,
    }

    fn harness() -> Harness {
        let capture = Arc::new(MockCapture::new());
        let gateway = Arc::new(ScriptedTranscription::new("hello world"));
        let notifier = Arc::new(RecordingNotifier::default());
        let sink = Arc::new(RecordingSink::default());

        let controller = Arc::new(SessionController::new(
            SessionConfig::default(),
            Arc::clone(&capture),
            Arc::clone(&gateway),
            Arc::clone(&notifier),
            Arc::clone(&sink),
        ));
        let events = controller.event_sender();
        let loop_handle = tokio::spawn(Arc::clone(&controller).run());

        Harness {
            controller,
            capture,
            gateway,
            notifier,
            sink,
            events,
            loop_handle,
        }
    }

    /// Poll until the condition holds or a bounded wait expires.
    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met within 2s");
    }

    #[tokio::test]
    async fn test_initial_state_is_idle() {
        let h = harness();
        assert_eq!(h.controller.current_state(), SessionState::Idle);
        h.events.send(SessionEvent::Shutdown).unwrap();
        h.loop_handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_hotkey_starts_recording() {
        let h = harness();
        h.events.send(SessionEvent::HotkeyPressed).unwrap();

        let notifier = Arc::clone(&h.notifier);
        wait_until(move || !notifier.phases.lock().unwrap().is_empty()).await;
        assert_eq!(h.controller.current_state(), SessionState::Recording);
        assert_eq!(h.capture.start_count(), 1);
        assert!(h.capture.is_active());
        assert_eq!(
            h.notifier.phases.lock().unwrap().as_slice(),
            &[SessionState::Recording]
        );
    }

    #[tokio::test]
    async fn test_full_toggle_cycle_delivers_text() {
        let h = harness();
        h.capture.set_stop_samples(vec![0.3; 16000]);

        h.events.send(SessionEvent::HotkeyPressed).unwrap();
        {
            let controller = Arc::clone(&h.controller);
            wait_until(move || controller.current_state() == SessionState::Recording).await;
        }

        h.events.send(SessionEvent::HotkeyPressed).unwrap();
        {
            let notifier = Arc::clone(&h.notifier);
            wait_until(move || notifier.phases.lock().unwrap().len() == 3).await;
        }

        assert_eq!(h.controller.current_state(), SessionState::Idle);
        assert_eq!(h.sink.texts.lock().unwrap().as_slice(), &["hello world"]);
        assert_eq!(h.gateway.call_count(), 1);
        let calls = h.gateway.calls();
        assert_eq!(calls[0].samples, 16000);
        assert_eq!(calls[0].sample_rate, SAMPLE_RATE);
        assert_eq!(calls[0].language.as_deref(), Some("nl"));
        assert_eq!(
            h.notifier.phases.lock().unwrap().as_slice(),
            &[
                SessionState::Recording,
                SessionState::Processing,
                SessionState::Idle
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_buffer_skips_gateway() {
        let h = harness();
        // MockCapture returns an empty buffer unless preloaded.
        h.events.send(SessionEvent::HotkeyPressed).unwrap();
        {
            let controller = Arc::clone(&h.controller);
            wait_until(move || controller.current_state() == SessionState::Recording).await;
        }

        h.events.send(SessionEvent::HotkeyPressed).unwrap();
        {
            let notifier = Arc::clone(&h.notifier);
            wait_until(move || notifier.phases.lock().unwrap().len() == 3).await;
        }

        assert_eq!(h.controller.current_state(), SessionState::Idle);
        assert_eq!(h.gateway.call_count(), 0);
        assert!(h.sink.texts.lock().unwrap().is_empty());
        // Still passed through Processing on the way back to Idle.
        assert_eq!(
            h.notifier.phases.lock().unwrap().as_slice(),
            &[
                SessionState::Recording,
                SessionState::Processing,
                SessionState::Idle
            ]
        );
    }

    #[tokio::test]
    async fn test_silence_signal_equivalent_to_toggle() {
        let h = harness();
        h.capture.set_stop_samples(vec![0.2; 1600]);

        h.events.send(SessionEvent::HotkeyPressed).unwrap();
        {
            let controller = Arc::clone(&h.controller);
            wait_until(move || controller.current_state() == SessionState::Recording).await;
        }

        h.events.send(SessionEvent::SilenceDetected).unwrap();
        {
            let controller = Arc::clone(&h.controller);
            wait_until(move || controller.current_state() == SessionState::Idle).await;
        }

        assert_eq!(h.gateway.call_count(), 1);
        assert_eq!(h.sink.texts.lock().unwrap().as_slice(), &["hello world"]);
    }

    #[tokio::test]
    async fn test_stale_silence_signal_is_ignored() {
        let h = harness();
        h.events.send(SessionEvent::SilenceDetected).unwrap();

        // Give the loop a moment; nothing should change.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.controller.current_state(), SessionState::Idle);
        assert_eq!(h.capture.start_count(), 0);
        assert!(h.notifier.phases.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hotkey_during_processing_is_noop() {
        let h = harness();
        h.capture.set_stop_samples(vec![0.3; 1600]);
        h.gateway.set_delay(Duration::from_millis(300));

        h.events.send(SessionEvent::HotkeyPressed).unwrap();
        {
            let controller = Arc::clone(&h.controller);
            wait_until(move || controller.current_state() == SessionState::Recording).await;
        }

        h.events.send(SessionEvent::HotkeyPressed).unwrap();
        {
            let controller = Arc::clone(&h.controller);
            wait_until(move || controller.current_state() == SessionState::Processing).await;
        }

        // Press again while the gateway is still working.
        h.events.send(SessionEvent::HotkeyPressed).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.controller.current_state(), SessionState::Processing);
        assert_eq!(h.capture.start_count(), 1);

        {
            let controller = Arc::clone(&h.controller);
            wait_until(move || controller.current_state() == SessionState::Idle).await;
        }
        // The swallowed press did not queue a second session.
        assert_eq!(h.capture.start_count(), 1);
        assert_eq!(h.gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_capture_start_failure_reverts_to_idle() {
        let h = harness();
        h.capture.fail_next_start();

        h.events.send(SessionEvent::HotkeyPressed).unwrap();
        {
            let notifier = Arc::clone(&h.notifier);
            wait_until(move || !notifier.messages.lock().unwrap().is_empty()).await;
        }

        assert_eq!(h.controller.current_state(), SessionState::Idle);
        // Exactly one failure notification.
        assert_eq!(
            h.notifier.messages.lock().unwrap().as_slice(),
            &["Recording failed"]
        );
        assert_eq!(
            h.notifier.phases.lock().unwrap().as_slice(),
            &[SessionState::Recording, SessionState::Idle]
        );

        // The controller recovers: the next hotkey starts a session.
        h.events.send(SessionEvent::HotkeyPressed).unwrap();
        let controller = Arc::clone(&h.controller);
        wait_until(move || controller.current_state() == SessionState::Recording).await;
        assert_eq!(h.capture.start_count(), 1);
    }

    #[tokio::test]
    async fn test_transcription_failure_still_returns_to_idle() {
        let h = harness();
        h.capture.set_stop_samples(vec![0.3; 1600]);
        h.gateway.fail();

        h.events.send(SessionEvent::HotkeyPressed).unwrap();
        {
            let controller = Arc::clone(&h.controller);
            wait_until(move || controller.current_state() == SessionState::Recording).await;
        }
        h.events.send(SessionEvent::HotkeyPressed).unwrap();
        {
            let controller = Arc::clone(&h.controller);
            wait_until(move || controller.current_state() == SessionState::Idle).await;
        }

        assert_eq!(h.gateway.call_count(), 1);
        assert!(h.sink.texts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_output_failure_does_not_affect_state() {
        let h = harness();
        h.capture.set_stop_samples(vec![0.3; 1600]);
        h.sink.fail.store(true, Ordering::Relaxed);

        h.events.send(SessionEvent::HotkeyPressed).unwrap();
        {
            let controller = Arc::clone(&h.controller);
            wait_until(move || controller.current_state() == SessionState::Recording).await;
        }
        h.events.send(SessionEvent::HotkeyPressed).unwrap();
        {
            let controller = Arc::clone(&h.controller);
            wait_until(move || controller.current_state() == SessionState::Idle).await;
        }

        assert_eq!(h.sink.failures.load(Ordering::Relaxed), 1);
        assert_eq!(h.controller.current_state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_stream_interruption_finalizes_session() {
        let h = harness();
        h.capture.set_stop_samples(vec![0.3; 1600]);

        h.events.send(SessionEvent::HotkeyPressed).unwrap();
        {
            let controller = Arc::clone(&h.controller);
            wait_until(move || controller.current_state() == SessionState::Recording).await;
        }

        // The mock forwards the interruption through the registered sink,
        // exercising the same path as a real cpal error callback.
        h.capture.interrupt("device unplugged");
        {
            let controller = Arc::clone(&h.controller);
            wait_until(move || controller.current_state() == SessionState::Idle).await;
        }

        // Whatever was captured got transcribed and delivered.
        assert_eq!(h.gateway.call_count(), 1);
        assert_eq!(h.sink.texts.lock().unwrap().as_slice(), &["hello world"]);
    }

    #[tokio::test]
    async fn test_shutdown_stops_active_capture() {
        let h = harness();
        h.events.send(SessionEvent::HotkeyPressed).unwrap();
        {
            let capture = Arc::clone(&h.capture);
            wait_until(move || capture.is_active()).await;
        }

        h.events.send(SessionEvent::Shutdown).unwrap();
        h.loop_handle.await.unwrap();

        assert!(!h.capture.is_active());
        assert_eq!(h.controller.current_state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_repeated_sessions() {
        let h = harness();

        for round in 0..3 {
            h.capture.set_stop_samples(vec![0.3; 1600]);
            h.events.send(SessionEvent::HotkeyPressed).unwrap();
            {
                let controller = Arc::clone(&h.controller);
                wait_until(move || controller.current_state() == SessionState::Recording).await;
            }
            h.events.send(SessionEvent::HotkeyPressed).unwrap();
            {
                let controller = Arc::clone(&h.controller);
                wait_until(move || controller.current_state() == SessionState::Idle).await;
            }
            assert_eq!(h.gateway.call_count(), round + 1);
        }

        assert_eq!(h.capture.start_count(), 3);
        assert_eq!(h.sink.texts.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_auto_detect_passes_no_language_hint() {
        let capture = Arc::new(MockCapture::new());
        let gateway = Arc::new(ScriptedTranscription::new("text"));
        let notifier = Arc::new(RecordingNotifier::default());
        let sink = Arc::new(RecordingSink::default());

        let config = SessionConfig {
            auto_detect_language: true,
            ..SessionConfig::default()
        };
        let controller = Arc::new(SessionController::new(
            config,
            Arc::clone(&capture),
            Arc::clone(&gateway),
            notifier,
            sink,
        ));
        let events = controller.event_sender();
        let handle = tokio::spawn(Arc::clone(&controller).run());

        capture.set_stop_samples(vec![0.3; 1600]);
        events.send(SessionEvent::HotkeyPressed).unwrap();
        {
            let controller = Arc::clone(&controller);
            wait_until(move || controller.current_state() == SessionState::Recording).await;
        }
        events.send(SessionEvent::HotkeyPressed).unwrap();
        {
            let gateway = Arc::clone(&gateway);
            wait_until(move || gateway.call_count() == 1).await;
        }

        assert_eq!(gateway.calls()[0].language, None);
        events.send(SessionEvent::Shutdown).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_session_chunk_sink_observes_monitor() {
        let monitor = Arc::new(SilenceMonitor::new(Duration::from_secs(5), 0.01));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = SessionChunkSink {
            monitor: Arc::clone(&monitor),
            events: tx,
        };

        let before = monitor.deadline();
        sink.chunk(&AudioChunk::new(vec![0.5; 160]));
        assert!(monitor.deadline() >= before);

        sink.interrupted("gone");
        match rx.try_recv() {
            Ok(SessionEvent::StreamInterrupted(reason)) => assert_eq!(reason, "gone"),
            other => panic!("expected StreamInterrupted, got {:?}", other),
        }
    }
}

//! Voxkey application binary - composition root.
//!
//! Ties the crates together into a single executable:
//! 1. Parse CLI args and initialize tracing
//! 2. Load configuration from TOML
//! 3. Verify the configured microphone, falling back to the default
//! 4. Build the capture, transcription, output, and tray services
//! 5. Register the global hotkey and run the session event loop
//!
//! Ctrl+C (and the tray Quit item on Windows) push a `Shutdown` event onto
//! the same channel every other event source uses.

mod cli;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, info, warn};

use voxkey_audio::{devices, MicCapture};
use voxkey_core::config::VoxkeyConfig;
use voxkey_core::error::Result;
use voxkey_output::TextDelivery;
use voxkey_session::{
    HotkeyConfig, HotkeyService, OutputSink, SessionController, SessionEvent, SessionState,
    UiNotifier,
};
use voxkey_stt::{WhisperConfig, WhisperService};
use voxkey_ui::{TrayMenuAction, TrayService, TrayState};

use cli::CliArgs;

/// Commands for the dedicated tray thread.
enum TrayCommand {
    SetState(TrayState),
}

/// Run the tray icon on its own thread.
///
/// `TrayIcon` must stay on the thread that created it, so state updates
/// arrive over a channel and Quit clicks go out through the session event
/// channel.
fn spawn_tray_thread(
    tooltip: String,
    rx: std::sync::mpsc::Receiver<TrayCommand>,
    events: tokio::sync::mpsc::UnboundedSender<SessionEvent>,
) {
    std::thread::spawn(move || {
        let mut tray = match TrayService::new(&tooltip) {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "Tray unavailable, continuing without it");
                return;
            }
        };

        loop {
            match rx.recv_timeout(Duration::from_millis(200)) {
                Ok(TrayCommand::SetState(state)) => {
                    if let Err(e) = tray.set_state(state) {
                        debug!(error = %e, "Failed to update tray state");
                    }
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => return,
            }

            if tray.poll_menu_event() == Some(TrayMenuAction::Quit) {
                info!("Quit selected from tray menu");
                let _ = events.send(SessionEvent::Shutdown);
                return;
            }
        }
    });
}

/// Bridges controller notifications to the tray thread (or plain logs when
/// running headless).
struct AppNotifier {
    tray_tx: Option<std::sync::mpsc::Sender<TrayCommand>>,
    show_notifications: bool,
}

impl AppNotifier {
    fn new(
        tray_tx: Option<std::sync::mpsc::Sender<TrayCommand>>,
        show_notifications: bool,
    ) -> Self {
        Self {
            tray_tx,
            show_notifications,
        }
    }
}

impl UiNotifier for AppNotifier {
    fn phase_changed(&self, phase: SessionState) {
        let state = match phase {
            SessionState::Idle => TrayState::Idle,
            SessionState::Recording => TrayState::Recording,
            SessionState::Processing => TrayState::Processing,
        };
        match self.tray_tx {
            Some(ref tx) => {
                let _ = tx.send(TrayCommand::SetState(state));
            }
            None => debug!(state = %state, "Session phase changed"),
        }
    }

    fn notify(&self, title: &str, message: &str) {
        if self.show_notifications {
            info!(title, message, "Notification");
        }
    }
}

/// Delivers transcribed text by typing, with clipboard fallback.
struct TypingSink {
    delivery: TextDelivery,
}

impl OutputSink for TypingSink {
    fn emit(&self, text: &str) -> Result<()> {
        self.delivery.deliver(text)
    }
}

/// Poll the global hotkey on a blocking thread and forward presses.
///
/// `HotkeyService` holds OS resources that are not `Send`-friendly, so the
/// whole lifetime of the service stays on one dedicated thread.
fn spawn_hotkey_listener(
    key: String,
    events: tokio::sync::mpsc::UnboundedSender<SessionEvent>,
    shutdown: Arc<AtomicBool>,
) {
    tokio::task::spawn_blocking(move || {
        let service = match HotkeyService::new(HotkeyConfig { key }) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "Failed to register global hotkey");
                return;
            }
        };

        while !shutdown.load(Ordering::Relaxed) {
            if service.was_pressed() {
                let _ = events.send(SessionEvent::HotkeyPressed);
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    });
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    if args.list_devices {
        for name in devices::list_input_devices()? {
            println!("{}", name);
        }
        return Ok(());
    }

    // Tracing first so config loading is visible.
    let default_level = args.resolve_log_level("info");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    info!("Starting Voxkey v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args.resolve_config_path();
    let mut config = VoxkeyConfig::load_or_default(&config_path);

    if let Some(mic) = args.microphone.clone() {
        config.audio.microphone = Some(mic);
    }

    // Tray command channel. The tray thread itself starts once the
    // controller's event sender exists.
    let tray_channel = if args.headless || !config.tray.show_icon {
        None
    } else {
        Some(std::sync::mpsc::channel::<TrayCommand>())
    };
    let (tray_tx, tray_rx) = match tray_channel {
        Some((tx, rx)) => (Some(tx), Some(rx)),
        None => (None, None),
    };
    let notifier = Arc::new(AppNotifier::new(tray_tx, config.tray.show_notifications));

    // Verify the configured microphone before the first session needs it.
    if let Some(name) = config.audio.microphone.clone() {
        if !devices::is_device_available(&name) {
            warn!(device = %name, "Configured microphone not found, using system default");
            notifier.notify(
                "Microphone not found",
                &format!("'{}' not available. Using system default.", name),
            );
            config.audio.microphone = None;
        }
    }

    // Transcription gateway. Loading the model can take a while.
    notifier.notify("Voxkey", "Loading speech model, please wait...");
    let gateway = Arc::new(WhisperService::new(WhisperConfig {
        model_path: config.transcription.model_path.clone(),
    })?);

    let capture = Arc::new(MicCapture::new(config.audio.clone()));
    let output = Arc::new(TypingSink {
        delivery: TextDelivery::new(config.output.prefer_clipboard),
    });

    let controller = Arc::new(SessionController::new(
        config.session.clone(),
        capture,
        gateway,
        Arc::clone(&notifier),
        output,
    ));
    let events = controller.event_sender();
    let run_handle = tokio::spawn(Arc::clone(&controller).run());

    // Event sources.
    let hotkey_shutdown = Arc::new(AtomicBool::new(false));
    spawn_hotkey_listener(
        config.session.hotkey.clone(),
        events.clone(),
        Arc::clone(&hotkey_shutdown),
    );

    if let Some(tray_rx) = tray_rx {
        spawn_tray_thread(
            format!("Voxkey - Press {} to dictate", config.session.hotkey),
            tray_rx,
            events.clone(),
        );
    }

    // Ctrl+C.
    {
        let events = events.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl+C received, shutting down");
                let _ = events.send(SessionEvent::Shutdown);
            }
        });
    }

    notifier.notify(
        "Voxkey ready",
        &format!("Press {} to start dictating", config.session.hotkey),
    );

    // The event loop runs until a Shutdown event arrives.
    run_handle.await?;
    hotkey_shutdown.store(true, Ordering::Relaxed);

    Ok(())
}

//! Application entry point — hold-to-speak translation, terminal host.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Warm the microphone reservoir off the async runtime.
//! 4. Build the HTTP transcription / translation clients from config.
//! 5. Spawn the [`SessionOrchestrator`] on the tokio runtime.
//! 6. Spawn the global hotkey listener thread.
//! 7. Render overlay events to the terminal until Ctrl-C.
//!
//! The terminal renderer is deliberately thin: any richer host (tray
//! widget, IPC bridge) wires the same signal channel in and the same event
//! channel out without touching pipeline code.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use voice_translate::{
    audio::{MicSource, MicrophoneReservoir},
    config::AppConfig,
    hotkey::{parse_key, HotkeyListener},
    pipeline::{new_shared_state, OverlayEvent, SessionOrchestrator},
    transcribe::HttpTranscriber,
    translate::HttpTranslator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voice-translate starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Warm microphone — first hold should pay no acquisition latency.
    let reservoir = Arc::new(MicrophoneReservoir::new());
    {
        let reservoir = Arc::clone(&reservoir);
        tokio::task::spawn_blocking(move || reservoir.warm_up());
    }

    // 4. Service clients
    let transcriber = Arc::new(HttpTranscriber::from_config(&config.service));
    let translator = Arc::new(HttpTranslator::from_config(
        &config.service,
        Duration::from_millis(config.recording.partial_emit_interval_ms),
    ));

    // 5. Orchestrator
    let (signal_tx, signal_rx) = mpsc::channel(16);
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let orchestrator = SessionOrchestrator::new(
        new_shared_state(),
        reservoir as Arc<dyn MicSource>,
        transcriber,
        translator,
        event_tx,
        &config,
    );
    tokio::spawn(orchestrator.run(signal_rx));

    // 6. Hotkey listener thread
    let key = parse_key(&config.hotkey.hold_to_speak_key).unwrap_or(rdev::Key::F9);
    let _hotkey = HotkeyListener::start(key, signal_tx);
    log::info!(
        "hold {} to speak ({} -> {})",
        config.hotkey.hold_to_speak_key,
        config.languages.source,
        config.languages.target
    );

    // 7. Render until Ctrl-C
    tokio::select! {
        _ = render_events(event_rx) => {}
        _ = tokio::signal::ctrl_c() => {
            log::info!("shutting down");
        }
    }

    Ok(())
}

/// Minimal terminal render sink for overlay events.
async fn render_events(mut events: mpsc::UnboundedReceiver<OverlayEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            OverlayEvent::Initializing => println!("starting microphone..."),
            OverlayEvent::RecordingStarted => println!("listening... (release to translate)"),
            OverlayEvent::RecordingTooShort => {
                println!("recording too short - hold the key longer");
            }
            OverlayEvent::NoSpeech => println!("no speech detected"),
            OverlayEvent::PopupPending => println!("translating..."),
            // The placeholder surface is already on screen in this host.
            OverlayEvent::PopupForced => {}
            OverlayEvent::Transcript { text } => println!("  you said: {text}"),
            OverlayEvent::PartialTranslation(t) => println!("  > {}", t.translation),
            OverlayEvent::FinalTranslation(t) => {
                println!("  = {}", t.translation);
                for example in &t.examples {
                    println!("    e.g. {example}");
                }
                if let Some(notes) = &t.notes {
                    println!("    note: {notes}");
                }
            }
            OverlayEvent::SessionFailed { message } => println!("  ! {message}"),
            OverlayEvent::Dismissed => {}
        }
    }
}

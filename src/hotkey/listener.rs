//! Dedicated OS-thread hotkey listener using `rdev::listen`.
//!
//! `rdev::listen` is a blocking call that must live on its own OS thread.
//! [`HotkeyListener`] owns that thread and a stop flag; dropping it sets
//! the flag so the callback silently ignores further events.
//!
//! # Shutdown caveat
//!
//! `rdev::listen` has **no graceful shutdown API**. Setting the stop flag
//! prevents signals from being forwarded, but the OS thread itself remains
//! blocked in the rdev event loop until the process exits. This is safe —
//! rdev holds no resources that need explicit cleanup.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::mpsc;

use crate::pipeline::SessionSignal;

// ---------------------------------------------------------------------------
// HotkeyListener
// ---------------------------------------------------------------------------

/// Handle to a running hotkey listener thread.
///
/// Construct one with [`HotkeyListener::start`]. Drop it to stop forwarding
/// signals.
pub struct HotkeyListener {
    /// Shared stop flag — set `true` on [`Drop`].
    stop: Arc<AtomicBool>,
    /// The thread handle. Kept alive so the thread is not detached
    /// prematurely; never joined because `rdev::listen` never returns.
    _thread: std::thread::JoinHandle<()>,
}

impl HotkeyListener {
    /// Spawn a dedicated OS thread that watches `key` and forwards
    /// [`SessionSignal::StartRecording`] on the press edge and
    /// [`SessionSignal::StopRecording`] on release.
    ///
    /// OS auto-repeat re-delivers the press event for as long as the key is
    /// held; a held-latch suppresses everything but the first edge, so the
    /// orchestrator sees exactly one start per physical press.
    ///
    /// # Arguments
    ///
    /// * `key` — the [`rdev::Key`] to watch. Use
    ///   [`crate::hotkey::parse_key`] to obtain this from a config string.
    /// * `tx`  — a `tokio::sync::mpsc` sender; the background thread uses
    ///   `blocking_send` so it works from a non-async context.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to create the thread (extremely unlikely).
    pub fn start(key: rdev::Key, tx: mpsc::Sender<SessionSignal>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("hotkey-listener".into())
            .spawn(move || {
                let mut held = false;
                let result = rdev::listen(move |event| {
                    if stop_flag.load(Ordering::Relaxed) {
                        return;
                    }

                    match event.event_type {
                        rdev::EventType::KeyPress(k) if k == key => {
                            if !held {
                                held = true;
                                let _ = tx.blocking_send(SessionSignal::StartRecording);
                            }
                        }
                        rdev::EventType::KeyRelease(k) if k == key => {
                            if held {
                                held = false;
                                let _ = tx.blocking_send(SessionSignal::StopRecording);
                            }
                        }
                        _ => {}
                    }
                });

                if let Err(e) = result {
                    log::error!("hotkey-listener: rdev::listen exited with error: {e:?}");
                }
            })
            .expect("failed to spawn hotkey-listener thread");

        Self {
            stop,
            _thread: thread,
        }
    }
}

impl Drop for HotkeyListener {
    /// Set the stop flag so the rdev callback stops forwarding signals.
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

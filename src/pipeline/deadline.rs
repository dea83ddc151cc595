//! Latency deadline for popup visibility.
//!
//! Network variance for transcription and translation cannot be bounded,
//! but the time between "user released the key" and "something is on
//! screen" must be. [`LatencyGuard`] is that bound: armed on release, it
//! forces the result surface visible after a fixed deadline unless real
//! content (or a terminal outcome) disarmed it first.
//!
//! This is a UI-visibility deadline, not a network timeout — in-flight
//! calls keep running and their results still land on the already-visible
//! surface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// LatencyGuard
// ---------------------------------------------------------------------------

/// One-shot deadline timer, cheap to clone across tasks.
///
/// Lifecycle per session: [`reset`](Self::reset) → [`arm`](Self::arm) →
/// (fires or [`disarm`](Self::disarm)). Once armed — fired or not —
/// re-arming is a no-op until the next `reset`, so a duplicate release
/// signal can never schedule a second callback.
#[derive(Clone)]
pub struct LatencyGuard {
    deadline: Duration,
    inner: Arc<Mutex<Option<ArmedTimer>>>,
}

struct ArmedTimer {
    disarmed: Arc<AtomicBool>,
    fired: Arc<AtomicBool>,
    handle: tokio::task::JoinHandle<()>,
}

impl LatencyGuard {
    /// Create a guard with the given deadline.
    pub fn new(deadline: Duration) -> Self {
        Self {
            deadline,
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the one-shot timer. `on_forced` runs exactly once when the
    /// deadline elapses without a prior [`disarm`](Self::disarm).
    ///
    /// No-op when already armed this session.
    pub fn arm(&self, on_forced: impl FnOnce() + Send + 'static) {
        let Ok(mut slot) = self.inner.lock() else {
            return;
        };
        if slot.is_some() {
            return;
        }

        let disarmed = Arc::new(AtomicBool::new(false));
        let fired = Arc::new(AtomicBool::new(false));
        let task_disarmed = Arc::clone(&disarmed);
        let task_fired = Arc::clone(&fired);
        let deadline = self.deadline;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            if task_disarmed.load(Ordering::SeqCst) {
                return;
            }
            // swap guarantees the callback cannot run twice.
            if !task_fired.swap(true, Ordering::SeqCst) {
                on_forced();
            }
        });

        *slot = Some(ArmedTimer {
            disarmed,
            fired,
            handle,
        });
    }

    /// Cancel the pending timer. Idempotent; calling after the timer has
    /// already fired is a harmless no-op.
    pub fn disarm(&self) {
        let Ok(slot) = self.inner.lock() else {
            return;
        };
        if let Some(timer) = slot.as_ref() {
            timer.disarmed.store(true, Ordering::SeqCst);
            timer.handle.abort();
        }
    }

    /// `true` once the deadline elapsed and the callback ran.
    pub fn has_fired(&self) -> bool {
        self.inner
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|t| t.fired.load(Ordering::SeqCst)))
            .unwrap_or(false)
    }

    /// Clear the armed/fired record so the next session can arm again.
    pub fn reset(&self) {
        self.disarm();
        if let Ok(mut slot) = self.inner.lock() {
            *slot = None;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Warm microphone reservoir.
//!
//! Device acquisition is the slowest step between "key pressed" and "audio
//! flowing" — on some platforms it also raises a permission prompt. The
//! reservoir pays that cost once: the first acquisition starts the cpal
//! stream on a dedicated thread and keeps it alive for the life of the
//! process with its gate closed. Later sessions only flip the gate.
//!
//! The trade-off is deliberate: the OS capture indicator may stay lit
//! between sessions, because the hardware stream is muted, not stopped.
//!
//! [`MicSource`] is the seam the rest of the pipeline sees; production code
//! injects a [`MicrophoneReservoir`], tests inject a fake.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use async_trait::async_trait;

use crate::audio::capture::{AudioCapture, AudioChunk, CaptureError, SharedSink};

// ---------------------------------------------------------------------------
// MicSource
// ---------------------------------------------------------------------------

/// Source of microphone leases.
///
/// Implementations must be `Send + Sync` so they can be shared as
/// `Arc<dyn MicSource>` between the orchestrator and a startup warm-up task.
#[async_trait]
pub trait MicSource: Send + Sync {
    /// Pre-acquire the device so the first real session starts instantly.
    ///
    /// Idempotent. Failures are swallowed — microphone access is optional
    /// until someone actually records, at which point [`acquire`] surfaces
    /// the error.
    ///
    /// This call blocks while the device opens; run it off the async
    /// runtime (startup thread or blocking pool).
    ///
    /// [`acquire`]: MicSource::acquire
    fn warm_up(&self);

    /// Open the capture gate and return a lease delivering audio chunks.
    ///
    /// Instant when the reservoir is already warm; a cold first call pushes
    /// the device acquisition onto the blocking pool.
    ///
    /// # Errors
    ///
    /// [`CaptureError::NoDevice`] or [`CaptureError::PermissionDenied`] when
    /// the platform refuses a device.
    async fn acquire(&self) -> Result<MicLease, CaptureError>;
}

// ---------------------------------------------------------------------------
// MicLease
// ---------------------------------------------------------------------------

/// Exclusive borrow of the warm stream for one recording session.
///
/// While the lease is alive the gate is open and chunks accumulate in its
/// channel. Dropping (or [`release`](Self::release)-ing) the lease closes
/// the gate and detaches the channel — the hardware stream itself stays
/// warm for the next session.
pub struct MicLease {
    rx: mpsc::Receiver<AudioChunk>,
    gate: Arc<AtomicBool>,
    sink: SharedSink,
}

impl MicLease {
    fn new(rx: mpsc::Receiver<AudioChunk>, gate: Arc<AtomicBool>, sink: SharedSink) -> Self {
        Self { rx, gate, sink }
    }

    /// Take every chunk buffered so far, in arrival order.
    pub fn drain(&self) -> Vec<AudioChunk> {
        let mut chunks = Vec::new();
        while let Ok(chunk) = self.rx.try_recv() {
            chunks.push(chunk);
        }
        chunks
    }

    /// Close the gate and return the stream to the reservoir.
    ///
    /// Equivalent to dropping the lease; named for call sites where the
    /// hand-back should be visible.
    pub fn release(self) {}
}

impl Drop for MicLease {
    fn drop(&mut self) {
        self.gate.store(false, Ordering::Release);
        if let Ok(mut sink) = self.sink.lock() {
            *sink = None;
        }
    }
}

// ---------------------------------------------------------------------------
// MicrophoneReservoir
// ---------------------------------------------------------------------------

/// Process-wide owner of the warm cpal stream.
///
/// The `cpal::Stream` is not `Send`, so it lives on a dedicated
/// `mic-reservoir` thread that parks forever once the stream is running;
/// the reservoir only holds the shared gate and sink the stream's callback
/// reads. The thread exists until the process exits — that is the point of
/// a warm stream.
pub struct MicrophoneReservoir {
    warm: Mutex<Option<WarmHandle>>,
}

/// Shared state of a running warm stream.
struct WarmHandle {
    gate: Arc<AtomicBool>,
    sink: SharedSink,
    sample_rate: u32,
    channels: u16,
}

impl MicrophoneReservoir {
    /// Create an empty (cold) reservoir.
    pub fn new() -> Self {
        Self {
            warm: Mutex::new(None),
        }
    }

    /// Start the capture thread and wait for it to report readiness.
    fn spawn_warm() -> Result<WarmHandle, CaptureError> {
        let gate = Arc::new(AtomicBool::new(false));
        let sink: SharedSink = Arc::new(Mutex::new(None));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(u32, u16), CaptureError>>();

        let thread_gate = Arc::clone(&gate);
        let thread_sink = Arc::clone(&sink);

        std::thread::Builder::new()
            .name("mic-reservoir".into())
            .spawn(move || {
                let outcome = AudioCapture::open().and_then(|capture| {
                    let meta = (capture.sample_rate(), capture.channels());
                    capture
                        .start_gated(thread_gate, thread_sink)
                        .map(|handle| (handle, meta))
                });

                match outcome {
                    Ok((handle, meta)) => {
                        let _ = ready_tx.send(Ok(meta));
                        // Hold the stream for the life of the process.
                        let _keep_alive = handle;
                        loop {
                            std::thread::park();
                        }
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        let (sample_rate, channels) = ready_rx.recv().map_err(|_| {
            CaptureError::Stream("microphone thread exited before reporting readiness".into())
        })??;

        Ok(WarmHandle {
            gate,
            sink,
            sample_rate,
            channels,
        })
    }

    /// Open a lease against the warm stream, if there is one.
    fn try_lease(&self) -> Option<MicLease> {
        let warm = self.warm.lock().ok()?;
        let handle = warm.as_ref()?;

        // Install the session channel before opening the gate so no chunk
        // can arrive with nowhere to go.
        let (tx, rx) = mpsc::channel();
        if let Ok(mut sink) = handle.sink.lock() {
            *sink = Some(tx);
        }
        handle.gate.store(true, Ordering::Release);

        Some(MicLease::new(
            rx,
            Arc::clone(&handle.gate),
            Arc::clone(&handle.sink),
        ))
    }
}

impl Default for MicrophoneReservoir {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MicSource for MicrophoneReservoir {
    fn warm_up(&self) {
        {
            let Ok(warm) = self.warm.lock() else {
                return;
            };
            if warm.is_some() {
                return;
            }
        }
        match Self::spawn_warm() {
            Ok(handle) => {
                log::info!(
                    "microphone warm ({} Hz, {} ch)",
                    handle.sample_rate,
                    handle.channels
                );
                if let Ok(mut warm) = self.warm.lock() {
                    if warm.is_none() {
                        *warm = Some(handle);
                    }
                }
            }
            Err(e) => {
                // Not fatal at startup; acquire() will retry and surface it.
                log::debug!("microphone warm-up failed: {e}");
            }
        }
    }

    async fn acquire(&self) -> Result<MicLease, CaptureError> {
        // Warm path: just flip the gate.
        if let Some(lease) = self.try_lease() {
            return Ok(lease);
        }

        // Cold path: device acquisition blocks, so it runs on the blocking
        // pool rather than stalling the signal loop.
        let handle = tokio::task::spawn_blocking(Self::spawn_warm)
            .await
            .map_err(|e| CaptureError::Stream(e.to_string()))??;

        if let Ok(mut warm) = self.warm.lock() {
            if warm.is_none() {
                *warm = Some(handle);
            }
        }

        self.try_lease()
            .ok_or_else(|| CaptureError::Stream("reservoir unexpectedly empty".into()))
    }
}

// ---------------------------------------------------------------------------
// FakeMic  (test-only)
// ---------------------------------------------------------------------------

/// Test double that hands out leases pre-loaded with canned audio, or fails
/// with a configured error.
#[cfg(test)]
pub struct FakeMic {
    chunks: Vec<AudioChunk>,
    fail_with: Option<CaptureError>,
    acquires: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl FakeMic {
    /// A mic whose next lease already contains `chunks`.
    pub fn with_audio(chunks: Vec<AudioChunk>) -> Self {
        Self {
            chunks,
            fail_with: None,
            acquires: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Convenience: `secs` seconds of 16 kHz mono silence.
    pub fn with_seconds(secs: f32) -> Self {
        let n = (secs * 16_000.0) as usize;
        Self::with_audio(vec![AudioChunk {
            samples: vec![0.0; n],
            sample_rate: 16_000,
            channels: 1,
        }])
    }

    /// A mic whose every acquisition fails with `err`.
    pub fn failing(err: CaptureError) -> Self {
        Self {
            chunks: Vec::new(),
            fail_with: Some(err),
            acquires: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// How many successful acquisitions were made.
    pub fn acquire_count(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl MicSource for FakeMic {
    fn warm_up(&self) {}

    async fn acquire(&self) -> Result<MicLease, CaptureError> {
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        self.acquires.fetch_add(1, Ordering::SeqCst);

        let gate = Arc::new(AtomicBool::new(true));
        let sink: SharedSink = Arc::new(Mutex::new(None));
        let (tx, rx) = mpsc::channel();
        for chunk in &self.chunks {
            let _ = tx.send(chunk.clone());
        }
        *sink.lock().unwrap() = Some(tx);

        Ok(MicLease::new(rx, gate, sink))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

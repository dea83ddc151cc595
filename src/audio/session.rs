//! A single hold-to-speak recording session.
//!
//! [`RecordingSession`] owns the microphone lease for one press-to-release
//! cycle and enforces the two "was that a real recording?" guards before
//! anything is uploaded:
//!
//! * **duration** — releases under the minimum hold time are discarded, and
//! * **payload size** — a long-enough hold that still produced almost no
//!   audio (dead device, muted input) is discarded too.
//!
//! # State machine
//!
//! ```text
//! Idle ──start()──▶ Initializing ──device ready──▶ Recording
//!                        │ device error                │ stop()
//!                        ▼                             ▼
//!                      Idle            ┌─────────┬──────────────┐
//!                                      ▼         ▼              ▼
//!                                  TooShort  Finalizing ──▶  Idle
//!                                      │ reset (display window)
//!                                      ▼
//!                                    Idle
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::capture::{AudioChunk, CaptureError};
use crate::audio::pcm::{downmix_mono, resample, TARGET_SAMPLE_RATE};
use crate::audio::reservoir::{MicLease, MicSource};
use crate::audio::wav::{encode_wav, AudioPayload};
use crate::config::RecordingConfig;

// ---------------------------------------------------------------------------
// RecordingState
// ---------------------------------------------------------------------------

/// Phase of the current (or absent) recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    /// No session in progress.
    Idle,
    /// Waiting on device acquisition.
    Initializing,
    /// Gate open, audio accumulating.
    Recording,
    /// The last stop was rejected by a guard; showing "hold longer".
    TooShort,
    /// Assembling the upload payload.
    Finalizing,
}

// ---------------------------------------------------------------------------
// StopOutcome
// ---------------------------------------------------------------------------

/// Result of stopping a recording session.
#[derive(Debug)]
pub enum StopOutcome {
    /// Rejected by the duration or payload-size guard. Expected outcome,
    /// not an error — the user simply needs to hold longer.
    TooShort,
    /// A finalized payload ready for transcription.
    Finalized(AudioPayload),
    /// Payload assembly failed.
    Failed(String),
}

// ---------------------------------------------------------------------------
// RecordingSession
// ---------------------------------------------------------------------------

/// Owns one press-to-release capture cycle.
pub struct RecordingSession {
    state: RecordingState,
    lease: Option<MicLease>,
    started_at: Option<Instant>,
    min_duration: Duration,
    min_payload_bytes: usize,
}

impl RecordingSession {
    /// Create an idle session with guards taken from `config`.
    pub fn new(config: &RecordingConfig) -> Self {
        Self {
            state: RecordingState::Idle,
            lease: None,
            started_at: None,
            min_duration: Duration::from_millis(config.min_duration_ms),
            min_payload_bytes: config.min_payload_bytes,
        }
    }

    /// Current session phase.
    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// `true` while audio is actively accumulating.
    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    /// Begin recording by leasing the microphone from `mic`.
    ///
    /// Returns `Ok(true)` when recording started, `Ok(false)` when the call
    /// was ignored because a session is already active (at most one session
    /// records at a time).
    ///
    /// A cold reservoir makes acquisition slow, so the caller should have
    /// signalled an "initializing" UI state before awaiting this.
    ///
    /// # Errors
    ///
    /// Propagates [`CaptureError`] from acquisition; the session returns to
    /// [`RecordingState::Idle`].
    pub async fn start(&mut self, mic: Arc<dyn MicSource>) -> Result<bool, CaptureError> {
        if !matches!(self.state, RecordingState::Idle | RecordingState::TooShort) {
            log::debug!("recording start ignored: session already active");
            return Ok(false);
        }

        self.state = RecordingState::Initializing;

        match mic.acquire().await {
            Ok(lease) => {
                self.lease = Some(lease);
                self.started_at = Some(Instant::now());
                self.state = RecordingState::Recording;
                Ok(true)
            }
            Err(e) => {
                self.state = RecordingState::Idle;
                Err(e)
            }
        }
    }

    /// Stop recording and finalize the payload.
    ///
    /// Returns `None` when no recording was in progress (the lease is gone
    /// or start never completed). The microphone lease is always released
    /// back to the reservoir, whatever the outcome.
    pub fn stop(&mut self) -> Option<StopOutcome> {
        let lease = self.lease.take()?;
        let held = self
            .started_at
            .take()
            .map(|t| t.elapsed())
            .unwrap_or_default();

        let chunks = lease.drain();
        lease.release();

        if held < self.min_duration {
            log::debug!("recording rejected: held {}ms", held.as_millis());
            self.state = RecordingState::TooShort;
            return Some(StopOutcome::TooShort);
        }

        self.state = RecordingState::Finalizing;
        let outcome = match Self::finalize(chunks) {
            Ok(payload) if payload.len() < self.min_payload_bytes => {
                // Duration alone is not a reliable proxy for enough audio.
                log::debug!("recording rejected: payload {} bytes", payload.len());
                self.state = RecordingState::TooShort;
                StopOutcome::TooShort
            }
            Ok(payload) => {
                self.state = RecordingState::Idle;
                StopOutcome::Finalized(payload)
            }
            Err(e) => {
                self.state = RecordingState::Idle;
                StopOutcome::Failed(e.to_string())
            }
        };

        Some(outcome)
    }

    /// Clear the `TooShort` display state after its window elapses.
    pub fn reset_too_short(&mut self) {
        if self.state == RecordingState::TooShort {
            self.state = RecordingState::Idle;
        }
    }

    /// Downmix, resample to 16 kHz and encode the accumulated chunks.
    fn finalize(chunks: Vec<AudioChunk>) -> Result<AudioPayload, hound::Error> {
        // All chunks come from one device, so format is uniform; take it
        // from the first chunk and resample the concatenation in one pass.
        let (rate, channels) = chunks
            .first()
            .map(|c| (c.sample_rate, c.channels))
            .unwrap_or((TARGET_SAMPLE_RATE, 1));

        let mut samples = Vec::new();
        for chunk in &chunks {
            samples.extend_from_slice(&chunk.samples);
        }

        let mono = downmix_mono(&samples, channels);
        let mono_16k = resample(&mono, rate, TARGET_SAMPLE_RATE);
        encode_wav(&mono_16k)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

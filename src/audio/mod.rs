//! Audio subsystem — warm microphone capture → per-session buffering →
//! finalized upload payload.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback ──(gate open?)──▶ AudioChunk (mpsc)
//!            → RecordingSession buffer → downmix_mono → resample
//!            → WAV payload → transcription upload
//! ```
//!
//! The cpal stream is owned by [`MicrophoneReservoir`] and stays alive
//! between sessions with its gate closed, so a new recording never pays
//! device-acquisition latency twice. Sessions borrow a [`MicLease`] that
//! opens the gate and closes it again on drop.

pub mod capture;
pub mod pcm;
pub mod reservoir;
pub mod session;
pub mod wav;

pub use capture::{AudioCapture, AudioChunk, CaptureError, SharedSink, StreamHandle};
pub use pcm::{downmix_mono, resample, TARGET_SAMPLE_RATE};
pub use reservoir::{MicLease, MicSource, MicrophoneReservoir};
pub use session::{RecordingSession, RecordingState, StopOutcome};
pub use wav::{encode_wav, AudioPayload, WAV_MIME};

// test-only re-export so pipeline tests can import FakeMic without the full
// module path.
#[cfg(test)]
pub use reservoir::FakeMic;

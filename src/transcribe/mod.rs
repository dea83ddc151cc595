//! Speech-to-text over the hosted transcription endpoint.
//!
//! [`Transcriber`] is the seam the orchestrator talks to; [`HttpTranscriber`]
//! is the production implementation (one multipart upload per finalized
//! recording).
//!
//! A successful response is not necessarily usable speech: services report
//! silence and noise as bracketed annotations like `[silence]` or
//! `[no audio detected]`. [`Transcript::is_speech`] separates that soft
//! "nothing to translate" outcome from hard transport failures.

pub mod client;

pub use client::HttpTranscriber;

use async_trait::async_trait;
use thiserror::Error;

use crate::audio::AudioPayload;

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

/// Recognized text for one recording, produced at most once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    /// Whitespace-trimmed service output. May be empty.
    pub text: String,
}

impl Transcript {
    /// Wrap raw service output, trimming surrounding whitespace.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into().trim().to_string(),
        }
    }

    /// `false` when the result is empty or a bracket-only non-speech
    /// annotation — the caller must not translate such a result.
    pub fn is_speech(&self) -> bool {
        !self.text.is_empty() && !is_non_speech_annotation(&self.text)
    }
}

/// Bracket-only annotations (`[silence]`, `[no audio detected]`, `[ปรบมือ]`)
/// mark audio events, not speech.
fn is_non_speech_annotation(text: &str) -> bool {
    let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) else {
        return false;
    };
    // Brackets inside the body mean this is real text that merely starts
    // and ends with annotations, e.g. "[um] hello [cough]".
    !inner.contains(['[', ']'])
}

// ---------------------------------------------------------------------------
// TranscribeError
// ---------------------------------------------------------------------------

/// Transcription failure.
///
/// Transport errors, non-2xx statuses and service-reported error strings
/// all collapse into this one kind — the user remedy is identical (try
/// again), and retry policy belongs to the caller.
#[derive(Debug, Clone, Error)]
#[error("transcription failed: {reason}")]
pub struct TranscribeError {
    /// Diagnostic detail, for logs rather than the user.
    pub reason: String,
}

impl TranscribeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Transcriber trait
// ---------------------------------------------------------------------------

/// Async interface to a speech-to-text capability.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn Transcriber>`. The payload must be non-empty — the recording
/// session's size guard runs before this is called. Callers must not issue
/// a second call while one is pending.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Submit `payload` and return the recognized transcript.
    async fn transcribe(&self, payload: &AudioPayload) -> Result<Transcript, TranscribeError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

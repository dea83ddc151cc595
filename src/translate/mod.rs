//! Translation over the hosted endpoint, with streaming partial results.
//!
//! The service answers a translation request in one of two shapes and the
//! client must cope with both:
//!
//! 1. a single JSON body, parsed directly, or
//! 2. a server-sent-events stream of content deltas that concatenate into
//!    that same JSON — scraped for partial text while incomplete, strictly
//!    parsed once the stream ends.
//!
//! [`Translator`] is the seam the orchestrator talks to; [`HttpTranslator`]
//! is the production implementation. Partial results flow through an
//! optional callback so the popup can render text while tokens are still
//! arriving.

pub mod client;
pub mod partial;

pub use client::HttpTranslator;
pub use partial::{extract_string_field, PartialEmitter};

use async_trait::async_trait;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Translation
// ---------------------------------------------------------------------------

/// One translation result — partial while streaming, final exactly once.
///
/// Zero or more partials (`is_final == false`) precede exactly one final
/// emission, or the request ends in an error with no final at all. Each
/// partial replaces the previous one wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Translated text. Grows as stream deltas arrive.
    pub translation: String,
    /// Echo of the recognized source phrase, when the service provides one.
    pub original_phrase: Option<String>,
    /// Usage examples attached to the final result.
    pub examples: Vec<String>,
    /// Free-form usage notes attached to the final result.
    pub notes: Option<String>,
    /// `true` only on the last emission of a request.
    pub is_final: bool,
}

// ---------------------------------------------------------------------------
// TranslateRequest
// ---------------------------------------------------------------------------

/// Input to one translation call.
///
/// Language codes are passed through verbatim; the service decides what it
/// accepts.
#[derive(Debug, Clone)]
pub struct TranslateRequest {
    /// Text to translate. Must be non-empty after trimming.
    pub text: String,
    /// Optional surrounding context for disambiguation.
    pub context: Option<String>,
    /// Language the text is in.
    pub source_language: String,
    /// Language to translate into.
    pub target_language: String,
}

// ---------------------------------------------------------------------------
// TranslateError
// ---------------------------------------------------------------------------

/// Errors from a translation call.
///
/// Rate-limit and quota exhaustion are separated from generic failure so
/// the UI can word them differently; everything is a single attempt with no
/// automatic retry.
#[derive(Debug, Clone, Error)]
pub enum TranslateError {
    /// The input text was empty — rejected locally, nothing was sent.
    #[error("nothing to translate")]
    EmptyText,

    /// HTTP 429 from the service.
    #[error("rate limited by the translation service")]
    RateLimited,

    /// HTTP 402 from the service.
    #[error("translation quota exhausted")]
    QuotaExceeded,

    /// The stream completed but its content never parsed and no usable
    /// partial text had been extracted either.
    #[error("translation stream ended without usable content: {0}")]
    StreamParse(String),

    /// Transport failure, other non-2xx status, or a service-reported
    /// error string.
    #[error("translation failed: {0}")]
    Failed(String),
}

// ---------------------------------------------------------------------------
// Translator trait
// ---------------------------------------------------------------------------

/// Callback invoked with throttled partial results while a stream is live.
pub type PartialSink<'a> = &'a (dyn Fn(Translation) + Send + Sync);

/// Async interface to a translation capability.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn Translator>`.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `request.text`, invoking `on_partial` with intermediate
    /// results when the service streams, and return the final result.
    async fn translate(
        &self,
        request: &TranslateRequest,
        on_partial: Option<PartialSink<'_>>,
    ) -> Result<Translation, TranslateError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translator_is_object_safe() {
        fn _takes(_t: Box<dyn Translator>) {}
    }

    #[test]
    fn errors_have_distinct_messages() {
        let rate = TranslateError::RateLimited.to_string();
        let quota = TranslateError::QuotaExceeded.to_string();
        let generic = TranslateError::Failed("HTTP 500".into()).to_string();
        assert_ne!(rate, quota);
        assert_ne!(rate, generic);
        assert_ne!(quota, generic);
    }
}

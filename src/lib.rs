//! Hold-to-speak translation pipeline.
//!
//! Press and hold a hotkey, speak, release — a translated popup shows up
//! within a bounded delay, streaming partial text while the full answer is
//! still in flight.
//!
//! # Architecture
//!
//! ```text
//! hotkey / host signal
//!   └─▶ SessionOrchestrator
//!         ├─▶ RecordingSession ──▶ MicrophoneReservoir (warm cpal stream)
//!         ├─▶ Transcriber       (multipart upload → text)
//!         ├─▶ Translator        (JSON or SSE stream → Translation)
//!         └─▶ LatencyGuard      (popup visible ≤ deadline after release)
//! ```
//!
//! The orchestrator owns the only mutable session state; hosts drive it with
//! [`pipeline::SessionSignal`]s and render from [`pipeline::SharedState`] or
//! the [`pipeline::OverlayEvent`] channel. Service clients sit behind the
//! [`transcribe::Transcriber`] and [`translate::Translator`] traits so tests
//! (and alternative backends) can swap them out.

pub mod audio;
pub mod config;
pub mod hotkey;
pub mod pipeline;
pub mod transcribe;
pub mod translate;

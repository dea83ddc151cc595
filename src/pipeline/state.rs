//! Overlay state machine and shared session state.
//!
//! [`OverlayPhase`] drives the orchestrator's state machine; host shells
//! read it via [`SharedState`] to render the overlay. [`OverlayState`] is
//! the single source of truth: phase, popup stage, transcript, the
//! (possibly partial) translation, and any status or error message.

use std::sync::{Arc, Mutex};

use crate::translate::Translation;

// ---------------------------------------------------------------------------
// OverlayPhase
// ---------------------------------------------------------------------------

/// Phases of a voice-translation session.
///
/// ```text
/// Idle ──hotkey press──▶ Initializing ──device ready──▶ Recording
///      ──hotkey release─▶ Transcribing ──speech──▶ Translating
///                              │ non-speech / too short        │ final or error
///                              ▼                               ▼
///                            Idle                         ResultShown
/// ResultShown ──dismiss / next press──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayPhase {
    /// Waiting for the user to hold the hotkey.
    Idle,
    /// Device acquisition in progress; shown immediately so a slow
    /// microphone start is visible.
    Initializing,
    /// Gate open, audio accumulating.
    Recording,
    /// Upload sent, waiting for recognized text.
    Transcribing,
    /// Text sent, translation streaming or pending.
    Translating,
    /// The final result (or an error) is on screen until dismissed.
    ResultShown,
}

impl OverlayPhase {
    /// `true` while a session is in flight. New start signals are ignored
    /// while busy — there is never more than one session at a time.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            OverlayPhase::Initializing
                | OverlayPhase::Recording
                | OverlayPhase::Transcribing
                | OverlayPhase::Translating
        )
    }

    /// A short human-readable label for the overlay's status line.
    pub fn label(&self) -> &'static str {
        match self {
            OverlayPhase::Idle => "Idle",
            OverlayPhase::Initializing => "Starting…",
            OverlayPhase::Recording => "Listening…",
            OverlayPhase::Transcribing => "Transcribing…",
            OverlayPhase::Translating => "Translating…",
            OverlayPhase::ResultShown => "Done",
        }
    }
}

impl Default for OverlayPhase {
    fn default() -> Self {
        OverlayPhase::Idle
    }
}

// ---------------------------------------------------------------------------
// PopupStage
// ---------------------------------------------------------------------------

/// Visibility of the result surface.
///
/// `Pending` is entered the instant the hotkey is released; promotion to
/// `Visible` happens when content arrives or when the latency deadline
/// forces it — whichever comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupStage {
    /// Not on screen.
    Hidden,
    /// Requested, rendering a placeholder while results are in flight.
    Pending,
    /// On screen, showing whatever content exists so far.
    Visible,
}

impl Default for PopupStage {
    fn default() -> Self {
        PopupStage::Hidden
    }
}

// ---------------------------------------------------------------------------
// OverlayState
// ---------------------------------------------------------------------------

/// Shared session state — what a host shell renders.
///
/// Held behind [`SharedState`] (`Arc<Mutex<OverlayState>>`). The
/// orchestrator and its timers mutate it; hosts read it. Lock for short
/// critical sections only and never across `.await` points.
#[derive(Debug, Default)]
pub struct OverlayState {
    /// Current phase of the session state machine.
    pub phase: OverlayPhase,

    /// Result surface visibility.
    pub popup: PopupStage,

    /// Recognized text for the current session, once transcription is done.
    pub transcript: Option<String>,

    /// Latest translation — partial while streaming, final when
    /// `translation.is_final` is set.
    pub translation: Option<Translation>,

    /// Transient feedback ("hold longer", "no speech detected"); cleared
    /// automatically after a short display window.
    pub status_message: Option<String>,

    /// User-facing failure message when a session failed.
    pub error_message: Option<String>,

    /// Monotonically increasing session counter. Results stamped with an
    /// older value are stale and must not touch this state.
    pub session_seq: u64,
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`OverlayState`]. Cheap to clone.
pub type SharedState = Arc<Mutex<OverlayState>>;

/// Construct a new [`SharedState`] with default (idle) contents.
pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(OverlayState::default()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

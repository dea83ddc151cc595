//! Session pipeline — signals in, visible overlay state out.
//!
//! [`SessionOrchestrator`] is the state machine tying capture,
//! transcription, translation and the latency deadline together. Hosts
//! feed it [`SessionSignal`]s (from a hotkey listener, an IPC bridge, or a
//! test) and render from [`SharedState`] or the [`OverlayEvent`] stream —
//! one pipeline implementation, host-specific adapters around it.

pub mod deadline;
pub mod orchestrator;
pub mod state;

pub use deadline::LatencyGuard;
pub use orchestrator::{OverlayEvent, SessionOrchestrator, SessionSignal};
pub use state::{new_shared_state, OverlayPhase, OverlayState, PopupStage, SharedState};

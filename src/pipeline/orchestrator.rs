//! Session orchestrator — drives hold-to-speak → transcribe → translate.
//!
//! [`SessionOrchestrator`] owns the [`SharedState`] and responds to
//! [`SessionSignal`]s received over a `tokio::sync::mpsc` channel.
//!
//! # Session flow
//!
//! ```text
//! SessionSignal::StartRecording
//!   └─▶ phase = Initializing (shown before device work), lease microphone,
//!       phase = Recording
//!
//! SessionSignal::StopRecording
//!   └─▶ popup = Pending, arm LatencyGuard          [before any async work]
//!       session.stop()
//!         ├─ TooShort  → "hold longer", auto-reset              [Idle]
//!         └─ payload   → spawn request task                     [Transcribing]
//!              └─▶ transcribe
//!                    ├─ non-speech → dismiss popup, auto-reset  [Idle]
//!                    ├─ error      → dismiss popup, message     [Idle]
//!                    └─ text       → translate                  [Translating]
//!                          ├─ partials → popup text updates in place
//!                          └─ final / error                     [ResultShown]
//! ```
//!
//! The request task is stamped with a session sequence number; anything it
//! reports after a newer session has started is dropped rather than
//! cancelled — there is no aborting an in-flight service call, only
//! ignoring its late results.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::audio::{AudioPayload, CaptureError, MicSource, RecordingSession, StopOutcome};
use crate::config::{AppConfig, LanguageConfig};
use crate::pipeline::deadline::LatencyGuard;
use crate::pipeline::state::{OverlayPhase, PopupStage, SharedState};
use crate::transcribe::Transcriber;
use crate::translate::{TranslateError, TranslateRequest, Translation, Translator};

// ---------------------------------------------------------------------------
// Signals and events
// ---------------------------------------------------------------------------

/// Abstract input signals. The orchestrator does not care whether they come
/// from a global OS hotkey, a browser key pair, or an IPC message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    /// Hotkey pressed — begin capturing.
    StartRecording,
    /// Hotkey released — stop capturing and run the pipeline.
    StopRecording,
    /// The host lost focus; treat exactly like a user-initiated stop.
    Abandon,
    /// The user closed the result surface.
    Dismiss,
}

/// Progress events delivered to the host's render sink.
#[derive(Debug, Clone)]
pub enum OverlayEvent {
    /// Device acquisition started; show feedback immediately.
    Initializing,
    /// Audio is flowing.
    RecordingStarted,
    /// The stop was rejected by a duration/size guard.
    RecordingTooShort,
    /// Transcription returned silence or a non-speech annotation.
    NoSpeech,
    /// Hotkey released; a placeholder surface should appear.
    PopupPending,
    /// The latency deadline forced the surface visible before content.
    PopupForced,
    /// Recognized text is available.
    Transcript { text: String },
    /// A partial translation replaced the previous one.
    PartialTranslation(Translation),
    /// The final translation arrived; shown until dismissed.
    FinalTranslation(Translation),
    /// The session failed with a user-facing message.
    SessionFailed { message: String },
    /// The surface was closed (by the user or an auto-reset window).
    Dismissed,
}

// ---------------------------------------------------------------------------
// User-facing messages
// ---------------------------------------------------------------------------

const MSG_TOO_SHORT: &str = "Recording too short. Please hold longer to record.";
const MSG_NO_SPEECH: &str = "No speech detected. Please try again.";
const MSG_TRANSCRIBE_FAILED: &str = "Failed to transcribe audio. Please try again.";
const MSG_TRANSLATE_FAILED: &str = "Failed to translate. Please try again.";
const MSG_RATE_LIMITED: &str = "Rate limit exceeded. Please try again later.";
const MSG_QUOTA: &str = "Usage limit reached. Please add credits.";
const MSG_MIC_DENIED: &str = "Could not access microphone. Please check permissions.";
const MSG_NO_DEVICE: &str = "No microphone detected. Please connect one and try again.";
const MSG_FINALIZE_FAILED: &str = "Failed to process the recording. Please try again.";

fn capture_failure_message(error: &CaptureError) -> &'static str {
    match error {
        CaptureError::NoDevice => MSG_NO_DEVICE,
        CaptureError::PermissionDenied(_) | CaptureError::Stream(_) => MSG_MIC_DENIED,
    }
}

fn translate_failure_message(error: &TranslateError) -> &'static str {
    match error {
        TranslateError::RateLimited => MSG_RATE_LIMITED,
        TranslateError::QuotaExceeded => MSG_QUOTA,
        TranslateError::EmptyText
        | TranslateError::StreamParse(_)
        | TranslateError::Failed(_) => MSG_TRANSLATE_FAILED,
    }
}

// ---------------------------------------------------------------------------
// Stale-result guards
// ---------------------------------------------------------------------------

/// Apply a partial translation if it belongs to the current session and no
/// final result has landed yet. A final always supersedes partials, even
/// late-arriving ones.
fn apply_partial(state: &SharedState, seq: u64, partial: &Translation) -> bool {
    let mut st = state.lock().unwrap();
    if st.session_seq != seq {
        return false;
    }
    if st.translation.as_ref().is_some_and(|t| t.is_final) {
        return false;
    }
    st.popup = PopupStage::Visible;
    st.translation = Some(partial.clone());
    true
}

/// Apply the final translation if it belongs to the current session.
fn apply_final(state: &SharedState, seq: u64, final_result: Translation) -> bool {
    let mut st = state.lock().unwrap();
    if st.session_seq != seq {
        return false;
    }
    st.popup = PopupStage::Visible;
    st.phase = OverlayPhase::ResultShown;
    st.translation = Some(final_result);
    true
}

/// Clear a transient status message after its display window, unless a
/// newer session replaced it.
fn schedule_status_clear(
    state: SharedState,
    events: mpsc::UnboundedSender<OverlayEvent>,
    seq: u64,
    delay: Duration,
) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let cleared = {
            let mut st = state.lock().unwrap();
            if st.session_seq == seq && st.status_message.is_some() {
                st.status_message = None;
                true
            } else {
                false
            }
        };
        if cleared {
            let _ = events.send(OverlayEvent::Dismissed);
        }
    });
}

// ---------------------------------------------------------------------------
// SessionOrchestrator
// ---------------------------------------------------------------------------

/// Drives the complete hold-to-speak translation pipeline.
///
/// Create with [`SessionOrchestrator::new`], then call [`run`](Self::run)
/// inside a tokio task.
pub struct SessionOrchestrator {
    state: SharedState,
    mic: Arc<dyn MicSource>,
    transcriber: Arc<dyn Transcriber>,
    translator: Arc<dyn Translator>,
    events: mpsc::UnboundedSender<OverlayEvent>,
    languages: LanguageConfig,
    too_short_reset: Duration,
    session: RecordingSession,
    guard: LatencyGuard,
    seq: u64,
}

impl SessionOrchestrator {
    /// Create a new orchestrator.
    ///
    /// # Arguments
    ///
    /// * `state`       — shared overlay state (also read by the host shell).
    /// * `mic`         — microphone reservoir (or a fake in tests).
    /// * `transcriber` — speech-to-text client.
    /// * `translator`  — translation client.
    /// * `events`      — render-sink channel for host shells.
    /// * `config`      — language pair plus timing thresholds.
    pub fn new(
        state: SharedState,
        mic: Arc<dyn MicSource>,
        transcriber: Arc<dyn Transcriber>,
        translator: Arc<dyn Translator>,
        events: mpsc::UnboundedSender<OverlayEvent>,
        config: &AppConfig,
    ) -> Self {
        Self {
            state,
            mic,
            transcriber,
            translator,
            events,
            languages: config.languages.clone(),
            too_short_reset: Duration::from_millis(config.recording.too_short_reset_ms),
            session: RecordingSession::new(&config.recording),
            guard: LatencyGuard::new(Duration::from_millis(config.recording.popup_deadline_ms)),
            seq: 0,
        }
    }

    /// Run the orchestrator until `signals` is closed.
    ///
    /// This should be spawned as a tokio task; it never returns while the
    /// channel is open.
    pub async fn run(mut self, mut signals: mpsc::Receiver<SessionSignal>) {
        while let Some(signal) = signals.recv().await {
            match signal {
                SessionSignal::StartRecording => self.handle_start().await,
                SessionSignal::StopRecording => self.handle_stop(),
                SessionSignal::Abandon => self.handle_abandon(),
                SessionSignal::Dismiss => self.handle_dismiss(),
            }
        }
        log::info!("orchestrator: signal channel closed, shutting down");
    }

    // -----------------------------------------------------------------------
    // Signal handlers
    // -----------------------------------------------------------------------

    /// Begin a new session unless one is already in flight.
    async fn handle_start(&mut self) {
        if self.state.lock().unwrap().phase.is_busy() {
            // Key-repeat or an overlapping press — at most one session.
            log::debug!("start ignored: session in flight");
            return;
        }

        self.seq += 1;
        let seq = self.seq;
        self.guard.reset();

        {
            let mut st = self.state.lock().unwrap();
            st.session_seq = seq;
            st.phase = OverlayPhase::Initializing;
            st.popup = PopupStage::Hidden;
            st.transcript = None;
            st.translation = None;
            st.status_message = None;
            st.error_message = None;
        }
        // Shown before any device work: acquisition itself can be slow.
        let _ = self.events.send(OverlayEvent::Initializing);

        match self.session.start(Arc::clone(&self.mic)).await {
            Ok(true) => {
                self.state.lock().unwrap().phase = OverlayPhase::Recording;
                let _ = self.events.send(OverlayEvent::RecordingStarted);
            }
            Ok(false) => {
                // Session declined the start; nothing was acquired.
                self.state.lock().unwrap().phase = OverlayPhase::Idle;
            }
            Err(e) => {
                log::warn!("device acquisition failed: {e}");
                let message = capture_failure_message(&e);
                {
                    let mut st = self.state.lock().unwrap();
                    st.phase = OverlayPhase::Idle;
                    st.error_message = Some(message.into());
                }
                let _ = self.events.send(OverlayEvent::SessionFailed {
                    message: message.into(),
                });
            }
        }
    }

    /// Stop capturing and hand the payload to the request task.
    fn handle_stop(&mut self) {
        let phase = self.state.lock().unwrap().phase;
        if !matches!(phase, OverlayPhase::Initializing | OverlayPhase::Recording) {
            log::debug!("stop ignored: no recording in flight");
            return;
        }
        let seq = self.seq;

        // The pending surface and its deadline come first — visible
        // responsiveness must not wait on finalization or the network.
        {
            let mut st = self.state.lock().unwrap();
            st.popup = PopupStage::Pending;
        }
        let _ = self.events.send(OverlayEvent::PopupPending);

        let guard_state = Arc::clone(&self.state);
        let guard_events = self.events.clone();
        self.guard.arm(move || {
            let forced = {
                let mut st = guard_state.lock().unwrap();
                if st.session_seq == seq && st.popup == PopupStage::Pending {
                    st.popup = PopupStage::Visible;
                    true
                } else {
                    false
                }
            };
            if forced {
                let _ = guard_events.send(OverlayEvent::PopupForced);
            }
        });

        match self.session.stop() {
            None => {
                self.guard.disarm();
                let mut st = self.state.lock().unwrap();
                st.popup = PopupStage::Hidden;
                st.phase = OverlayPhase::Idle;
            }
            Some(StopOutcome::TooShort) => {
                self.guard.disarm();
                {
                    let mut st = self.state.lock().unwrap();
                    st.popup = PopupStage::Hidden;
                    st.phase = OverlayPhase::Idle;
                    st.status_message = Some(MSG_TOO_SHORT.into());
                }
                let _ = self.events.send(OverlayEvent::RecordingTooShort);
                schedule_status_clear(
                    Arc::clone(&self.state),
                    self.events.clone(),
                    seq,
                    self.too_short_reset,
                );
            }
            Some(StopOutcome::Failed(reason)) => {
                log::error!("payload finalization failed: {reason}");
                self.guard.disarm();
                {
                    let mut st = self.state.lock().unwrap();
                    st.popup = PopupStage::Hidden;
                    st.phase = OverlayPhase::Idle;
                    st.error_message = Some(MSG_FINALIZE_FAILED.into());
                }
                let _ = self.events.send(OverlayEvent::SessionFailed {
                    message: MSG_FINALIZE_FAILED.into(),
                });
            }
            Some(StopOutcome::Finalized(payload)) => {
                self.state.lock().unwrap().phase = OverlayPhase::Transcribing;
                tokio::spawn(run_request(
                    Arc::clone(&self.state),
                    self.events.clone(),
                    Arc::clone(&self.transcriber),
                    Arc::clone(&self.translator),
                    self.guard.clone(),
                    self.languages.clone(),
                    self.too_short_reset,
                    seq,
                    payload,
                ));
            }
        }
    }

    /// Focus loss while recording forces a stop identical to a release.
    fn handle_abandon(&mut self) {
        if self.session.is_recording() {
            log::debug!("focus lost while recording — stopping");
            self.handle_stop();
        }
    }

    /// Close a shown result and return to idle.
    fn handle_dismiss(&mut self) {
        self.session.reset_too_short();
        let dismissed = {
            let mut st = self.state.lock().unwrap();
            if st.phase == OverlayPhase::ResultShown || st.popup != PopupStage::Hidden {
                st.popup = PopupStage::Hidden;
                st.phase = OverlayPhase::Idle;
                st.transcript = None;
                st.translation = None;
                st.error_message = None;
                st.status_message = None;
                true
            } else {
                false
            }
        };
        if dismissed {
            let _ = self.events.send(OverlayEvent::Dismissed);
        }
    }
}

// ---------------------------------------------------------------------------
// Request task
// ---------------------------------------------------------------------------

/// Transcribe and translate one finalized payload.
///
/// Runs as its own task so the orchestrator keeps consuming signals (and
/// ignoring overlapping starts) while the network calls are in flight.
/// Every state mutation is gated on `seq` — results of a superseded
/// session are dropped, never applied.
#[allow(clippy::too_many_arguments)]
async fn run_request(
    state: SharedState,
    events: mpsc::UnboundedSender<OverlayEvent>,
    transcriber: Arc<dyn Transcriber>,
    translator: Arc<dyn Translator>,
    guard: LatencyGuard,
    languages: LanguageConfig,
    status_clear_after: Duration,
    seq: u64,
    payload: AudioPayload,
) {
    // ── 1. Transcription ─────────────────────────────────────────────────
    let transcript = match transcriber.transcribe(&payload).await {
        Ok(t) => t,
        Err(e) => {
            log::warn!("transcription failed: {}", e.reason);
            guard.disarm();
            let current = {
                let mut st = state.lock().unwrap();
                if st.session_seq == seq {
                    st.popup = PopupStage::Hidden;
                    st.phase = OverlayPhase::Idle;
                    st.error_message = Some(MSG_TRANSCRIBE_FAILED.into());
                    true
                } else {
                    false
                }
            };
            if current {
                let _ = events.send(OverlayEvent::SessionFailed {
                    message: MSG_TRANSCRIBE_FAILED.into(),
                });
            }
            return;
        }
    };

    // ── 2. Non-speech guard — soft failure, never translated ─────────────
    if !transcript.is_speech() {
        log::debug!("non-speech transcription: {:?}", transcript.text);
        guard.disarm();
        let current = {
            let mut st = state.lock().unwrap();
            if st.session_seq == seq {
                st.popup = PopupStage::Hidden;
                st.phase = OverlayPhase::Idle;
                st.status_message = Some(MSG_NO_SPEECH.into());
                true
            } else {
                false
            }
        };
        if current {
            let _ = events.send(OverlayEvent::NoSpeech);
            schedule_status_clear(state, events, seq, status_clear_after);
        }
        return;
    }

    // ── 3. Translation, partials wired straight into the popup ───────────
    {
        let mut st = state.lock().unwrap();
        if st.session_seq != seq {
            return;
        }
        st.transcript = Some(transcript.text.clone());
        st.phase = OverlayPhase::Translating;
    }
    let _ = events.send(OverlayEvent::Transcript {
        text: transcript.text.clone(),
    });

    let request = TranslateRequest {
        text: transcript.text,
        context: None,
        source_language: languages.source,
        target_language: languages.target,
    };

    let partial_state = Arc::clone(&state);
    let partial_events = events.clone();
    let on_partial = move |partial: Translation| {
        if apply_partial(&partial_state, seq, &partial) {
            let _ = partial_events.send(OverlayEvent::PartialTranslation(partial));
        }
    };

    let outcome = translator.translate(&request, Some(&on_partial)).await;
    guard.disarm();

    match outcome {
        Ok(final_result) => {
            if apply_final(&state, seq, final_result.clone()) {
                let _ = events.send(OverlayEvent::FinalTranslation(final_result));
            }
        }
        Err(e) => {
            log::warn!("translation failed: {e}");
            let message = translate_failure_message(&e);
            let current = {
                let mut st = state.lock().unwrap();
                if st.session_seq == seq {
                    st.phase = OverlayPhase::ResultShown;
                    st.popup = PopupStage::Visible;
                    st.error_message = Some(message.into());
                    true
                } else {
                    false
                }
            };
            if current {
                let _ = events.send(OverlayEvent::SessionFailed {
                    message: message.into(),
                });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::audio::FakeMic;
    use crate::config::RecordingConfig;
    use crate::pipeline::state::new_shared_state;
    use crate::transcribe::{TranscribeError, Transcript};
    use crate::translate::{PartialEmitter, PartialSink};

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Transcriber with a configurable response and artificial delay.
    struct MockTranscriber {
        response: Result<Transcript, TranscribeError>,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl MockTranscriber {
        fn ok(text: &str) -> Self {
            Self {
                response: Ok(Transcript::new(text)),
                delay: Duration::ZERO,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn err(reason: &str) -> Self {
            Self {
                response: Err(TranscribeError::new(reason)),
                delay: Duration::ZERO,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl Transcriber for MockTranscriber {
        async fn transcribe(&self, _payload: &AudioPayload) -> Result<Transcript, TranscribeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.response.clone()
        }
    }

    /// Translator that returns a fixed outcome, optionally after a delay.
    struct MockTranslator {
        response: Result<Translation, TranslateError>,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl MockTranslator {
        fn ok(text: &str) -> Self {
            Self {
                response: Ok(final_translation(text)),
                delay: Duration::ZERO,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn err(error: TranslateError) -> Self {
            Self {
                response: Err(error),
                delay: Duration::ZERO,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Translator for MockTranslator {
        async fn translate(
            &self,
            _request: &TranslateRequest,
            _on_partial: Option<PartialSink<'_>>,
        ) -> Result<Translation, TranslateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.response.clone()
        }
    }

    /// Translator that replays content chunks through the same scrape /
    /// strict-parse path the HTTP client uses.
    struct StreamingTranslator {
        chunks: Vec<String>,
    }

    impl StreamingTranslator {
        fn new(chunks: &[&str]) -> Self {
            Self {
                chunks: chunks.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl Translator for StreamingTranslator {
        async fn translate(
            &self,
            _request: &TranslateRequest,
            on_partial: Option<PartialSink<'_>>,
        ) -> Result<Translation, TranslateError> {
            let mut content = String::new();
            let mut emitter = PartialEmitter::new(Duration::ZERO);
            for chunk in &self.chunks {
                tokio::time::sleep(Duration::from_millis(10)).await;
                content.push_str(chunk);
                if let Some(cb) = on_partial {
                    if let Some(partial) = emitter.poll(&content) {
                        cb(partial);
                    }
                }
            }
            let value: serde_json::Value = serde_json::from_str(&content)
                .map_err(|e| TranslateError::StreamParse(e.to_string()))?;
            Ok(final_translation(
                value["translation"].as_str().unwrap_or_default(),
            ))
        }
    }

    fn final_translation(text: &str) -> Translation {
        Translation {
            translation: text.into(),
            original_phrase: None,
            examples: Vec::new(),
            notes: None,
            is_final: true,
        }
    }

    // -----------------------------------------------------------------------
    // Harness
    // -----------------------------------------------------------------------

    struct Harness {
        state: SharedState,
        signals: mpsc::Sender<SessionSignal>,
        events: mpsc::UnboundedReceiver<OverlayEvent>,
        mic: Arc<FakeMic>,
    }

    /// Spawn an orchestrator with `min_duration_ms` disabled unless a test
    /// exercises the duration guard explicitly.
    fn spawn_orchestrator(
        min_duration_ms: u64,
        mic: FakeMic,
        transcriber: impl Transcriber + 'static,
        translator: impl Translator + 'static,
    ) -> Harness {
        let mut config = AppConfig::default();
        config.recording = RecordingConfig {
            min_duration_ms,
            ..RecordingConfig::default()
        };

        let state = new_shared_state();
        let mic = Arc::new(mic);
        let (signal_tx, signal_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let orchestrator = SessionOrchestrator::new(
            Arc::clone(&state),
            Arc::clone(&mic) as Arc<dyn MicSource>,
            Arc::new(transcriber),
            Arc::new(translator),
            event_tx,
            &config,
        );
        tokio::spawn(orchestrator.run(signal_rx));

        Harness {
            state,
            signals: signal_tx,
            events: event_rx,
            mic,
        }
    }

    impl Harness {
        async fn send(&self, signal: SessionSignal) {
            self.signals.send(signal).await.expect("send signal");
        }

        fn drain_events(&mut self) -> Vec<OverlayEvent> {
            let mut out = Vec::new();
            while let Ok(ev) = self.events.try_recv() {
                out.push(ev);
            }
            out
        }
    }

    async fn settle() {
        // Paused-clock runtimes advance through all pending timers here.
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // -----------------------------------------------------------------------
    // End-to-end scenarios
    // -----------------------------------------------------------------------

    /// Hold → speak → release: transcription "hello", translation streamed
    /// in two chunks, final state shows "hola" with `is_final` set.
    #[tokio::test(start_paused = true)]
    async fn full_session_streams_to_final() {
        let mut h = spawn_orchestrator(
            0,
            FakeMic::with_seconds(1.0),
            MockTranscriber::ok("hello"),
            StreamingTranslator::new(&[r#"{"translation":"ho"#, r#"la"}"#]),
        );

        h.send(SessionSignal::StartRecording).await;
        h.send(SessionSignal::StopRecording).await;
        tokio::time::sleep(Duration::from_millis(500)).await;

        {
            let st = h.state.lock().unwrap();
            assert_eq!(st.phase, OverlayPhase::ResultShown);
            assert_eq!(st.popup, PopupStage::Visible);
            assert_eq!(st.transcript.as_deref(), Some("hello"));
            let t = st.translation.as_ref().expect("translation");
            assert_eq!(t.translation, "hola");
            assert!(t.is_final);
            assert!(st.error_message.is_none());
        }

        let events = h.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, OverlayEvent::PartialTranslation(_))));
        assert!(events
            .iter()
            .any(|e| matches!(e, OverlayEvent::FinalTranslation(t) if t.translation == "hola")));
    }

    /// An immediate release trips the 500 ms duration guard: no network
    /// calls, "hold longer" feedback, auto-reset after the display window.
    #[tokio::test(start_paused = true)]
    async fn too_short_release_never_uploads() {
        let transcriber = MockTranscriber::ok("hello");
        let transcribe_calls = Arc::clone(&transcriber.calls);
        let translator = MockTranslator::ok("hola");
        let translate_calls = Arc::clone(&translator.calls);

        let mut h =
            spawn_orchestrator(500, FakeMic::with_seconds(1.0), transcriber, translator);

        h.send(SessionSignal::StartRecording).await;
        h.send(SessionSignal::StopRecording).await;
        settle().await;

        {
            let st = h.state.lock().unwrap();
            assert_eq!(st.phase, OverlayPhase::Idle);
            assert_eq!(st.popup, PopupStage::Hidden);
            assert_eq!(
                st.status_message.as_deref(),
                Some("Recording too short. Please hold longer to record.")
            );
        }
        assert_eq!(transcribe_calls.load(Ordering::SeqCst), 0);
        assert_eq!(translate_calls.load(Ordering::SeqCst), 0);
        assert!(h
            .drain_events()
            .iter()
            .any(|e| matches!(e, OverlayEvent::RecordingTooShort)));

        // Display window elapses → feedback clears on its own.
        tokio::time::sleep(Duration::from_millis(1_600)).await;
        assert!(h.state.lock().unwrap().status_message.is_none());
    }

    /// Transcription failure dismisses the surface and returns to idle
    /// with a user-facing message.
    #[tokio::test(start_paused = true)]
    async fn transcription_failure_resets_to_idle() {
        let mut h = spawn_orchestrator(
            0,
            FakeMic::with_seconds(1.0),
            MockTranscriber::err("HTTP 500 Internal Server Error"),
            MockTranslator::ok("unused"),
        );

        h.send(SessionSignal::StartRecording).await;
        h.send(SessionSignal::StopRecording).await;
        settle().await;

        let st = h.state.lock().unwrap();
        assert_eq!(st.phase, OverlayPhase::Idle);
        assert_eq!(st.popup, PopupStage::Hidden);
        assert_eq!(
            st.error_message.as_deref(),
            Some("Failed to transcribe audio. Please try again.")
        );
        drop(st);
        assert!(h
            .drain_events()
            .iter()
            .any(|e| matches!(e, OverlayEvent::SessionFailed { .. })));
    }

    /// A bracket-only transcription is a soft outcome: the popup closes,
    /// translation is never invoked.
    #[tokio::test(start_paused = true)]
    async fn non_speech_skips_translation() {
        let translator = MockTranslator::ok("unused");
        let translate_calls = Arc::clone(&translator.calls);

        let mut h = spawn_orchestrator(
            0,
            FakeMic::with_seconds(1.0),
            MockTranscriber::ok("[no audio detected]"),
            translator,
        );

        h.send(SessionSignal::StartRecording).await;
        h.send(SessionSignal::StopRecording).await;
        settle().await;

        {
            let st = h.state.lock().unwrap();
            assert_eq!(st.phase, OverlayPhase::Idle);
            assert_eq!(st.popup, PopupStage::Hidden);
            assert_eq!(
                st.status_message.as_deref(),
                Some("No speech detected. Please try again.")
            );
        }
        assert_eq!(translate_calls.load(Ordering::SeqCst), 0);
        assert!(h
            .drain_events()
            .iter()
            .any(|e| matches!(e, OverlayEvent::NoSpeech)));
    }

    /// With both clients slower than the deadline, the surface is forced
    /// visible at ~400 ms — exactly once — while work continues behind it.
    #[tokio::test(start_paused = true)]
    async fn deadline_forces_popup_before_results() {
        let mut h = spawn_orchestrator(
            0,
            FakeMic::with_seconds(1.0),
            MockTranscriber::ok("hello").with_delay(Duration::from_secs(5)),
            MockTranslator::ok("hola"),
        );

        h.send(SessionSignal::StartRecording).await;
        h.send(SessionSignal::StopRecording).await;
        tokio::time::sleep(Duration::from_millis(450)).await;

        {
            let st = h.state.lock().unwrap();
            assert_eq!(st.phase, OverlayPhase::Transcribing);
            assert_eq!(st.popup, PopupStage::Visible);
            assert!(st.translation.is_none());
        }
        let forced = h
            .drain_events()
            .iter()
            .filter(|e| matches!(e, OverlayEvent::PopupForced))
            .count();
        assert_eq!(forced, 1);

        // The slow call still completes and lands on the visible surface.
        tokio::time::sleep(Duration::from_secs(6)).await;
        let st = h.state.lock().unwrap();
        assert_eq!(st.phase, OverlayPhase::ResultShown);
        assert_eq!(
            st.translation.as_ref().map(|t| t.translation.as_str()),
            Some("hola")
        );
    }

    /// A start signal arriving while a session is in flight is ignored —
    /// the microphone is never double-acquired.
    #[tokio::test(start_paused = true)]
    async fn overlapping_start_is_ignored() {
        let mut h = spawn_orchestrator(
            0,
            FakeMic::with_seconds(1.0),
            MockTranscriber::ok("hello").with_delay(Duration::from_secs(5)),
            MockTranslator::ok("hola"),
        );

        h.send(SessionSignal::StartRecording).await;
        h.send(SessionSignal::StopRecording).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        h.send(SessionSignal::StartRecording).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.mic.acquire_count(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(h.state.lock().unwrap().phase, OverlayPhase::ResultShown);
        let _ = h.drain_events();
    }

    /// Rate-limit and quota errors surface their own wording, not the
    /// generic failure message.
    #[tokio::test(start_paused = true)]
    async fn rate_limit_and_quota_have_distinct_messages() {
        for (error, expected) in [
            (
                TranslateError::RateLimited,
                "Rate limit exceeded. Please try again later.",
            ),
            (
                TranslateError::QuotaExceeded,
                "Usage limit reached. Please add credits.",
            ),
        ] {
            let mut h = spawn_orchestrator(
                0,
                FakeMic::with_seconds(1.0),
                MockTranscriber::ok("hello"),
                MockTranslator::err(error),
            );

            h.send(SessionSignal::StartRecording).await;
            h.send(SessionSignal::StopRecording).await;
            settle().await;

            let st = h.state.lock().unwrap();
            assert_eq!(st.phase, OverlayPhase::ResultShown);
            assert_eq!(st.popup, PopupStage::Visible);
            assert_eq!(st.error_message.as_deref(), Some(expected));
            drop(st);
            let _ = h.drain_events();
        }
    }

    /// Microphone acquisition failure aborts the session immediately with
    /// a permission message.
    #[tokio::test(start_paused = true)]
    async fn permission_denied_aborts_session() {
        let mut h = spawn_orchestrator(
            0,
            FakeMic::failing(CaptureError::PermissionDenied("denied".into())),
            MockTranscriber::ok("unused"),
            MockTranslator::ok("unused"),
        );

        h.send(SessionSignal::StartRecording).await;
        settle().await;

        let st = h.state.lock().unwrap();
        assert_eq!(st.phase, OverlayPhase::Idle);
        assert_eq!(
            st.error_message.as_deref(),
            Some("Could not access microphone. Please check permissions.")
        );
        drop(st);
        assert!(h
            .drain_events()
            .iter()
            .any(|e| matches!(e, OverlayEvent::SessionFailed { .. })));
    }

    /// Dismissing a shown result clears the surface and returns to idle.
    #[tokio::test(start_paused = true)]
    async fn dismiss_clears_shown_result() {
        let mut h = spawn_orchestrator(
            0,
            FakeMic::with_seconds(1.0),
            MockTranscriber::ok("hello"),
            MockTranslator::ok("hola"),
        );

        h.send(SessionSignal::StartRecording).await;
        h.send(SessionSignal::StopRecording).await;
        settle().await;
        assert_eq!(h.state.lock().unwrap().phase, OverlayPhase::ResultShown);

        h.send(SessionSignal::Dismiss).await;
        settle().await;

        let st = h.state.lock().unwrap();
        assert_eq!(st.phase, OverlayPhase::Idle);
        assert_eq!(st.popup, PopupStage::Hidden);
        assert!(st.translation.is_none());
        drop(st);
        assert!(h
            .drain_events()
            .iter()
            .any(|e| matches!(e, OverlayEvent::Dismissed)));
    }

    /// Abandon while recording behaves exactly like a release (here: the
    /// duration guard trips, because focus was lost immediately).
    #[tokio::test(start_paused = true)]
    async fn abandon_while_recording_stops_session() {
        let mut h = spawn_orchestrator(
            500,
            FakeMic::with_seconds(1.0),
            MockTranscriber::ok("hello"),
            MockTranslator::ok("hola"),
        );

        h.send(SessionSignal::StartRecording).await;
        h.send(SessionSignal::Abandon).await;
        settle().await;

        let st = h.state.lock().unwrap();
        assert_eq!(st.phase, OverlayPhase::Idle);
        assert!(st.status_message.is_some());
        drop(st);
        assert!(h
            .drain_events()
            .iter()
            .any(|e| matches!(e, OverlayEvent::RecordingTooShort)));
    }

    /// Abandon when nothing is recording is a no-op.
    #[tokio::test(start_paused = true)]
    async fn abandon_when_idle_is_ignored() {
        let mut h = spawn_orchestrator(
            0,
            FakeMic::with_seconds(1.0),
            MockTranscriber::ok("unused"),
            MockTranslator::ok("unused"),
        );

        h.send(SessionSignal::Abandon).await;
        settle().await;

        assert_eq!(h.state.lock().unwrap().phase, OverlayPhase::Idle);
        assert!(h.drain_events().is_empty());
    }

    // -----------------------------------------------------------------------
    // Stale-result guards
    // -----------------------------------------------------------------------

    /// A result stamped with an older sequence number must not overwrite
    /// state established by a newer session.
    #[test]
    fn stale_partial_and_final_are_dropped() {
        let state = new_shared_state();
        state.lock().unwrap().session_seq = 2;

        let stale = final_translation("old answer");
        assert!(!apply_partial(&state, 1, &stale));
        assert!(!apply_final(&state, 1, stale));
        assert!(state.lock().unwrap().translation.is_none());
    }

    /// Once a final result landed, a late partial of the same session must
    /// not roll the popup text backwards.
    #[test]
    fn late_partial_cannot_overwrite_final() {
        let state = new_shared_state();
        state.lock().unwrap().session_seq = 1;

        assert!(apply_final(&state, 1, final_translation("hola")));

        let late_partial = Translation {
            translation: "ho".into(),
            original_phrase: None,
            examples: Vec::new(),
            notes: None,
            is_final: false,
        };
        assert!(!apply_partial(&state, 1, &late_partial));

        let st = state.lock().unwrap();
        assert_eq!(
            st.translation.as_ref().map(|t| t.translation.as_str()),
            Some("hola")
        );
    }

    /// Partials of the current session apply in order, each replacing the
    /// previous one.
    #[test]
    fn current_partials_apply_in_order() {
        let state = new_shared_state();
        state.lock().unwrap().session_seq = 1;

        let p1 = Translation {
            translation: "ho".into(),
            original_phrase: None,
            examples: Vec::new(),
            notes: None,
            is_final: false,
        };
        let mut p2 = p1.clone();
        p2.translation = "hola".into();

        assert!(apply_partial(&state, 1, &p1));
        assert!(apply_partial(&state, 1, &p2));

        let st = state.lock().unwrap();
        assert_eq!(st.popup, PopupStage::Visible);
        assert_eq!(
            st.translation.as_ref().map(|t| t.translation.as_str()),
            Some("hola")
        );
    }
}

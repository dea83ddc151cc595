//! Microphone capture via `cpal`, gated for warm reuse.
//!
//! [`AudioCapture`] wraps the cpal host/device/stream lifecycle. Unlike a
//! plain record-on-demand stream, [`AudioCapture::start_gated`] starts the
//! hardware stream immediately but forwards no audio until the shared gate
//! flag is raised — the stream idles silently between sessions instead of
//! being torn down and re-acquired.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the cpal callback.
///
/// Samples are interleaved `f32` in the range `[-1.0, 1.0]` at the device's
/// native rate; use [`crate::audio::downmix_mono`] and
/// [`crate::audio::resample`] before encoding an upload payload.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz (e.g. 44100, 48000, 16000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// SharedSink
// ---------------------------------------------------------------------------

/// Swappable destination for captured chunks.
///
/// The reservoir installs a fresh sender here for each session and clears it
/// on release; the cpal callback only ever borrows it for the duration of a
/// single send.
pub type SharedSink = Arc<Mutex<Option<mpsc::Sender<AudioChunk>>>>;

/// Forward `chunk` to the current sink, but only while the gate is open.
///
/// Called from the cpal audio thread. Send errors (receiver dropped) and a
/// poisoned sink lock are silently ignored so the audio thread never panics.
pub fn forward_chunk(gate: &AtomicBool, sink: &Mutex<Option<mpsc::Sender<AudioChunk>>>, chunk: AudioChunk) {
    if !gate.load(Ordering::Acquire) {
        return;
    }
    if let Ok(guard) = sink.lock() {
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(chunk);
        }
    }
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// RAII guard that keeps the cpal stream alive.
///
/// Dropping this value stops the underlying hardware stream. The reservoir
/// holds it on a dedicated thread for the lifetime of the process.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up or running the audio capture.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    /// No input device is available on the default audio host.
    #[error("no input device found on the default audio host")]
    NoDevice,

    /// The platform refused access to the microphone.
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),

    /// Any other stream setup or runtime failure.
    #[error("audio stream error: {0}")]
    Stream(String),
}

impl CaptureError {
    /// Classify a backend error message. Platforms report permission
    /// problems as free-form backend errors, so this is a best-effort
    /// string match; everything else stays a generic stream error.
    pub fn from_backend(message: String) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("permission") || lower.contains("denied") || lower.contains("not permitted")
        {
            CaptureError::PermissionDenied(message)
        } else {
            CaptureError::Stream(message)
        }
    }
}

impl From<cpal::DefaultStreamConfigError> for CaptureError {
    fn from(e: cpal::DefaultStreamConfigError) -> Self {
        match e {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => CaptureError::NoDevice,
            other => CaptureError::from_backend(other.to_string()),
        }
    }
}

impl From<cpal::BuildStreamError> for CaptureError {
    fn from(e: cpal::BuildStreamError) -> Self {
        match e {
            cpal::BuildStreamError::DeviceNotAvailable => CaptureError::NoDevice,
            other => CaptureError::from_backend(other.to_string()),
        }
    }
}

impl From<cpal::PlayStreamError> for CaptureError {
    fn from(e: cpal::PlayStreamError) -> Self {
        match e {
            cpal::PlayStreamError::DeviceNotAvailable => CaptureError::NoDevice,
            other => CaptureError::from_backend(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// Microphone capture device wrapper built on top of `cpal`.
pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    /// Native sample rate reported by the device (Hz).
    sample_rate: u32,
    /// Number of interleaved channels reported by the device.
    channels: u16,
}

impl AudioCapture {
    /// Open the system default input device.
    ///
    /// Queries the device's preferred stream configuration (sample rate,
    /// channels, buffer size) so no manual configuration is required.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::NoDevice`] when no input device is available,
    /// or a classified setup error when the device cannot report a default
    /// stream configuration.
    pub fn open() -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

        let supported = device.default_input_config()?;

        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        Ok(Self {
            device,
            config,
            sample_rate,
            channels,
        })
    }

    /// Start the hardware stream with forwarding controlled by `gate`.
    ///
    /// The cpal callback runs on a dedicated audio thread; each buffer the
    /// hardware delivers is wrapped in an [`AudioChunk`] and passed through
    /// [`forward_chunk`] — dropped while the gate is closed, sent to the
    /// current [`SharedSink`] sender while it is open.
    ///
    /// # Errors
    ///
    /// Returns a classified [`CaptureError`] if the platform rejects the
    /// stream configuration.
    pub fn start_gated(
        &self,
        gate: Arc<AtomicBool>,
        sink: SharedSink,
    ) -> Result<StreamHandle, CaptureError> {
        let sample_rate = self.sample_rate;
        let channels = self.channels;

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let chunk = AudioChunk {
                    samples: data.to_vec(),
                    sample_rate,
                    channels,
                };
                forward_chunk(&gate, &sink, chunk);
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None, // no timeout
        )?;

        stream.play()?;
        Ok(StreamHandle { _stream: stream })
    }

    /// Native sample rate of the capture stream in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels in each [`AudioChunk`].
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

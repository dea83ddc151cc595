//! WAV payload encoding for the transcription upload.
//!
//! The hosted endpoint accepts the audio as one binary body with a MIME
//! hint, so the finalized session buffer is written as a 16-bit PCM WAV
//! file in memory via `hound`.

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::audio::pcm::TARGET_SAMPLE_RATE;

/// MIME hint sent alongside the upload body.
pub const WAV_MIME: &str = "audio/wav";

// ---------------------------------------------------------------------------
// AudioPayload
// ---------------------------------------------------------------------------

/// A finalized, immutable recording ready for upload.
///
/// Produced exactly once per session by [`crate::audio::RecordingSession`]
/// and consumed exactly once by the transcription client.
#[derive(Debug, Clone)]
pub struct AudioPayload {
    /// Complete WAV file body.
    pub bytes: Vec<u8>,
    /// Content-type hint for the multipart upload.
    pub mime: &'static str,
}

impl AudioPayload {
    /// Size of the encoded body in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// `true` when the body is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// encode_wav
// ---------------------------------------------------------------------------

/// Encode 16 kHz mono `f32` samples as an in-memory 16-bit PCM WAV file.
///
/// Samples are clamped to `[-1.0, 1.0]` before quantisation.
///
/// # Errors
///
/// Only fails if `hound` rejects a write into the memory cursor, which in
/// practice means the recording exceeded the 4 GiB WAV size limit.
pub fn encode_wav(samples: &[f32]) -> Result<AudioPayload, hound::Error> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: TARGET_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &s in samples {
            let clamped = s.clamp(-1.0, 1.0);
            writer.write_sample((clamped * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }

    Ok(AudioPayload {
        bytes: cursor.into_inner(),
        mime: WAV_MIME,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

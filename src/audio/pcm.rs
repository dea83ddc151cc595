//! Channel downmix and sample-rate conversion.
//!
//! Devices deliver whatever format they prefer (commonly 44.1/48 kHz
//! stereo); the transcription service wants 16 kHz mono. [`downmix_mono`]
//! and [`resample`] are the two conversion steps between the raw capture
//! buffer and the WAV payload.
//!
//! The resampler is plain linear interpolation — adequate for speech headed
//! to a speech-to-text service. For higher fidelity swap the inner loop for
//! `rubato` (`SincFixedIn`), which is already in `Cargo.toml` as the upgrade
//! path.

/// Sample rate expected by the transcription service, in Hz.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

// ---------------------------------------------------------------------------
// downmix_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging each frame.
///
/// Output length is `samples.len() / channels`. Already-mono input is
/// returned as an owned copy without averaging; `channels == 0` yields an
/// empty vector.
pub fn downmix_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Resample mono `samples` from `source_rate` to `target_rate` Hz using
/// linear interpolation.
///
/// A matching rate is a no-op copy. Output length is approximately
/// `samples.len() * target_rate / source_rate`.
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate {
        return samples.to_vec();
    }

    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

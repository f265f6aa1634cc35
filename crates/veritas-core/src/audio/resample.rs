//! Sample-rate conversion with rubato's sinc resampler

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::{DetectionError, Result};

/// Input frames handed to the resampler per call
const CHUNK_FRAMES: usize = 1024;

/// Resample a mono signal from `from_rate` to `to_rate`
///
/// The output length is `round(len * to / from)`; the resampler's delay is
/// trimmed so output sample 0 lines up with input sample 0.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(DetectionError::Decode(format!(
            "Invalid sample rate conversion {} -> {}",
            from_rate, to_rate
        )));
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let expected_len = (samples.len() as f64 * ratio).round() as usize;

    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_FRAMES, 1)
        .map_err(|e| DetectionError::Decode(format!("Resampler setup failed: {}", e)))?;

    let delay = resampler.output_delay();
    let mut output: Vec<f32> = Vec::with_capacity(expected_len + delay + CHUNK_FRAMES);
    let mut pos = 0;

    while samples.len() - pos >= resampler.input_frames_next() {
        let needed = resampler.input_frames_next();
        let chunk = &samples[pos..pos + needed];
        let out = resampler
            .process(&[chunk][..], None)
            .map_err(|e| DetectionError::Decode(format!("Resampling failed: {}", e)))?;
        output.extend_from_slice(&out[0]);
        pos += needed;
    }

    if pos < samples.len() {
        let tail = &samples[pos..];
        let out = resampler
            .process_partial(Some(&[tail][..]), None)
            .map_err(|e| DetectionError::Decode(format!("Resampling failed: {}", e)))?;
        output.extend_from_slice(&out[0]);
    }

    // Flush the filter until the delayed tail is out
    while output.len() < expected_len + delay {
        let out = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| DetectionError::Decode(format!("Resampling failed: {}", e)))?;
        if out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&out[0]);
    }

    let mut aligned: Vec<f32> = output.into_iter().skip(delay).take(expected_len).collect();
    aligned.resize(expected_len, 0.0);
    Ok(aligned)
}

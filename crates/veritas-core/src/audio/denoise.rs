//! Spectral-gating noise reduction
//!
//! The noise floor is estimated per frequency bin from the quietest frames
//! of the clip itself; bins that stay below `floor * threshold` are
//! attenuated. This is a best-effort enhancement: anything that goes wrong
//! yields `None` and the caller keeps the unfiltered signal.

use super::stft::{istft, stft};
use crate::config::DenoiseConfig;

/// Denoise `samples`, or `None` if the signal can't be processed
pub fn spectral_gate(samples: &[f32], settings: &DenoiseConfig) -> Option<Vec<f32>> {
    let (n_fft, hop) = (settings.n_fft, settings.hop);
    if samples.len() < n_fft || hop == 0 {
        return None;
    }

    let mut frames = match stft(samples, n_fft, hop) {
        Ok(frames) if !frames.is_empty() => frames,
        Ok(_) => return None,
        Err(e) => {
            log::debug!("Denoise STFT failed: {}", e);
            return None;
        }
    };

    let floor = noise_floor(&frames, settings.noise_quantile);
    let threshold = settings.threshold;
    for frame in &mut frames {
        for (bin, value) in frame.iter_mut().enumerate() {
            if value.norm() < floor[bin] * threshold {
                *value *= settings.attenuation;
            }
        }
    }

    // Full frames only cover a prefix; keep the uncovered tail as is
    let covered = (frames.len() - 1) * hop + n_fft;
    let mut output = match istft(&frames, n_fft, hop, covered) {
        Ok(output) => output,
        Err(e) => {
            log::debug!("Denoise ISTFT failed: {}", e);
            return None;
        }
    };
    output.extend_from_slice(&samples[covered..]);

    if output.iter().all(|s| s.is_finite()) {
        Some(output)
    } else {
        None
    }
}

/// Mean per-bin magnitude over the quietest `quantile` of frames
fn noise_floor(frames: &[Vec<realfft::num_complex::Complex<f32>>], quantile: f32) -> Vec<f32> {
    let bins = frames[0].len();
    let mut energy: Vec<(usize, f32)> = frames
        .iter()
        .enumerate()
        .map(|(i, f)| (i, f.iter().map(|c| c.norm_sqr()).sum::<f32>()))
        .collect();
    energy.sort_by(|a, b| a.1.total_cmp(&b.1));

    let count = ((frames.len() as f32 * quantile).ceil() as usize).clamp(1, frames.len());
    let mut floor = vec![0.0f32; bins];
    for &(i, _) in &energy[..count] {
        for (bin, value) in frames[i].iter().enumerate() {
            floor[bin] += value.norm();
        }
    }
    for value in &mut floor {
        *value /= count as f32;
    }
    floor
}

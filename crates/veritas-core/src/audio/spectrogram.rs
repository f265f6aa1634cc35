//! Log-mel spectrogram features
//!
//! Triangular mel filterbank over the power spectrum of Hann-windowed frames,
//! compressed with `ln(1 + x)`.

use ndarray::Array2;

use super::stft::stft;

/// Spectrogram parameters
#[derive(Debug, Clone, Copy)]
pub struct MelParams {
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop: usize,
    pub bands: usize,
}

/// Compute `[frames, bands]` log-mel features
///
/// Signals shorter than one frame are zero-padded to a single frame, so
/// every chunk yields at least one feature row.
pub fn log_mel(samples: &[f32], params: &MelParams) -> Result<Array2<f32>, String> {
    let padded;
    let signal = if samples.len() < params.n_fft {
        let mut buf = samples.to_vec();
        buf.resize(params.n_fft, 0.0);
        padded = buf;
        &padded[..]
    } else {
        samples
    };

    let spectra = stft(signal, params.n_fft, params.hop)?;
    let filterbank = mel_filterbank(params.bands, params.n_fft, params.sample_rate as f32);

    let mut features = Array2::<f32>::zeros((spectra.len(), params.bands));
    for (t, spectrum) in spectra.iter().enumerate() {
        for (band, filter) in filterbank.iter().enumerate() {
            let energy: f32 = filter
                .iter()
                .zip(spectrum)
                .map(|(&coeff, c)| coeff * c.norm_sqr() / params.n_fft as f32)
                .sum();
            features[[t, band]] = energy.max(0.0).ln_1p();
        }
    }
    Ok(features)
}

/// `bands` triangular filters over `n_fft / 2 + 1` bins
fn mel_filterbank(bands: usize, n_fft: usize, sample_rate: f32) -> Vec<Vec<f32>> {
    let n_bins = n_fft / 2 + 1;
    let mel_min = hz_to_mel(0.0);
    let mel_max = hz_to_mel(sample_rate / 2.0);

    let n_points = bands + 2;
    let bin_points: Vec<f32> = (0..n_points)
        .map(|i| mel_min + (mel_max - mel_min) * i as f32 / (n_points - 1) as f32)
        .map(|mel| mel_to_hz(mel) * n_fft as f32 / sample_rate)
        .collect();

    (0..bands)
        .map(|band| {
            let (left, center, right) = (bin_points[band], bin_points[band + 1], bin_points[band + 2]);
            (0..n_bins)
                .map(|bin| {
                    let f = bin as f32;
                    if f >= left && f <= center && center > left {
                        (f - left) / (center - left)
                    } else if f > center && f <= right && right > center {
                        (right - f) / (right - center)
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

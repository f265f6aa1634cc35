//! Short-time Fourier transform helpers

use realfft::num_complex::Complex;
use realfft::RealFftPlanner;

/// Periodic Hann window
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

/// Number of full frames of `n_fft` at `hop` that fit in `len` samples
pub fn frame_count(len: usize, n_fft: usize, hop: usize) -> usize {
    if len < n_fft || hop == 0 {
        0
    } else {
        (len - n_fft) / hop + 1
    }
}

/// Hann-windowed STFT over full frames (no padding)
///
/// Returns one `n_fft / 2 + 1` bin spectrum per frame.
pub fn stft(signal: &[f32], n_fft: usize, hop: usize) -> Result<Vec<Vec<Complex<f32>>>, String> {
    let num_frames = frame_count(signal.len(), n_fft, hop);

    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);
    let window = hann_window(n_fft);

    let mut scratch = fft.make_scratch_vec();
    let mut frame_buf = vec![0.0f32; n_fft];
    let mut spectrum = fft.make_output_vec();
    let mut frames = Vec::with_capacity(num_frames);

    for frame_idx in 0..num_frames {
        let start = frame_idx * hop;
        for i in 0..n_fft {
            frame_buf[i] = signal[start + i] * window[i];
        }
        fft.process_with_scratch(&mut frame_buf, &mut spectrum, &mut scratch)
            .map_err(|e| format!("FFT failed: {:?}", e))?;
        frames.push(spectrum.clone());
    }

    Ok(frames)
}

/// Weighted overlap-add inverse of [`stft`], trimmed/padded to `target_len`
pub fn istft(
    frames: &[Vec<Complex<f32>>],
    n_fft: usize,
    hop: usize,
    target_len: usize,
) -> Result<Vec<f32>, String> {
    let mut planner = RealFftPlanner::<f32>::new();
    let ifft = planner.plan_fft_inverse(n_fft);
    let window = hann_window(n_fft);

    let output_len = frames.len().saturating_sub(1) * hop + n_fft;
    let mut output = vec![0.0f32; output_len.max(target_len)];
    let mut window_sum = vec![0.0f32; output.len()];

    let mut scratch = ifft.make_scratch_vec();
    let mut time_frame = vec![0.0f32; n_fft];
    let mut spectrum = ifft.make_input_vec();
    let last_bin = spectrum.len() - 1;

    for (frame_idx, frame) in frames.iter().enumerate() {
        spectrum.copy_from_slice(frame);
        // DC and Nyquist bins must be purely real for the inverse real FFT
        spectrum[0].im = 0.0;
        spectrum[last_bin].im = 0.0;

        ifft.process_with_scratch(&mut spectrum, &mut time_frame, &mut scratch)
            .map_err(|e| format!("IFFT failed: {:?}", e))?;

        let start = frame_idx * hop;
        for i in 0..n_fft {
            output[start + i] += time_frame[i] * window[i] / n_fft as f32;
            window_sum[start + i] += window[i] * window[i];
        }
    }

    let eps = 1e-8f32;
    for (sample, &norm) in output.iter_mut().zip(&window_sum) {
        if norm > eps {
            *sample /= norm;
        }
    }

    output.truncate(target_len);
    Ok(output)
}

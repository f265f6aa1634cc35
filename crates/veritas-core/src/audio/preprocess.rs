//! Audio preprocessing: bytes in, ordered chunks out

use super::chunking::{split, AudioChunk, ChunkSize};
use super::decode::decode_audio;
use super::denoise::spectral_gate;
use super::resample::resample;
use super::spectrogram::{log_mel, MelParams};
use crate::config::{AudioConfig, AudioInputKind};
use crate::error::{DetectionError, Result};

/// Output of [`AudioPreprocessor::prepare`]
#[derive(Debug, Clone)]
pub struct PreparedAudio {
    /// Chunks in temporal order
    pub chunks: Vec<AudioChunk>,
    /// Length of the analysed waveform
    pub duration_secs: f64,
    /// Whether noise reduction was actually applied
    pub denoised: bool,
}

pub struct AudioPreprocessor {
    settings: AudioConfig,
    input: AudioInputKind,
}

impl AudioPreprocessor {
    pub fn new(settings: AudioConfig, input: AudioInputKind) -> Self {
        Self { settings, input }
    }

    pub fn settings(&self) -> &AudioConfig {
        &self.settings
    }

    /// Check options before any decoding happens
    pub fn validate(&self, chunk_size: ChunkSize) -> Result<()> {
        chunk_size.validate(&self.settings)
    }

    /// Decode, resample, optionally denoise, and segment an upload
    pub fn prepare(
        &self,
        bytes: Vec<u8>,
        extension: Option<&str>,
        chunk_size: ChunkSize,
        noise_reduction: bool,
    ) -> Result<PreparedAudio> {
        self.validate(chunk_size)?;

        let decoded = decode_audio(bytes, extension)?;
        log::debug!(
            "Decoded {:.2}s of audio at {} Hz",
            decoded.duration_secs(),
            decoded.sample_rate
        );

        let rate = self.settings.sample_rate;
        let mut samples = resample(&decoded.samples, decoded.sample_rate, rate)?;
        if samples.is_empty() {
            return Err(DetectionError::NoFramesExtracted("audio chunks"));
        }

        let mut denoised = false;
        if noise_reduction {
            match spectral_gate(&samples, &self.settings.denoise) {
                Some(clean) => {
                    samples = clean;
                    denoised = true;
                }
                None => log::warn!("Noise reduction unavailable for this clip, using unfiltered signal"),
            }
        }

        let mut chunks = split(&samples, rate, chunk_size, &self.settings);
        if self.input == AudioInputKind::Spectrogram {
            let params = MelParams {
                sample_rate: rate,
                n_fft: self.settings.mel_n_fft,
                hop: self.settings.mel_hop,
                bands: self.settings.mel_bands,
            };
            for chunk in &mut chunks {
                let features = log_mel(&chunk.samples, &params).map_err(|e| {
                    DetectionError::Inference(format!("Spectrogram extraction failed: {}", e))
                })?;
                chunk.spectrogram = Some(features);
            }
        }

        let duration_secs = samples.len() as f64 / rate as f64;
        log::info!(
            "Prepared {} audio chunk(s) over {:.2}s (chunk_size={}, denoised={})",
            chunks.len(),
            duration_secs,
            chunk_size,
            denoised
        );

        Ok(PreparedAudio {
            chunks,
            duration_secs,
            denoised,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{tone_wav, wav_bytes};

    #[test]
    fn test_prepare_resamples_and_chunks() {
        let pre = AudioPreprocessor::new(AudioConfig::default(), AudioInputKind::Waveform);
        // 3 seconds at 8 kHz
        let prepared = pre
            .prepare(tone_wav(8_000, 3.0), Some("wav"), ChunkSize::Seconds(1.0), false)
            .unwrap();

        assert_eq!(prepared.chunks.len(), 3);
        assert!((prepared.duration_secs - 3.0).abs() < 1e-3);
        assert!(prepared.chunks.iter().all(|c| c.sample_rate == 16_000));
        assert_eq!(prepared.chunks[0].samples.len(), 16_000);
        assert!(prepared.chunks[0].spectrogram.is_none());
    }

    #[test]
    fn test_spectrogram_mode_adds_features() {
        let pre = AudioPreprocessor::new(AudioConfig::default(), AudioInputKind::Spectrogram);
        let prepared = pre
            .prepare(tone_wav(16_000, 2.0), Some("wav"), ChunkSize::Auto, false)
            .unwrap();
        assert_eq!(prepared.chunks.len(), 1);
        let features = prepared.chunks[0].spectrogram.as_ref().unwrap();
        assert_eq!(features.ncols(), 80);
    }

    #[test]
    fn test_denoise_fallback_on_tiny_clip() {
        let pre = AudioPreprocessor::new(AudioConfig::default(), AudioInputKind::Waveform);
        // 100 samples is shorter than one denoise frame
        let bytes = wav_bytes(16_000, 1, &[0.1; 100]);
        let prepared = pre.prepare(bytes, Some("wav"), ChunkSize::Auto, true).unwrap();
        assert!(!prepared.denoised);
        assert_eq!(prepared.chunks.len(), 1);
    }

    #[test]
    fn test_denoise_applied() {
        let pre = AudioPreprocessor::new(AudioConfig::default(), AudioInputKind::Waveform);
        let prepared = pre
            .prepare(tone_wav(16_000, 1.0), Some("wav"), ChunkSize::Auto, true)
            .unwrap();
        assert!(prepared.denoised);
    }

    #[test]
    fn test_empty_and_invalid_inputs() {
        let pre = AudioPreprocessor::new(AudioConfig::default(), AudioInputKind::Waveform);

        let result = pre.prepare(wav_bytes(16_000, 1, &[]), Some("wav"), ChunkSize::Auto, false);
        assert!(matches!(
            result,
            Err(DetectionError::NoFramesExtracted(_)) | Err(DetectionError::Decode(_))
        ));

        let result = pre.prepare(b"garbage".to_vec(), None, ChunkSize::Auto, false);
        assert!(matches!(result, Err(DetectionError::Decode(_))));

        let result = pre.prepare(tone_wav(16_000, 1.0), None, ChunkSize::Seconds(0.01), false);
        assert!(matches!(result, Err(DetectionError::UnsupportedConfiguration(_))));
    }
}

//! ONNX audio chunk classifier
//!
//! Wav2Vec2-style sequence classifier exported to ONNX. Waveform models take
//! `input_values [1, samples]`; spectrogram models take
//! `input_features [1, frames, bands]`. Both emit logits `[1, 2]` in label
//! order `[fake, real]`.

use std::sync::Mutex;

use ndarray::{Array2, Array3, Axis};
use ort::session::Session;
use ort::value::Tensor;

use super::ort_video::shape_matches;
use super::session::{lock_session, open_session};
use super::{checked_logits, AudioClassifier, ModelVariant, Probabilities, VariantSource};
use crate::audio::AudioChunk;
use crate::config::AudioInputKind;
use crate::error::{DetectionError, Result};
use crate::registry::DeviceKind;

const WAVEFORM_INPUT: &str = "input_values";
const SPECTROGRAM_INPUT: &str = "input_features";

/// Per-model scoring parameters
#[derive(Debug, Clone, Copy)]
pub struct AudioScoring {
    pub input: AudioInputKind,
    /// Softmax temperature; 1.0 leaves the probabilities untouched
    pub temperature: f32,
    /// Waveform chunks shorter than this are zero-padded
    pub min_input_samples: usize,
}

pub struct OrtAudioClassifier {
    session: Mutex<Session>,
    variant: ModelVariant,
    scoring: AudioScoring,
}

impl OrtAudioClassifier {
    pub fn load(
        source: VariantSource,
        device: DeviceKind,
        intra_threads: usize,
        scoring: AudioScoring,
    ) -> Result<Self> {
        let session = open_session(&source.weights, device, intra_threads)?;
        Ok(Self {
            session: Mutex::new(session),
            variant: source.place(device),
            scoring,
        })
    }

    fn run_logits(&self, chunk: &AudioChunk) -> Result<[f32; 2]> {
        let mut session = lock_session(&self.session, "audio")?;

        let outputs = match self.scoring.input {
            AudioInputKind::Waveform => {
                let samples = normalize_waveform(&chunk.samples, self.scoring.min_input_samples);
                let n = samples.len();
                let input = Array2::from_shape_vec((1, n), samples)
                    .map_err(|e| DetectionError::Inference(format!("Audio input shape error: {}", e)))?;
                let tensor = Tensor::from_array(input)
                    .map_err(|e| DetectionError::Inference(format!("Tensor creation error: {}", e)))?;
                session.run(ort::inputs![WAVEFORM_INPUT => tensor])
            }
            AudioInputKind::Spectrogram => {
                let input = spectrogram_input(chunk, &self.variant)?;
                let tensor = Tensor::from_array(input)
                    .map_err(|e| DetectionError::Inference(format!("Tensor creation error: {}", e)))?;
                session.run(ort::inputs![SPECTROGRAM_INPUT => tensor])
            }
        }
        .map_err(|e| DetectionError::from_runtime("audio inference", e))?;

        let (_, logits_value) = outputs
            .iter()
            .next()
            .ok_or_else(|| DetectionError::Inference("Audio model produced no output".into()))?;
        let (_shape, logits) = logits_value
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectionError::Inference(format!("Logits extraction error: {}", e)))?;

        checked_logits(logits)
    }
}

impl AudioClassifier for OrtAudioClassifier {
    fn variant(&self) -> &ModelVariant {
        &self.variant
    }

    fn score_chunk(&self, chunk: &AudioChunk) -> Result<Probabilities> {
        let [fake, real] = self.run_logits(chunk)?;
        Ok(calibrate([fake, real], self.scoring.temperature))
    }
}

/// `[1, frames, bands]` features for a spectrogram model, checked against
/// the declared input shape
pub fn spectrogram_input(chunk: &AudioChunk, variant: &ModelVariant) -> Result<Array3<f32>> {
    let spec = chunk.spectrogram.as_ref().ok_or_else(|| {
        DetectionError::Inference("Spectrogram model received a chunk without features".into())
    })?;
    let input = spec.to_owned().insert_axis(Axis(0));
    if !shape_matches(&variant.input_shape, input.shape()) {
        return Err(DetectionError::Inference(format!(
            "Input shape {:?} does not match model {} shape {:?}",
            input.shape(),
            variant.id,
            variant.input_shape
        )));
    }
    Ok(input)
}

/// Temperature-scaled softmax over `[fake, real]` logits
pub fn calibrate(logits: [f32; 2], temperature: f32) -> Probabilities {
    let t = if temperature > 0.0 { temperature } else { 1.0 };
    let [fake, real] = crate::types::softmax2([logits[0] / t, logits[1] / t]);
    Probabilities { real, fake }
}

/// Zero-mean / unit-variance normalisation, zero-padded to `min_len`
pub fn normalize_waveform(samples: &[f32], min_len: usize) -> Vec<f32> {
    let n = samples.len().max(1) as f64;
    let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
    let var = samples
        .iter()
        .map(|&s| {
            let d = s as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    let denom = (var + 1e-7).sqrt();

    let mut out: Vec<f32> = samples
        .iter()
        .map(|&s| ((s as f64 - mean) / denom) as f32)
        .collect();
    if out.len() < min_len {
        out.resize(min_len, 0.0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibrate_softens_extremes() {
        let raw = calibrate([-4.0, 4.0], 1.0);
        let soft = calibrate([-4.0, 4.0], 3.0);
        assert!(raw.real > soft.real);
        assert!(soft.real > 0.5);
        assert!((soft.real + soft.fake - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_calibrate_label_order() {
        let p = calibrate([5.0, -5.0], 3.0);
        assert!(p.fake > p.real);
    }

    fn spectrogram_variant(bands: i64) -> ModelVariant {
        VariantSource {
            key: crate::registry::ModelKey::Audio,
            id: "audio.onnx".to_string(),
            weights: "audio.onnx".into(),
            accuracy: 90.0,
            input_shape: vec![1, -1, bands],
        }
        .place(DeviceKind::Cpu)
    }

    #[test]
    fn test_spectrogram_input_checks_bands() {
        let mut chunk = crate::testing::silent_chunks(1).remove(0);
        chunk.spectrogram = Some(Array2::zeros((101, 80)));

        let input = spectrogram_input(&chunk, &spectrogram_variant(80)).unwrap();
        assert_eq!(input.dim(), (1, 101, 80));

        assert!(matches!(
            spectrogram_input(&chunk, &spectrogram_variant(128)),
            Err(DetectionError::Inference(_))
        ));

        chunk.spectrogram = None;
        assert!(matches!(
            spectrogram_input(&chunk, &spectrogram_variant(80)),
            Err(DetectionError::Inference(_))
        ));
    }

    #[test]
    fn test_normalize_waveform() {
        let out = normalize_waveform(&[1.0, 3.0, 1.0, 3.0], 6);
        assert_eq!(out.len(), 6);
        assert!((out[0] + 1.0).abs() < 1e-3);
        assert!((out[1] - 1.0).abs() < 1e-3);
        assert_eq!(&out[4..], &[0.0, 0.0]);

        // Silence stays finite
        let out = normalize_waveform(&[0.0; 8], 0);
        assert!(out.iter().all(|s| s.is_finite() && *s == 0.0));
    }
}

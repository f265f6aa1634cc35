//! Scoring models
//!
//! Models are opaque scoring functions with a fixed input/output contract.
//! The engines only see the [`VideoClassifier`] and [`AudioClassifier`]
//! traits; the ONNX Runtime implementations live in [`ort_video`] and
//! [`ort_audio`].

pub mod ort_audio;
pub mod ort_video;
pub(crate) mod session;

pub use ort_audio::OrtAudioClassifier;
pub use ort_video::OrtVideoClassifier;

use std::path::PathBuf;

use ndarray::Array5;

use crate::audio::AudioChunk;
use crate::error::{DetectionError, Result};
use crate::registry::{DeviceKind, ModelKey};

/// Where a variant's weights come from, before placement
#[derive(Debug, Clone, PartialEq)]
pub struct VariantSource {
    pub key: ModelKey,
    /// Identifier reported in verdicts (weights filename or model id)
    pub id: String,
    pub weights: PathBuf,
    /// Reported accuracy in percent
    pub accuracy: f32,
    /// Declared input shape; `-1` marks a dynamic axis
    pub input_shape: Vec<i64>,
}

impl VariantSource {
    /// Attach the device chosen at load time
    pub fn place(self, device: DeviceKind) -> ModelVariant {
        ModelVariant {
            key: self.key,
            id: self.id,
            weights: self.weights,
            accuracy: self.accuracy,
            input_shape: self.input_shape,
            device,
        }
    }
}

/// Immutable metadata of a loaded, device-placed model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelVariant {
    pub key: ModelKey,
    pub id: String,
    pub weights: PathBuf,
    pub accuracy: f32,
    pub input_shape: Vec<i64>,
    pub device: DeviceKind,
}

impl ModelVariant {
    /// Temporal length for fixed-length video variants
    pub fn sequence_frames(&self) -> Option<usize> {
        match self.key {
            ModelKey::Video(length) => Some(length.frames()),
            ModelKey::Audio => None,
        }
    }
}

/// Two-class probabilities (fractions summing to 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Probabilities {
    pub real: f64,
    pub fake: f64,
}

/// Temporal video classifier (per-frame feature extractor + aggregator)
pub trait VideoClassifier: Send + Sync {
    fn variant(&self) -> &ModelVariant;

    /// Score one `[1, L, 3, H, W]` sequence, returning the two raw logits in
    /// class order `[fake, real]`
    fn score(&self, sequence: Array5<f32>) -> Result<[f32; 2]>;
}

/// Per-chunk audio classifier
pub trait AudioClassifier: Send + Sync {
    fn variant(&self) -> &ModelVariant;

    /// Score one chunk independently of the others
    fn score_chunk(&self, chunk: &AudioChunk) -> Result<Probabilities>;
}

/// Validate a `[fake, real]` logit pair read back from a model
pub fn checked_logits(values: &[f32]) -> Result<[f32; 2]> {
    match values {
        [fake, real] if fake.is_finite() && real.is_finite() => Ok([*fake, *real]),
        [_, _] => Err(DetectionError::Inference(
            "Model produced non-finite logits".into(),
        )),
        other => Err(DetectionError::Inference(format!(
            "Expected 2 logits, model produced {}",
            other.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_logits() {
        assert_eq!(checked_logits(&[-1.0, 2.5]).unwrap(), [-1.0, 2.5]);
        for bad in [[f32::NAN, 0.0], [0.0, f32::INFINITY], [f32::NEG_INFINITY, 1.0]] {
            assert!(matches!(checked_logits(&bad), Err(DetectionError::Inference(_))));
        }
        assert!(matches!(
            checked_logits(&[0.1, 0.2, 0.7]),
            Err(DetectionError::Inference(_))
        ));
    }
}

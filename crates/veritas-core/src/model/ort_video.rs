//! ONNX temporal video classifier
//!
//! Exported ResNeXt50 + LSTM models take one `[1, L, 3, 112, 112]` input and
//! produce the feature map followed by the class logits `[1, 2]`. Only the
//! last output (the logits) is read.

use std::sync::Mutex;

use ndarray::Array5;
use ort::session::Session;
use ort::value::Tensor;

use super::session::{lock_session, open_session};
use super::{checked_logits, ModelVariant, VariantSource, VideoClassifier};
use crate::error::{DetectionError, Result};
use crate::registry::DeviceKind;

/// Input name of the exported video graph
const INPUT_NAME: &str = "input";

pub struct OrtVideoClassifier {
    session: Mutex<Session>,
    variant: ModelVariant,
}

impl OrtVideoClassifier {
    pub fn load(source: VariantSource, device: DeviceKind, intra_threads: usize) -> Result<Self> {
        let session = open_session(&source.weights, device, intra_threads)?;
        Ok(Self {
            session: Mutex::new(session),
            variant: source.place(device),
        })
    }
}

impl VideoClassifier for OrtVideoClassifier {
    fn variant(&self) -> &ModelVariant {
        &self.variant
    }

    fn score(&self, sequence: Array5<f32>) -> Result<[f32; 2]> {
        if !shape_matches(&self.variant.input_shape, sequence.shape()) {
            return Err(DetectionError::Inference(format!(
                "Input shape {:?} does not match model {} shape {:?}",
                sequence.shape(),
                self.variant.id,
                self.variant.input_shape
            )));
        }

        let input = Tensor::from_array(sequence)
            .map_err(|e| DetectionError::Inference(format!("Tensor creation error: {}", e)))?;

        let mut session = lock_session(&self.session, "video")?;
        let outputs = session
            .run(ort::inputs![INPUT_NAME => input])
            .map_err(|e| DetectionError::from_runtime("video inference", e))?;

        let (_, logits_value) = outputs
            .iter()
            .last()
            .ok_or_else(|| DetectionError::Inference("Video model produced no output".into()))?;
        let (_shape, logits) = logits_value
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectionError::Inference(format!("Logits extraction error: {}", e)))?;

        checked_logits(logits)
    }
}

/// Compare a concrete shape against a declared one (`-1` matches any size)
pub fn shape_matches(declared: &[i64], actual: &[usize]) -> bool {
    declared.len() == actual.len()
        && declared
            .iter()
            .zip(actual)
            .all(|(&d, &a)| d < 0 || d as usize == a)
}

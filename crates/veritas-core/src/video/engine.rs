//! Video inference engine
//!
//! Stacks the ordered frame tensors into one `[1, L, 3, H, W]` sequence and
//! scores it with a temporal classifier. Variants have a fixed temporal
//! length, so shorter sequences are padded by repeating the last frame.

use ndarray::{s, Array5};

use super::preprocess::FrameSample;
use crate::error::{DetectionError, Result};
use crate::model::{checked_logits, VideoClassifier};
use crate::types::{softmax2, ClassScores, Diagnostics, SequenceLength, Verdict, VideoDiagnostics};

/// Build the model input for `variant_frames` timesteps
pub fn stack_sequence(samples: &[FrameSample], variant_frames: usize) -> Result<Array5<f32>> {
    let first = samples
        .first()
        .ok_or(DetectionError::NoFramesExtracted("video frames"))?;
    if samples.len() > variant_frames {
        return Err(DetectionError::Inference(format!(
            "Sequence of {} frames exceeds model length {}",
            samples.len(),
            variant_frames
        )));
    }

    let (c, h, w) = first.tensor.dim();
    let mut input = Array5::<f32>::zeros((1, variant_frames, c, h, w));
    for t in 0..variant_frames {
        let sample = &samples[t.min(samples.len() - 1)];
        if sample.tensor.dim() != (c, h, w) {
            return Err(DetectionError::Inference(format!(
                "Frame {} has shape {:?}, expected {:?}",
                sample.index,
                sample.tensor.dim(),
                (c, h, w)
            )));
        }
        input.slice_mut(s![0, t, .., .., ..]).assign(&sample.tensor);
    }
    Ok(input)
}

/// Score a prepared sequence and produce the verdict
///
/// Class index 1 is REAL; confidence is the winning softmax probability in
/// percent.
pub fn infer(model: &dyn VideoClassifier, samples: &[FrameSample]) -> Result<Verdict> {
    let variant = model.variant();
    let frames = variant.sequence_frames().ok_or_else(|| {
        DetectionError::Inference(format!("Model {} is not a video model", variant.id))
    })?;
    let sequence_length = SequenceLength::from_frames(frames as u32)?;

    let input = stack_sequence(samples, frames)?;
    let logits = checked_logits(&model.score(input)?)?;
    let [fake, real] = softmax2(logits);
    let scores = ClassScores {
        real: real * 100.0,
        fake: fake * 100.0,
    };

    let faces_found = samples.iter().filter(|s| s.face.is_some()).count();
    log::info!(
        "Video verdict: {} ({:.1}%) over {} frames, {} faces, model {} on {}",
        scores.label(),
        scores.top(),
        samples.len(),
        faces_found,
        variant.id,
        variant.device
    );

    Ok(Verdict {
        label: scores.label(),
        confidence: scores.top().clamp(0.0, 100.0),
        diagnostics: Diagnostics::Video(VideoDiagnostics {
            sequence_length,
            frames_analyzed: samples.len(),
            faces_found,
            model: variant.id.clone(),
            device: variant.device,
        }),
    })
}

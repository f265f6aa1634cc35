//! Audio inference engine
//!
//! Each chunk is scored independently; the utterance-level breakdown is the
//! arithmetic mean of the per-chunk probabilities.

use super::chunking::AudioChunk;
use crate::error::{DetectionError, Result};
use crate::model::{AudioClassifier, Probabilities};
use crate::types::{AudioDiagnostics, ClassScores, Diagnostics, Verdict};

/// Mean of per-chunk probabilities, in percent
pub fn aggregate(per_chunk: &[Probabilities]) -> Option<ClassScores> {
    if per_chunk.is_empty() {
        return None;
    }
    let n = per_chunk.len() as f64;
    let real = per_chunk.iter().map(|p| p.real).sum::<f64>() / n;
    let fake = per_chunk.iter().map(|p| p.fake).sum::<f64>() / n;
    Some(ClassScores {
        real: real * 100.0,
        fake: fake * 100.0,
    })
}

pub fn infer(model: &dyn AudioClassifier, chunks: &[AudioChunk]) -> Result<Verdict> {
    if chunks.is_empty() {
        return Err(DetectionError::NoFramesExtracted("audio chunks"));
    }
    let variant = model.variant();

    let mut per_chunk = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let p = model.score_chunk(chunk)?;
        if !(p.real.is_finite() && p.fake.is_finite()) {
            return Err(DetectionError::Inference(format!(
                "Model produced non-finite scores for chunk {}",
                chunk.index
            )));
        }
        log::debug!(
            "Chunk {} [{:.2}s-{:.2}s]: real={:.4} fake={:.4}",
            chunk.index,
            chunk.start_secs(),
            chunk.end_secs(),
            p.real,
            p.fake
        );
        per_chunk.push(p);
    }

    let scores = aggregate(&per_chunk).ok_or(DetectionError::NoFramesExtracted("audio chunks"))?;
    log::info!(
        "Audio verdict: {} ({:.2}%) over {} chunk(s), model {} on {}",
        scores.label(),
        scores.top(),
        chunks.len(),
        variant.id,
        variant.device
    );

    Ok(Verdict {
        label: scores.label(),
        confidence: scores.top().clamp(0.0, 100.0),
        diagnostics: Diagnostics::Audio(AudioDiagnostics {
            model: variant.id.clone(),
            scores,
            chunks_analyzed: chunks.len(),
            device: variant.device,
        }),
    })
}

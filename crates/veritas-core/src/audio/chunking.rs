//! Audio segmentation into contiguous chunks

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;

use crate::config::AudioConfig;
use crate::error::{DetectionError, Result};

/// Requested chunk duration
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ChunkSize {
    /// Derived from the clip length
    #[default]
    Auto,
    /// Literal duration in seconds
    Seconds(f32),
}

impl FromStr for ChunkSize {
    type Err = DetectionError;

    fn from_str(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        let secs = raw
            .trim_end_matches(['s', 'S'])
            .trim()
            .parse::<f32>()
            .map_err(|_| {
                DetectionError::UnsupportedConfiguration(format!(
                    "Invalid chunk_size '{}', expected 'auto' or a duration in seconds",
                    raw
                ))
            })?;
        Ok(Self::Seconds(secs))
    }
}

impl fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Seconds(s) => write!(f, "{}s", s),
        }
    }
}

impl ChunkSize {
    /// Reject literal durations outside the configured bounds
    pub fn validate(&self, settings: &AudioConfig) -> Result<()> {
        match *self {
            Self::Auto => Ok(()),
            Self::Seconds(secs) => {
                if secs.is_finite() && secs >= settings.min_chunk_secs && secs <= settings.max_chunk_secs {
                    Ok(())
                } else {
                    Err(DetectionError::UnsupportedConfiguration(format!(
                        "chunk_size must be between {} and {} seconds, got {}",
                        settings.min_chunk_secs, settings.max_chunk_secs, secs
                    )))
                }
            }
        }
    }
}

/// One contiguous span of the analysed waveform
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Position in the chunk sequence
    pub index: usize,
    /// Start offset in samples (inclusive)
    pub start: usize,
    /// End offset in samples (exclusive)
    pub end: usize,
    pub sample_rate: u32,
    /// Resampled waveform of this span
    pub samples: Vec<f32>,
    /// `[frames, bands]` log-mel features, for spectrogram models
    pub spectrogram: Option<Array2<f32>>,
}

impl AudioChunk {
    pub fn start_secs(&self) -> f64 {
        self.start as f64 / self.sample_rate as f64
    }

    pub fn end_secs(&self) -> f64 {
        self.end as f64 / self.sample_rate as f64
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Nominal chunk length in samples for a clip of `total` samples
///
/// Auto: clips up to `auto_single_chunk_secs` are one chunk; longer clips
/// are split into `min(ceil(duration / auto_target_chunk_secs), auto_max_chunks)`
/// equal chunks.
pub fn chunk_length(total: usize, sample_rate: u32, size: ChunkSize, settings: &AudioConfig) -> usize {
    let rate = sample_rate as f64;
    let len = match size {
        ChunkSize::Seconds(secs) => (secs as f64 * rate).round() as usize,
        ChunkSize::Auto => {
            let duration = total as f64 / rate;
            if duration <= settings.auto_single_chunk_secs as f64 {
                total
            } else {
                let wanted = (duration / settings.auto_target_chunk_secs as f64).ceil() as usize;
                let count = wanted.clamp(1, settings.auto_max_chunks);
                total.div_ceil(count)
            }
        }
    };
    len.max(1)
}

/// Contiguous, non-overlapping `(start, end)` spans covering `0..total`
///
/// The final span may be shorter than `length`.
pub fn plan_spans(total: usize, length: usize) -> Vec<(usize, usize)> {
    let length = length.max(1);
    (0..total)
        .step_by(length)
        .map(|start| (start, (start + length).min(total)))
        .collect()
}

/// Split a waveform into chunks
pub fn split(samples: &[f32], sample_rate: u32, size: ChunkSize, settings: &AudioConfig) -> Vec<AudioChunk> {
    let length = chunk_length(samples.len(), sample_rate, size, settings);
    plan_spans(samples.len(), length)
        .into_iter()
        .enumerate()
        .map(|(index, (start, end))| AudioChunk {
            index,
            start,
            end,
            sample_rate,
            samples: samples[start..end].to_vec(),
            spectrogram: None,
        })
        .collect()
}

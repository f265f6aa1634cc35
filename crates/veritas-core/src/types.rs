//! Shared types for the detection pipeline

use serde::{Deserialize, Serialize};

use crate::error::{DetectionError, Result};
use crate::registry::DeviceKind;

/// Kind of media carried by a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }

    /// Parse a declared media kind (`"video"` / `"audio"`, case-insensitive)
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            other => Err(DetectionError::UnsupportedConfiguration(format!(
                "Unknown media kind '{}', expected 'video' or 'audio'",
                other
            ))),
        }
    }

    /// Infer the media kind from a MIME type such as `video/mp4`
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let base = content_type.split(';').next()?.trim().to_ascii_lowercase();
        if base.starts_with("video/") {
            Some(Self::Video)
        } else if base.starts_with("audio/") {
            Some(Self::Audio)
        } else {
            None
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of frames sampled from a video; selects the video model variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SequenceLength {
    L10,
    L20,
    L40,
    L60,
    L80,
    L100,
}

impl SequenceLength {
    /// All supported sequence lengths, ascending
    pub fn all() -> &'static [Self] {
        &[Self::L10, Self::L20, Self::L40, Self::L60, Self::L80, Self::L100]
    }

    pub fn frames(&self) -> usize {
        match self {
            Self::L10 => 10,
            Self::L20 => 20,
            Self::L40 => 40,
            Self::L60 => 60,
            Self::L80 => 80,
            Self::L100 => 100,
        }
    }

    pub fn from_frames(frames: u32) -> Result<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|l| l.frames() == frames as usize)
            .ok_or_else(|| {
                DetectionError::UnsupportedConfiguration(format!(
                    "Invalid sequence_length {}. Must be one of [10, 20, 40, 60, 80, 100]",
                    frames
                ))
            })
    }
}

impl std::fmt::Display for SequenceLength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.frames())
    }
}

/// Binary authenticity label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    Real,
    Fake,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Real => "REAL",
            Self::Fake => "FAKE",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-class probabilities in percent (0-100)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub real: f64,
    pub fake: f64,
}

impl ClassScores {
    /// Label of the larger score; ties resolve to REAL
    pub fn label(&self) -> Label {
        if self.real >= self.fake {
            Label::Real
        } else {
            Label::Fake
        }
    }

    /// Score of the winning class
    pub fn top(&self) -> f64 {
        self.real.max(self.fake)
    }
}

/// Diagnostics attached to a video verdict
#[derive(Debug, Clone, PartialEq)]
pub struct VideoDiagnostics {
    pub sequence_length: SequenceLength,
    pub frames_analyzed: usize,
    pub faces_found: usize,
    pub model: String,
    pub device: DeviceKind,
}

/// Diagnostics attached to an audio verdict
#[derive(Debug, Clone, PartialEq)]
pub struct AudioDiagnostics {
    pub model: String,
    pub scores: ClassScores,
    pub chunks_analyzed: usize,
    pub device: DeviceKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostics {
    Video(VideoDiagnostics),
    Audio(AudioDiagnostics),
}

/// Final REAL/FAKE decision for one request
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub label: Label,
    /// Probability of `label` in percent, always within [0, 100]
    pub confidence: f64,
    pub diagnostics: Diagnostics,
}

impl Verdict {
    pub fn device(&self) -> DeviceKind {
        match &self.diagnostics {
            Diagnostics::Video(d) => d.device,
            Diagnostics::Audio(d) => d.device,
        }
    }
}

/// Numerically stable softmax over two logits
pub fn softmax2(logits: [f32; 2]) -> [f64; 2] {
    let a = logits[0] as f64;
    let b = logits[1] as f64;
    let max = a.max(b);
    let ea = (a - max).exp();
    let eb = (b - max).exp();
    let total = ea + eb;
    [ea / total, eb / total]
}

//! Wire shapes returned by the gateway

use serde::Serialize;

use crate::error::DetectionError;
use crate::registry::{CatalogListing, DeviceKind};
use crate::types::{Diagnostics, Label, Verdict};

pub const SERVICE_NAME: &str = "Deepfake Detection API";

/// Round `value` to `decimals` places for presentation
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Outcome of one successful request
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub verdict: Verdict,
    /// `data:` URLs of the first few sampled frames (video only)
    pub frame_images: Vec<String>,
}

impl Prediction {
    pub fn body(&self) -> PredictionBody {
        let verdict = &self.verdict;
        match &verdict.diagnostics {
            Diagnostics::Video(d) => PredictionBody::Video(VideoResponse {
                prediction: verdict.label,
                confidence: round_to(verdict.confidence, 1),
                sequence_length: d.sequence_length.frames(),
                device: d.device,
                model: d.model.clone(),
                faces_found: d.faces_found,
                total_frames_analyzed: d.frames_analyzed,
                frame_images: self.frame_images.clone(),
            }),
            Diagnostics::Audio(d) => PredictionBody::Audio(AudioResponse {
                prediction: verdict.label,
                confidence: round_to(verdict.confidence, 2),
                model: d.model.clone(),
                all_scores: ScoreBreakdown {
                    real: round_to(d.scores.real, 2),
                    fake: round_to(d.scores.fake, 2),
                },
                device: d.device,
                chunks_analyzed: d.chunks_analyzed,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum PredictionBody {
    Video(VideoResponse),
    Audio(AudioResponse),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VideoResponse {
    pub prediction: Label,
    pub confidence: f64,
    pub sequence_length: usize,
    pub device: DeviceKind,
    pub model: String,
    pub faces_found: usize,
    pub total_frames_analyzed: usize,
    pub frame_images: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ScoreBreakdown {
    pub real: f64,
    pub fake: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AudioResponse {
    pub prediction: Label,
    pub confidence: f64,
    pub model: String,
    pub all_scores: ScoreBreakdown,
    pub device: DeviceKind,
    pub chunks_analyzed: usize,
}

/// `GET /api/models`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModelsResponse {
    pub available_models: Vec<CatalogListing>,
    pub total: usize,
}

/// `GET /`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub device: DeviceKind,
    pub capabilities: [&'static str; 2],
}

/// Structured error body
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
}

impl From<&DetectionError> for ErrorBody {
    fn from(err: &DetectionError) -> Self {
        Self {
            error: err.public_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AudioDiagnostics, ClassScores, SequenceLength, VideoDiagnostics};

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(87.6543, 1), 87.7);
        assert_eq!(round_to(87.6543, 2), 87.65);
        assert_eq!(round_to(100.0, 2), 100.0);
    }

    #[test]
    fn test_video_body() {
        let prediction = Prediction {
            verdict: Verdict {
                label: Label::Fake,
                confidence: 91.2345,
                diagnostics: Diagnostics::Video(VideoDiagnostics {
                    sequence_length: SequenceLength::L60,
                    frames_analyzed: 60,
                    faces_found: 58,
                    model: "model_97.7_acc_60_frames_FF_data.onnx".into(),
                    device: DeviceKind::Cuda,
                }),
            },
            frame_images: vec!["data:image/png;base64,AAAA".into()],
        };

        let PredictionBody::Video(body) = prediction.body() else {
            panic!("expected a video body");
        };
        assert_eq!(body.prediction, Label::Fake);
        assert_eq!(body.confidence, 91.2);
        assert_eq!(body.sequence_length, 60);
        assert_eq!(body.faces_found, 58);
        assert_eq!(body.frame_images.len(), 1);
    }

    #[test]
    fn test_audio_body() {
        let prediction = Prediction {
            verdict: Verdict {
                label: Label::Real,
                confidence: 70.004,
                diagnostics: Diagnostics::Audio(AudioDiagnostics {
                    model: "MelodyMachine/Deepfake-audio-detection-V2".into(),
                    scores: ClassScores {
                        real: 70.004,
                        fake: 29.996,
                    },
                    chunks_analyzed: 2,
                    device: DeviceKind::Cpu,
                }),
            },
            frame_images: Vec::new(),
        };

        match prediction.body() {
            PredictionBody::Audio(body) => {
                assert_eq!(body.confidence, 70.0);
                assert_eq!(body.all_scores, ScoreBreakdown { real: 70.0, fake: 30.0 });
                assert_eq!(body.device, DeviceKind::Cpu);
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_error_body_hides_server_detail() {
        let body = ErrorBody::from(&DetectionError::Inference("CUDA kernel 0x7f failed".into()));
        assert!(!body.error.contains("0x7f"));
        let body = ErrorBody::from(&DetectionError::Decode("truncated".into()));
        assert!(body.error.contains("truncated"));
    }
}

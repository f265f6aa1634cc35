//! Detection error taxonomy
//!
//! Every failure the pipeline can surface to a caller is one of these
//! variants. Best-effort steps (face localisation, denoising) never produce
//! an error; they fall back locally.

use thiserror::Error;

/// Errors that can abort a prediction request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("Upload of {size} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Failed to decode media: {0}")]
    Decode(String),

    #[error("No usable {0} could be extracted from the upload")]
    NoFramesExtracted(&'static str),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Resources exhausted: {0}")]
    ResourceExhausted(String),
}

pub type Result<T> = std::result::Result<T, DetectionError>;

impl DetectionError {
    /// HTTP status code this error maps to at the transport boundary
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnsupportedConfiguration(_) => 400,
            Self::PayloadTooLarge { .. } => 413,
            Self::Decode(_) => 400,
            Self::NoFramesExtracted(_) => 422,
            Self::ModelLoad(_) => 500,
            Self::Inference(_) => 500,
            Self::ResourceExhausted(_) => 503,
        }
    }

    /// True for errors caused by the request itself (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }

    /// Message safe to hand to a remote caller.
    ///
    /// Client errors carry their full description; server-side failures are
    /// reduced to a fixed sentence so no paths or runtime internals leak.
    pub fn public_message(&self) -> String {
        match self {
            Self::ModelLoad(_) => "The detection model is currently unavailable".to_string(),
            Self::Inference(_) => "Prediction failed while scoring the media".to_string(),
            Self::ResourceExhausted(_) => {
                "The server is busy, please retry shortly".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Classify an ONNX Runtime failure raised while scoring.
    ///
    /// Allocation failures on the device become `ResourceExhausted`, anything
    /// else is an `Inference` error.
    pub fn from_runtime(context: &str, message: impl std::fmt::Display) -> Self {
        let message = message.to_string();
        let lowered = message.to_ascii_lowercase();
        if lowered.contains("out of memory")
            || lowered.contains("failed to allocate")
            || lowered.contains("cuda_error_out_of_memory")
        {
            Self::ResourceExhausted(format!("{}: {}", context, message))
        } else {
            Self::Inference(format!("{}: {}", context, message))
        }
    }
}

//! Veritas Core - deepfake detection inference pipeline
//!
//! This crate turns an uploaded video or audio file into a REAL/FAKE
//! [`Verdict`]. It contains:
//! - Model registry with per-variant load-once caching and device placement
//! - Video preprocessing (frame sampling, face cropping, normalisation)
//! - Audio preprocessing (decode, resample, chunking, denoise, spectrogram)
//! - Video and audio inference engines with score aggregation
//! - A transport-agnostic prediction gateway
//!
//! The HTTP binding lives in the `veritas-server` crate.

pub mod audio;
pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod registry;
pub mod types;
pub mod video;

#[cfg(test)]
mod testing;

pub use error::{DetectionError, Result};
pub use gateway::{MediaOptions, MediaRequest, Prediction, PredictionGateway};
pub use registry::{DeviceKind, ModelKey, ModelRegistry};
pub use types::{ClassScores, Diagnostics, Label, MediaKind, SequenceLength, Verdict};

//! Prediction gateway
//!
//! Request boundary of the pipeline. Per request:
//!
//! 1. validate kind, options, size and declared type (no decoding yet)
//! 2. preprocess on the blocking pool
//! 3. resolve the model variant from the registry
//! 4. wait for an inference slot on the variant's device
//! 5. score on the blocking pool and shape the response
//!
//! Any failure aborts only the current request; buffers are request-scoped
//! and cached variants are never mutated.

pub mod admission;
pub mod request;
pub mod response;
pub mod upload;

pub use admission::AdmissionGate;
pub use request::{parse_flag, resolve_kind, MediaOptions, MediaRequest, RequestFields, AUDIO_EXTENSIONS};
pub use response::{
    ErrorBody, HealthResponse, ModelsResponse, Prediction, PredictionBody, SERVICE_NAME,
};
pub use upload::UploadBuffer;

use std::sync::Arc;

use tokio::task::JoinError;

use crate::audio::{self, AudioPreprocessor};
use crate::config::{ServiceConfig, UploadLimits};
use crate::error::{DetectionError, Result};
use crate::registry::ModelRegistry;
use crate::video::{self, build_face_locator, FaceLocator, FfmpegDecoder, VideoDecoder, VideoPreprocessor};

fn worker_failed(stage: &str, e: JoinError) -> DetectionError {
    DetectionError::Inference(format!("{} task failed: {}", stage, e))
}

pub struct PredictionGateway {
    registry: Arc<ModelRegistry>,
    video: Arc<VideoPreprocessor>,
    audio: Arc<AudioPreprocessor>,
    admission: AdmissionGate,
    limits: UploadLimits,
    max_thumbnails: usize,
}

impl PredictionGateway {
    /// Gateway backed by ONNX Runtime, ffmpeg and the configured face detector
    pub fn new(config: &ServiceConfig) -> Self {
        let decoder = Arc::new(FfmpegDecoder::new(
            config.video.ffmpeg_bin.clone(),
            config.video.ffprobe_bin.clone(),
        ));
        Self::with_parts(
            config,
            ModelRegistry::new(config),
            decoder,
            build_face_locator(config),
        )
    }

    pub fn with_parts(
        config: &ServiceConfig,
        registry: ModelRegistry,
        decoder: Arc<dyn VideoDecoder>,
        faces: Arc<dyn FaceLocator>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            video: Arc::new(VideoPreprocessor::new(decoder, faces, config.video.clone())),
            audio: Arc::new(AudioPreprocessor::new(
                config.audio.clone(),
                config.models.audio_input,
            )),
            admission: AdmissionGate::new(&config.admission),
            limits: config.limits.clone(),
            max_thumbnails: config.video.max_response_thumbnails,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    /// Run one request to a complete prediction or a single error
    pub async fn predict(&self, request: MediaRequest) -> Result<Prediction> {
        log::info!(
            "Prediction request: {:?}, {} bytes, file {:?}",
            request.options,
            request.bytes.len(),
            request.filename
        );
        request.validate(&self.limits)?;
        if let MediaOptions::Audio { chunk_size, .. } = request.options {
            self.audio.validate(chunk_size)?;
        }

        match request.options {
            MediaOptions::Video {
                sequence_length,
                face_focus,
            } => {
                let preprocessor = self.video.clone();
                let bytes = request.bytes;
                let prepared = tokio::task::spawn_blocking(move || {
                    preprocessor.prepare(&bytes, sequence_length, face_focus)
                })
                .await
                .map_err(|e| worker_failed("Video preprocessing", e))??;

                let model = self.registry.resolve_video(sequence_length).await?;
                let frame_images = prepared
                    .thumbnails
                    .iter()
                    .take(self.max_thumbnails)
                    .map(|t| t.data_url())
                    .collect();

                let verdict = {
                    let _slot = self.admission.admit(model.variant().device).await?;
                    let samples = prepared.samples;
                    tokio::task::spawn_blocking(move || video::engine::infer(model.as_ref(), &samples))
                        .await
                        .map_err(|e| worker_failed("Video inference", e))??
                };

                Ok(Prediction {
                    verdict,
                    frame_images,
                })
            }
            MediaOptions::Audio {
                chunk_size,
                noise_reduction,
            } => {
                let preprocessor = self.audio.clone();
                let extension = request.extension();
                let bytes = request.bytes;
                let prepared = tokio::task::spawn_blocking(move || {
                    preprocessor.prepare(bytes, extension.as_deref(), chunk_size, noise_reduction)
                })
                .await
                .map_err(|e| worker_failed("Audio preprocessing", e))??;

                let model = self.registry.resolve_audio().await?;
                let verdict = {
                    let _slot = self.admission.admit(model.variant().device).await?;
                    let chunks = prepared.chunks;
                    tokio::task::spawn_blocking(move || audio::engine::infer(model.as_ref(), &chunks))
                        .await
                        .map_err(|e| worker_failed("Audio inference", e))??
                };

                Ok(Prediction {
                    verdict,
                    frame_images: Vec::new(),
                })
            }
        }
    }

    /// Video weights currently available, sorted by frame count
    pub fn models(&self) -> ModelsResponse {
        let available_models: Vec<_> = self
            .registry
            .catalog()
            .iter()
            .map(|entry| entry.listing())
            .collect();
        ModelsResponse {
            total: available_models.len(),
            available_models,
        }
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "online",
            service: SERVICE_NAME,
            version: env!("CARGO_PKG_VERSION"),
            device: self.registry.placement(),
            capabilities: ["video", "audio"],
        }
    }
}

//! Model registry & cache
//!
//! Maps a configuration key to a loaded, device-placed scoring model. The key
//! set is fixed (six video sequence lengths plus one audio model), so every
//! key gets its own [`OnceCell`] up front:
//!
//! - concurrent first resolutions of one key perform a single load, other
//!   keys are never blocked by it
//! - once loaded, a variant lives for the rest of the process
//! - a failed load leaves the cell empty, so the next call retries

pub mod catalog;
mod device;
mod loader;

pub use catalog::{CatalogEntry, CatalogListing};
pub use device::{cuda_available, select_device, DeviceKind};
pub use loader::{ModelLoader, OrtModelLoader};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::config::{AudioInputKind, ServiceConfig};
use crate::error::{DetectionError, Result};
use crate::model::{AudioClassifier, VariantSource, VideoClassifier};
use crate::types::{MediaKind, SequenceLength};

/// Configuration key identifying one model variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKey {
    Video(SequenceLength),
    Audio,
}

impl ModelKey {
    /// Validate a `(kind, key)` pair against the supported variants
    ///
    /// Video requires a supported sequence length; audio has a single variant
    /// and accepts no key.
    pub fn parse(kind: MediaKind, key: Option<u32>) -> Result<Self> {
        match (kind, key) {
            (MediaKind::Video, Some(frames)) => Ok(Self::Video(SequenceLength::from_frames(frames)?)),
            (MediaKind::Video, None) => Err(DetectionError::UnsupportedConfiguration(
                "sequence_length is required for video".to_string(),
            )),
            (MediaKind::Audio, None) => Ok(Self::Audio),
            (MediaKind::Audio, Some(k)) => Err(DetectionError::UnsupportedConfiguration(format!(
                "Audio has a single model variant, got key {}",
                k
            ))),
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Video(_) => MediaKind::Video,
            Self::Audio => MediaKind::Audio,
        }
    }
}

impl std::fmt::Display for ModelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Video(length) => write!(f, "video/{}", length),
            Self::Audio => f.write_str("audio"),
        }
    }
}

/// A resolved scoring model
#[derive(Clone)]
pub enum ResolvedModel {
    Video(Arc<dyn VideoClassifier>),
    Audio(Arc<dyn AudioClassifier>),
}

pub struct ModelRegistry {
    models_dir: PathBuf,
    input_size: u32,
    audio_source: VariantSource,
    loader: Arc<dyn ModelLoader>,
    video: HashMap<SequenceLength, OnceCell<Arc<dyn VideoClassifier>>>,
    audio: OnceCell<Arc<dyn AudioClassifier>>,
}

impl ModelRegistry {
    /// Registry backed by ONNX Runtime
    pub fn new(config: &ServiceConfig) -> Self {
        Self::with_loader(config, Arc::new(OrtModelLoader::new(config)))
    }

    pub fn with_loader(config: &ServiceConfig, loader: Arc<dyn ModelLoader>) -> Self {
        let audio_shape = match config.models.audio_input {
            AudioInputKind::Waveform => vec![1, -1],
            AudioInputKind::Spectrogram => vec![1, -1, config.audio.mel_bands as i64],
        };
        let audio_source = VariantSource {
            key: ModelKey::Audio,
            id: config.models.audio_model_id.clone(),
            weights: config.models.audio_path(),
            accuracy: config.models.audio_accuracy * 100.0,
            input_shape: audio_shape,
        };

        Self {
            models_dir: config.models.dir.clone(),
            input_size: config.video.input_size,
            audio_source,
            loader,
            video: SequenceLength::all()
                .iter()
                .map(|&length| (length, OnceCell::new()))
                .collect(),
            audio: OnceCell::new(),
        }
    }

    /// Resolve any key
    pub async fn resolve(&self, key: ModelKey) -> Result<ResolvedModel> {
        match key {
            ModelKey::Video(length) => self.resolve_video(length).await.map(ResolvedModel::Video),
            ModelKey::Audio => self.resolve_audio().await.map(ResolvedModel::Audio),
        }
    }

    pub async fn resolve_video(&self, length: SequenceLength) -> Result<Arc<dyn VideoClassifier>> {
        let cell = self.video.get(&length).ok_or_else(|| {
            DetectionError::UnsupportedConfiguration(format!("No video variant for {} frames", length))
        })?;

        if let Some(model) = cell.get() {
            log::debug!("Registry: cache hit for video/{}", length);
            return Ok(model.clone());
        }

        let model = cell
            .get_or_try_init(|| async {
                let source = self.video_source(length)?;
                let loader = self.loader.clone();
                tokio::task::spawn_blocking(move || loader.load_video(source))
                    .await
                    .map_err(|e| DetectionError::ModelLoad(format!("Load task failed: {}", e)))?
            })
            .await?;

        Ok(model.clone())
    }

    pub async fn resolve_audio(&self) -> Result<Arc<dyn AudioClassifier>> {
        if let Some(model) = self.audio.get() {
            log::debug!("Registry: cache hit for audio");
            return Ok(model.clone());
        }

        let model = self
            .audio
            .get_or_try_init(|| async {
                let source = self.audio_source.clone();
                let loader = self.loader.clone();
                tokio::task::spawn_blocking(move || loader.load_audio(source))
                    .await
                    .map_err(|e| DetectionError::ModelLoad(format!("Load task failed: {}", e)))?
            })
            .await?;

        Ok(model.clone())
    }

    /// Whether `key` currently has a loaded instance
    pub fn is_loaded(&self, key: ModelKey) -> bool {
        match key {
            ModelKey::Video(length) => self.video.get(&length).is_some_and(|c| c.initialized()),
            ModelKey::Audio => self.audio.initialized(),
        }
    }

    /// Video weights currently present in the models directory
    pub fn catalog(&self) -> Vec<CatalogEntry> {
        catalog::scan_catalog(&self.models_dir)
    }

    /// Device new models would be placed on
    pub fn placement(&self) -> DeviceKind {
        self.loader.placement()
    }

    fn video_source(&self, length: SequenceLength) -> Result<VariantSource> {
        let entries = self.catalog();
        let entry = catalog::best_for(&entries, length).ok_or_else(|| {
            DetectionError::ModelLoad(format!(
                "No weights for {} frames in {:?}",
                length, self.models_dir
            ))
        })?;

        let size = self.input_size as i64;
        Ok(VariantSource {
            key: ModelKey::Video(length),
            id: entry.filename.clone(),
            weights: entry.path.clone(),
            accuracy: entry.accuracy,
            input_shape: vec![1, length.frames() as i64, 3, size, size],
        })
    }
}

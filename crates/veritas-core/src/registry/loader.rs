//! Model loading backend
//!
//! The registry decides *which* weights to load; a [`ModelLoader`] turns
//! them into a device-placed scoring model. Loads are blocking and run on
//! the blocking thread pool.

use std::sync::Arc;
use std::time::Instant;

use super::device::{select_device, DeviceKind};
use crate::config::{DevicePreference, ServiceConfig};
use crate::error::Result;
use crate::model::ort_audio::AudioScoring;
use crate::model::{
    AudioClassifier, OrtAudioClassifier, OrtVideoClassifier, VariantSource, VideoClassifier,
};

pub trait ModelLoader: Send + Sync {
    fn load_video(&self, source: VariantSource) -> Result<Arc<dyn VideoClassifier>>;

    fn load_audio(&self, source: VariantSource) -> Result<Arc<dyn AudioClassifier>>;

    /// Device new models would be placed on
    fn placement(&self) -> DeviceKind;
}

/// ONNX Runtime backed loader
pub struct OrtModelLoader {
    device: DevicePreference,
    intra_threads: usize,
    audio_scoring: AudioScoring,
}

impl OrtModelLoader {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            device: config.models.device,
            intra_threads: config.models.intra_threads,
            audio_scoring: AudioScoring {
                input: config.models.audio_input,
                temperature: config.audio.temperature,
                min_input_samples: config.audio.min_model_input_samples,
            },
        }
    }
}

impl ModelLoader for OrtModelLoader {
    fn load_video(&self, source: VariantSource) -> Result<Arc<dyn VideoClassifier>> {
        let device = select_device(self.device);
        log::info!(
            "Loading video model {} ({}) on {}",
            source.key,
            source.weights.display(),
            device
        );
        let start = Instant::now();
        let model = OrtVideoClassifier::load(source, device, self.intra_threads)?;
        log::info!(
            "Video model {} ready in {:.2}s",
            model.variant().id,
            start.elapsed().as_secs_f32()
        );
        Ok(Arc::new(model))
    }

    fn load_audio(&self, source: VariantSource) -> Result<Arc<dyn AudioClassifier>> {
        let device = select_device(self.device);
        log::info!(
            "Loading audio model {} ({}) on {}",
            source.id,
            source.weights.display(),
            device
        );
        let start = Instant::now();
        let model = OrtAudioClassifier::load(source, device, self.intra_threads, self.audio_scoring)?;
        log::info!(
            "Audio model {} ready in {:.2}s",
            model.variant().id,
            start.elapsed().as_secs_f32()
        );
        Ok(Arc::new(model))
    }

    fn placement(&self) -> DeviceKind {
        select_device(self.device)
    }
}

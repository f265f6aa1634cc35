//! Service configuration
//!
//! The whole service is driven by one [`ServiceConfig`] tree persisted as
//! YAML. Every section defaults sensibly, so a partial file (or none at all)
//! is valid.
//!
//! ```ignore
//! use veritas_core::config::{load_config, default_config_path};
//!
//! let config = load_config(&default_config_path());
//! ```

mod io;
mod paths;

pub use io::{load_config, save_config};
pub use paths::{default_config_path, default_models_dir};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub video: VideoConfig,
    pub audio: AudioConfig,
    pub limits: UploadLimits,
    pub admission: AdmissionConfig,
}

impl ServiceConfig {
    /// Clamp every section into its supported range
    pub fn validate(&mut self) {
        self.models.validate();
        self.video.validate();
        self.audio.validate();
        self.limits.validate();
        self.admission.validate();
    }
}

/// HTTP binding and cross-origin policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Development origins that are always allowed
    pub allowed_origins: Vec<String>,
    /// Production frontend origin, appended to the allow-list when set
    pub frontend_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            allowed_origins: vec![
                "http://localhost:8080".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:8080".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
            frontend_url: None,
        }
    }
}

impl ServerConfig {
    /// Effective CORS allow-list
    pub fn cors_origins(&self) -> Vec<String> {
        let mut origins = self.allowed_origins.clone();
        if let Some(url) = self.frontend_url.as_deref().map(str::trim) {
            if !url.is_empty() && !origins.iter().any(|o| o == url) {
                origins.push(url.to_string());
            }
        }
        origins
    }
}

/// Where the accelerator should be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// Use CUDA when the execution provider is available, CPU otherwise
    #[default]
    Auto,
    Cpu,
    Cuda,
}

/// What the audio model consumes per chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioInputKind {
    /// Raw 16 kHz waveform (Wav2Vec2-style models)
    #[default]
    Waveform,
    /// Log-mel spectrogram frames
    Spectrogram,
}

/// Model weights and placement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Directory holding `model_{acc}_acc_{frames}_frames_*.onnx` video
    /// weights, the audio model and the optional face detector
    pub dir: PathBuf,
    /// Audio model filename inside `dir`
    pub audio_file: String,
    /// Identifier reported back in audio verdicts
    pub audio_model_id: String,
    /// Reported accuracy of the audio model (fraction)
    pub audio_accuracy: f32,
    pub audio_input: AudioInputKind,
    /// Face detector filename inside `dir`; face focus falls back to full
    /// frames when it is absent
    pub face_detector_file: Option<String>,
    pub device: DevicePreference,
    /// ONNX Runtime intra-op threads per session (0 = runtime default)
    pub intra_threads: usize,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: default_models_dir(),
            audio_file: "deepfake-audio-detection-v2.onnx".to_string(),
            audio_model_id: "MelodyMachine/Deepfake-audio-detection-V2".to_string(),
            audio_accuracy: 0.997,
            audio_input: AudioInputKind::Waveform,
            face_detector_file: Some("face-detector-rfb-320.onnx".to_string()),
            device: DevicePreference::Auto,
            intra_threads: 0,
        }
    }
}

impl ModelsConfig {
    pub fn validate(&mut self) {
        self.audio_accuracy = self.audio_accuracy.clamp(0.0, 1.0);
        self.intra_threads = self.intra_threads.min(64);
    }

    pub fn audio_path(&self) -> PathBuf {
        self.dir.join(&self.audio_file)
    }

    pub fn face_detector_path(&self) -> Option<PathBuf> {
        self.face_detector_file.as_ref().map(|f| self.dir.join(f))
    }
}

/// Video preprocessing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Square edge of the model input (pixels)
    pub input_size: u32,
    /// Per-channel normalisation applied after scaling to [0, 1]
    pub mean: [f32; 3],
    pub std: [f32; 3],
    /// Pixels added on each side of a detected face box
    pub face_margin_px: u32,
    /// Detections below this score are ignored
    pub face_min_confidence: f32,
    /// Thumbnails are shrunk to fit this edge (never enlarged)
    pub thumbnail_size: u32,
    /// Number of thumbnails returned in a response
    pub max_response_thumbnails: usize,
    /// Decoder binaries, resolved through `PATH` unless absolute
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            input_size: 112,
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
            face_margin_px: 40,
            face_min_confidence: 0.7,
            thumbnail_size: 224,
            max_response_thumbnails: 6,
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
        }
    }
}

impl VideoConfig {
    pub fn validate(&mut self) {
        self.input_size = self.input_size.clamp(16, 1024);
        for s in &mut self.std {
            if !(*s > 1e-6) {
                *s = 1.0;
            }
        }
        self.face_margin_px = self.face_margin_px.min(512);
        self.face_min_confidence = self.face_min_confidence.clamp(0.0, 1.0);
        self.thumbnail_size = self.thumbnail_size.clamp(16, 1024);
        self.max_response_thumbnails = self.max_response_thumbnails.min(100);
    }
}

/// Spectral-gating denoiser parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiseConfig {
    pub n_fft: usize,
    pub hop: usize,
    /// Fraction of quietest frames used to estimate the noise floor
    pub noise_quantile: f32,
    /// Bins below `floor * threshold` are attenuated
    pub threshold: f32,
    /// Gain applied to gated bins
    pub attenuation: f32,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            n_fft: 512,
            hop: 128,
            noise_quantile: 0.1,
            threshold: 1.5,
            attenuation: 0.1,
        }
    }
}

impl DenoiseConfig {
    pub fn validate(&mut self) {
        self.n_fft = self.n_fft.clamp(64, 8192);
        self.hop = self.hop.clamp(1, self.n_fft);
        self.noise_quantile = self.noise_quantile.clamp(0.01, 1.0);
        self.threshold = self.threshold.max(1.0);
        self.attenuation = self.attenuation.clamp(0.0, 1.0);
    }
}

/// Audio preprocessing and calibration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate the model expects
    pub sample_rate: u32,
    /// With `chunk_size = auto`, clips up to this length form one chunk
    pub auto_single_chunk_secs: f32,
    /// With `chunk_size = auto`, preferred length of each chunk
    pub auto_target_chunk_secs: f32,
    /// With `chunk_size = auto`, upper bound on the chunk count
    pub auto_max_chunks: usize,
    /// Bounds accepted for a literal chunk size
    pub min_chunk_secs: f32,
    pub max_chunk_secs: f32,
    /// Softmax temperature applied to per-chunk logits (1.0 = none)
    pub temperature: f32,
    /// Chunks shorter than this are zero-padded before scoring
    pub min_model_input_samples: usize,
    pub mel_bands: usize,
    pub mel_n_fft: usize,
    pub mel_hop: usize,
    pub denoise: DenoiseConfig,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            auto_single_chunk_secs: 10.0,
            auto_target_chunk_secs: 10.0,
            auto_max_chunks: 8,
            min_chunk_secs: 0.5,
            max_chunk_secs: 600.0,
            temperature: 3.0,
            min_model_input_samples: 1_600,
            mel_bands: 80,
            mel_n_fft: 400,
            mel_hop: 160,
            denoise: DenoiseConfig::default(),
        }
    }
}

impl AudioConfig {
    pub fn validate(&mut self) {
        self.sample_rate = self.sample_rate.clamp(8_000, 48_000);
        self.auto_single_chunk_secs = self.auto_single_chunk_secs.clamp(1.0, 600.0);
        self.auto_target_chunk_secs = self.auto_target_chunk_secs.clamp(1.0, 600.0);
        self.auto_max_chunks = self.auto_max_chunks.clamp(1, 64);
        self.min_chunk_secs = self.min_chunk_secs.clamp(0.1, 60.0);
        self.max_chunk_secs = self.max_chunk_secs.max(self.min_chunk_secs);
        if !(self.temperature > 0.0) {
            self.temperature = 1.0;
        }
        self.mel_bands = self.mel_bands.clamp(8, 256);
        self.mel_n_fft = self.mel_n_fft.clamp(64, 4096);
        self.mel_hop = self.mel_hop.clamp(1, self.mel_n_fft);
        self.denoise.validate();
    }
}

/// Upload size bounds, enforced before any decoding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadLimits {
    pub max_video_upload_bytes: usize,
    pub max_audio_upload_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_video_upload_bytes: 200 * 1024 * 1024,
            max_audio_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl UploadLimits {
    pub fn validate(&mut self) {
        self.max_video_upload_bytes = self.max_video_upload_bytes.max(1);
        self.max_audio_upload_bytes = self.max_audio_upload_bytes.max(1);
    }

    /// Largest upload accepted for any media kind
    pub fn max_any(&self) -> usize {
        self.max_video_upload_bytes.max(self.max_audio_upload_bytes)
    }
}

/// Bounded-concurrency gate in front of inference
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Concurrent inference calls per accelerator device
    pub gpu_max_concurrent: usize,
    /// Concurrent inference calls on CPU placement
    pub cpu_max_concurrent: usize,
    /// Waiting longer than this for a slot fails with `ResourceExhausted`
    pub acquire_timeout_secs: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            gpu_max_concurrent: 1,
            cpu_max_concurrent: 4,
            acquire_timeout_secs: 30,
        }
    }
}

impl AdmissionConfig {
    pub fn validate(&mut self) {
        self.gpu_max_concurrent = self.gpu_max_concurrent.clamp(1, 64);
        self.cpu_max_concurrent = self.cpu_max_concurrent.clamp(1, 256);
        self.acquire_timeout_secs = self.acquire_timeout_secs.clamp(1, 3600);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.video.input_size, 112);
        assert_eq!(config.video.face_margin_px, 40);
        assert_eq!(config.audio.sample_rate, 16_000);
        assert_eq!(config.limits.max_audio_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.admission.gpu_max_concurrent, 1);
    }

    #[test]
    fn test_validation_clamps_values() {
        let mut config = ServiceConfig::default();
        config.admission.gpu_max_concurrent = 0;
        config.audio.temperature = -2.0;
        config.video.std = [0.0, 0.5, f32::NAN];
        config.audio.denoise.hop = 100_000;
        config.validate();

        assert_eq!(config.admission.gpu_max_concurrent, 1);
        assert_eq!(config.audio.temperature, 1.0);
        assert_eq!(config.video.std, [1.0, 0.5, 1.0]);
        assert_eq!(config.audio.denoise.hop, config.audio.denoise.n_fft);
    }

    #[test]
    fn test_cors_origins_append_frontend() {
        let mut server = ServerConfig::default();
        assert_eq!(server.cors_origins().len(), 4);

        server.frontend_url = Some("https://detect.example.org".to_string());
        let origins = server.cors_origins();
        assert_eq!(origins.len(), 5);
        assert_eq!(origins.last().unwrap(), "https://detect.example.org");

        server.frontend_url = Some("   ".to_string());
        assert_eq!(server.cors_origins().len(), 4);
    }
}

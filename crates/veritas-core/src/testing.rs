//! Deterministic in-memory stand-ins for models, decoders and detectors

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::{Rgb, RgbImage};
use ndarray::{Array3, Array5};

use crate::audio::AudioChunk;
use crate::error::{DetectionError, Result};
use crate::model::ort_video::shape_matches;
use crate::model::{
    AudioClassifier, ModelVariant, Probabilities, VariantSource, VideoClassifier,
};
use crate::registry::{DeviceKind, ModelKey, ModelLoader};
use crate::types::SequenceLength;
use crate::video::decode::{DecodedFrames, VideoDecoder, VideoInfo};
use crate::video::face::{FaceBox, FaceLocator};
use crate::video::FrameSample;

pub const AUDIO_MODEL_ID: &str = "MelodyMachine/Deepfake-audio-detection-V2";

/// One weights file per supported sequence length
pub fn write_video_weights(dir: &Path) {
    for &length in SequenceLength::all() {
        let name = format!("model_9{}.5_acc_{}_frames_test.onnx", length.frames() % 10, length.frames());
        std::fs::write(dir.join(name), b"onnx").unwrap();
    }
}

pub struct FixedVideoClassifier {
    variant: ModelVariant,
    logits: [f32; 2],
    pub calls: AtomicUsize,
}

impl FixedVideoClassifier {
    pub fn new(length: SequenceLength, logits: [f32; 2], frame_size: i64) -> Self {
        let source = VariantSource {
            key: ModelKey::Video(length),
            id: format!("model_test_{}.onnx", length),
            weights: "model.onnx".into(),
            accuracy: 90.0,
            input_shape: vec![1, length.frames() as i64, 3, frame_size, frame_size],
        };
        Self::from_source(source, logits)
    }

    pub fn from_source(source: VariantSource, logits: [f32; 2]) -> Self {
        Self {
            variant: source.place(DeviceKind::Cpu),
            logits,
            calls: AtomicUsize::new(0),
        }
    }
}

impl VideoClassifier for FixedVideoClassifier {
    fn variant(&self) -> &ModelVariant {
        &self.variant
    }

    fn score(&self, sequence: Array5<f32>) -> Result<[f32; 2]> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !shape_matches(&self.variant.input_shape, sequence.shape()) {
            return Err(DetectionError::Inference(format!(
                "shape {:?} vs {:?}",
                sequence.shape(),
                self.variant.input_shape
            )));
        }
        Ok(self.logits)
    }
}

/// Returns a fixed `(real, fake)` pair per chunk index (cycling)
pub struct FixedAudioClassifier {
    variant: ModelVariant,
    scores: Vec<(f64, f64)>,
}

impl FixedAudioClassifier {
    pub fn new(scores: Vec<(f64, f64)>) -> Self {
        let source = VariantSource {
            key: ModelKey::Audio,
            id: AUDIO_MODEL_ID.to_string(),
            weights: "audio.onnx".into(),
            accuracy: 99.7,
            input_shape: vec![1, -1],
        };
        Self::from_source(source, scores)
    }

    pub fn from_source(source: VariantSource, scores: Vec<(f64, f64)>) -> Self {
        Self {
            variant: source.place(DeviceKind::Cpu),
            scores,
        }
    }
}

impl AudioClassifier for FixedAudioClassifier {
    fn variant(&self) -> &ModelVariant {
        &self.variant
    }

    fn score_chunk(&self, chunk: &AudioChunk) -> Result<Probabilities> {
        let (real, fake) = self.scores[chunk.index % self.scores.len()];
        Ok(Probabilities { real, fake })
    }
}

/// Loader that counts loads and can fail on demand
pub struct CountingLoader {
    pub video_loads: AtomicUsize,
    pub audio_loads: AtomicUsize,
    fail_remaining: AtomicUsize,
    delay: Duration,
    video_logits: [f32; 2],
    audio_scores: Vec<(f64, f64)>,
}

impl CountingLoader {
    pub fn new() -> Self {
        Self {
            video_loads: AtomicUsize::new(0),
            audio_loads: AtomicUsize::new(0),
            fail_remaining: AtomicUsize::new(0),
            delay: Duration::ZERO,
            video_logits: [0.0, 1.0],
            audio_scores: vec![(0.9, 0.1)],
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the next `n` loads
    pub fn failing(self, n: usize) -> Self {
        self.fail_remaining.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_video_logits(mut self, logits: [f32; 2]) -> Self {
        self.video_logits = logits;
        self
    }

    pub fn with_audio_scores(mut self, scores: Vec<(f64, f64)>) -> Self {
        self.audio_scores = scores;
        self
    }

    fn attempt(&self, counter: &AtomicUsize) -> Result<()> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        counter.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            Err(DetectionError::ModelLoad("simulated load failure".into()))
        } else {
            Ok(())
        }
    }
}

impl ModelLoader for CountingLoader {
    fn load_video(&self, source: VariantSource) -> Result<Arc<dyn VideoClassifier>> {
        self.attempt(&self.video_loads)?;
        Ok(Arc::new(FixedVideoClassifier::from_source(source, self.video_logits)))
    }

    fn load_audio(&self, source: VariantSource) -> Result<Arc<dyn AudioClassifier>> {
        self.attempt(&self.audio_loads)?;
        Ok(Arc::new(FixedAudioClassifier::from_source(source, self.audio_scores.clone())))
    }

    fn placement(&self) -> DeviceKind {
        DeviceKind::Cpu
    }
}

/// Frame `i` is filled with `Rgb([i, 100, 200])`
pub fn solid_frames(count: usize, width: u32, height: u32) -> Vec<RgbImage> {
    (0..count)
        .map(|i| RgbImage::from_pixel(width, height, Rgb([i as u8, 100, 200])))
        .collect()
}

/// Decoder serving pre-built frames
pub struct FakeDecoder {
    frames: Vec<RgbImage>,
    reported: Option<usize>,
    fail: bool,
    pub probes: AtomicUsize,
}

impl FakeDecoder {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self {
            frames,
            reported: None,
            fail: false,
            probes: AtomicUsize::new(0),
        }
    }

    /// Probe reports `count` frames regardless of what decodes
    pub fn reporting(mut self, count: usize) -> Self {
        self.reported = Some(count);
        self
    }

    /// Probe fails as for a corrupt container
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl VideoDecoder for FakeDecoder {
    fn probe(&self, _path: &Path) -> Result<VideoInfo> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DetectionError::Decode("moov atom not found".into()));
        }
        let (width, height) = self.frames.first().map(|f| f.dimensions()).unwrap_or((1, 1));
        Ok(VideoInfo {
            frame_count: self.reported.unwrap_or(self.frames.len()),
            width,
            height,
        })
    }

    fn decode_frames(&self, _path: &Path, _info: &VideoInfo, indices: &[usize]) -> Result<DecodedFrames> {
        let frames: Vec<(usize, RgbImage)> = indices
            .iter()
            .filter(|&&i| i < self.frames.len())
            .map(|&i| (i, self.frames[i].clone()))
            .collect();
        let frames_seen = indices
            .last()
            .map(|&last| (last + 1).min(self.frames.len()))
            .unwrap_or(0);
        Ok(DecodedFrames { frames, frames_seen })
    }
}

/// Face locator with a fixed answer
pub struct FixedFaceLocator {
    face: FaceBox,
    even_only: bool,
}

impl FixedFaceLocator {
    pub fn always(face: FaceBox) -> Self {
        Self {
            face,
            even_only: false,
        }
    }

    /// Finds a face only in frames built by [`solid_frames`] with an even index
    pub fn on_even_frames(face: FaceBox) -> Self {
        Self {
            face,
            even_only: true,
        }
    }
}

impl FaceLocator for FixedFaceLocator {
    fn locate(&self, frame: &RgbImage) -> Option<FaceBox> {
        if self.even_only && frame.get_pixel(0, 0)[0] % 2 == 1 {
            return None;
        }
        Some(self.face)
    }
}

/// Sample with a 3x4x4 tensor filled with `value`
pub fn frame_sample(index: usize, value: f32) -> FrameSample {
    FrameSample {
        index,
        image: RgbImage::new(4, 4),
        face: None,
        tensor: Array3::from_elem((3, 4, 4), value),
    }
}

/// `count` contiguous one-second chunks of silence at 16 kHz
pub fn silent_chunks(count: usize) -> Vec<AudioChunk> {
    (0..count)
        .map(|index| AudioChunk {
            index,
            start: index * 16_000,
            end: (index + 1) * 16_000,
            sample_rate: 16_000,
            samples: vec![0.0; 16_000],
            spectrogram: None,
        })
        .collect()
}

/// 16-bit PCM WAV file from interleaved samples
pub fn wav_bytes(sample_rate: u32, channels: u16, samples: &[f32]) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let block_align = channels * 2;
    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Mono 440 Hz tone
pub fn tone_wav(sample_rate: u32, secs: f32) -> Vec<u8> {
    let n = (sample_rate as f32 * secs) as usize;
    let samples: Vec<f32> = (0..n)
        .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate as f32).sin() * 0.5)
        .collect();
    wav_bytes(sample_rate, 1, &samples)
}

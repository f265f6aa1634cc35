//! Face localisation and cropping
//!
//! Localisation is best-effort: a locator returns `None` when it finds no
//! face (or fails internally) and the caller keeps the full frame.

use std::path::Path;
use std::sync::{Arc, Mutex};

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;

use crate::config::ServiceConfig;
use crate::error::{DetectionError, Result};
use crate::model::session::{lock_session, open_session};
use crate::registry::DeviceKind;

/// Face bounding box in frame pixel coordinates (right/bottom exclusive)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub score: f32,
}

impl FaceBox {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

pub trait FaceLocator: Send + Sync {
    /// Most confident face in `frame`, if any
    fn locate(&self, frame: &RgbImage) -> Option<FaceBox>;
}

/// Locator used when no detector model is installed
pub struct NoFaceLocator;

impl FaceLocator for NoFaceLocator {
    fn locate(&self, _frame: &RgbImage) -> Option<FaceBox> {
        None
    }
}

/// Crop `face` out of `frame`, grown by `margin` pixels on each side and
/// clamped to the frame
pub fn crop_with_margin(frame: &RgbImage, face: &FaceBox, margin: u32) -> RgbImage {
    let left = face.left.saturating_sub(margin);
    let top = face.top.saturating_sub(margin);
    let right = face.right.saturating_add(margin).min(frame.width());
    let bottom = face.bottom.saturating_add(margin).min(frame.height());

    if right <= left || bottom <= top {
        return frame.clone();
    }
    imageops::crop_imm(frame, left, top, right - left, bottom - top).to_image()
}

// UltraFace RFB-320 input geometry
const DETECTOR_WIDTH: u32 = 320;
const DETECTOR_HEIGHT: u32 = 240;
const DETECTOR_INPUT: &str = "input";

/// UltraFace-style ONNX face detector
///
/// Input `[1, 3, 240, 320]` normalised as `(px - 127) / 128`; outputs
/// `scores [1, N, 2]` (background, face) and `boxes [1, N, 4]` as normalised
/// corner coordinates.
pub struct OrtFaceLocator {
    session: Mutex<Session>,
    min_confidence: f32,
}

impl OrtFaceLocator {
    pub fn load(path: &Path, min_confidence: f32) -> Result<Self> {
        let session = open_session(path, DeviceKind::Cpu, 1)?;
        Ok(Self {
            session: Mutex::new(session),
            min_confidence,
        })
    }

    fn detect(&self, frame: &RgbImage) -> Result<Option<FaceBox>> {
        let resized = imageops::resize(frame, DETECTOR_WIDTH, DETECTOR_HEIGHT, FilterType::Triangle);
        let (w, h) = (DETECTOR_WIDTH as usize, DETECTOR_HEIGHT as usize);
        let mut input = Array4::<f32>::zeros((1, 3, h, w));
        for (x, y, px) in resized.enumerate_pixels() {
            for c in 0..3 {
                input[[0, c, y as usize, x as usize]] = (px[c] as f32 - 127.0) / 128.0;
            }
        }

        let tensor = Tensor::from_array(input)
            .map_err(|e| DetectionError::Inference(format!("Tensor creation error: {}", e)))?;
        let mut session = lock_session(&self.session, "face detector")?;
        let outputs = session
            .run(ort::inputs![DETECTOR_INPUT => tensor])
            .map_err(|e| DetectionError::Inference(format!("Face detector error: {}", e)))?;

        let scores = outputs
            .get("scores")
            .ok_or_else(|| DetectionError::Inference("Face detector has no 'scores' output".into()))?;
        let boxes = outputs
            .get("boxes")
            .ok_or_else(|| DetectionError::Inference("Face detector has no 'boxes' output".into()))?;
        let (_, scores) = scores
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectionError::Inference(e.to_string()))?;
        let (_, boxes) = boxes
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectionError::Inference(e.to_string()))?;

        Ok(best_detection(
            scores,
            boxes,
            self.min_confidence,
            frame.width(),
            frame.height(),
        ))
    }
}

impl FaceLocator for OrtFaceLocator {
    fn locate(&self, frame: &RgbImage) -> Option<FaceBox> {
        match self.detect(frame) {
            Ok(face) => face,
            Err(e) => {
                log::debug!("Face localisation failed, keeping full frame: {}", e);
                None
            }
        }
    }
}

/// Pick the highest-scoring candidate above `min_confidence` and map it to
/// pixel coordinates
fn best_detection(
    scores: &[f32],
    boxes: &[f32],
    min_confidence: f32,
    width: u32,
    height: u32,
) -> Option<FaceBox> {
    let candidates = (scores.len() / 2).min(boxes.len() / 4);
    let (best, score) = (0..candidates)
        .map(|i| (i, scores[i * 2 + 1]))
        .filter(|&(_, s)| s.is_finite() && s >= min_confidence)
        .max_by(|a, b| a.1.total_cmp(&b.1))?;

    let corner = |v: f32, extent: u32| -> u32 {
        (v.clamp(0.0, 1.0) * extent as f32).round() as u32
    };
    let b = &boxes[best * 4..best * 4 + 4];
    let face = FaceBox {
        left: corner(b[0], width),
        top: corner(b[1], height),
        right: corner(b[2], width),
        bottom: corner(b[3], height),
        score,
    };
    (face.width() > 0 && face.height() > 0).then_some(face)
}

/// Build the configured locator, falling back to [`NoFaceLocator`] when the
/// detector model is missing or fails to load
pub fn build_face_locator(config: &ServiceConfig) -> Arc<dyn FaceLocator> {
    let Some(path) = config.models.face_detector_path() else {
        log::info!("No face detector configured, face focus will use full frames");
        return Arc::new(NoFaceLocator);
    };
    if !path.exists() {
        log::warn!(
            "Face detector {:?} not found, face focus will use full frames",
            path
        );
        return Arc::new(NoFaceLocator);
    }
    match OrtFaceLocator::load(&path, config.video.face_min_confidence) {
        Ok(locator) => {
            log::info!("Face detector loaded from {:?}", path);
            Arc::new(locator)
        }
        Err(e) => {
            log::warn!("Face detector unavailable ({}), face focus will use full frames", e);
            Arc::new(NoFaceLocator)
        }
    }
}

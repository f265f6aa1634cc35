//! Video preprocessing: bytes in, ordered model-ready frames out

use std::io::{Cursor, Write};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, RgbImage};
use ndarray::Array3;
use tempfile::NamedTempFile;

use super::decode::{DecodedFrames, VideoDecoder};
use super::face::{crop_with_margin, FaceBox, FaceLocator};
use super::sampling::sample_indices;
use crate::config::VideoConfig;
use crate::error::{DetectionError, Result};
use crate::types::SequenceLength;

/// One sampled frame, ready for the feature extractor
#[derive(Debug, Clone)]
pub struct FrameSample {
    /// Position of the frame in the decoded stream
    pub index: usize,
    /// Region fed to the model: the face crop, or the full frame on fallback
    pub image: RgbImage,
    /// Face found in the original frame, if any
    pub face: Option<FaceBox>,
    /// Normalised `[3, H, W]` tensor
    pub tensor: Array3<f32>,
}

/// PNG diagnostic image of one sampled frame
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub index: usize,
    pub png: Vec<u8>,
}

impl Thumbnail {
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.png)
    }

    /// `data:` URL usable directly as an image source
    pub fn data_url(&self) -> String {
        format!("data:image/png;base64,{}", self.to_base64())
    }
}

/// Output of [`VideoPreprocessor::prepare`]
#[derive(Debug, Clone)]
pub struct PreparedVideo {
    /// Samples in temporal order
    pub samples: Vec<FrameSample>,
    /// One thumbnail per sample, same order
    pub thumbnails: Vec<Thumbnail>,
    /// Decodable frames in the source
    pub total_frames: usize,
}

impl PreparedVideo {
    pub fn faces_found(&self) -> usize {
        self.samples.iter().filter(|s| s.face.is_some()).count()
    }
}

pub struct VideoPreprocessor {
    decoder: Arc<dyn VideoDecoder>,
    faces: Arc<dyn FaceLocator>,
    settings: VideoConfig,
}

impl VideoPreprocessor {
    pub fn new(decoder: Arc<dyn VideoDecoder>, faces: Arc<dyn FaceLocator>, settings: VideoConfig) -> Self {
        Self {
            decoder,
            faces,
            settings,
        }
    }

    /// Decode, sample, crop and normalise a video held in memory
    ///
    /// The bytes are spilled to a temporary file for the decoder; the file is
    /// removed when this returns.
    pub fn prepare(&self, bytes: &[u8], length: SequenceLength, face_focus: bool) -> Result<PreparedVideo> {
        if bytes.is_empty() {
            return Err(DetectionError::Decode("Empty video upload".into()));
        }

        let mut spill = NamedTempFile::new()
            .map_err(|e| DetectionError::Decode(format!("Failed to buffer upload: {}", e)))?;
        spill
            .write_all(bytes)
            .and_then(|_| spill.flush())
            .map_err(|e| DetectionError::Decode(format!("Failed to buffer upload: {}", e)))?;
        let path = spill.path();

        let info = self.decoder.probe(path)?;
        if info.frame_count == 0 {
            return Err(DetectionError::NoFramesExtracted("video frames"));
        }

        let indices = sample_indices(info.frame_count, length.frames());
        let mut decoded = self.decoder.decode_frames(path, &info, &indices)?;
        let mut total_frames = info.frame_count;

        if decoded.frames.len() < indices.len() {
            // Container over-reported its frame count; resample over what decodes
            let available = decoded.frames_seen;
            log::debug!(
                "Video stream ended after {} of {} probed frames, resampling",
                available,
                info.frame_count
            );
            if available == 0 {
                return Err(DetectionError::NoFramesExtracted("video frames"));
            }
            let retry = sample_indices(available, length.frames());
            decoded = self.decoder.decode_frames(path, &info, &retry)?;
            total_frames = available;
        }

        let DecodedFrames { frames, .. } = decoded;
        if frames.is_empty() {
            return Err(DetectionError::NoFramesExtracted("video frames"));
        }

        let mut samples = Vec::with_capacity(frames.len());
        let mut thumbnails = Vec::with_capacity(frames.len());
        for (index, frame) in frames {
            let sample = self.process_frame(index, frame, face_focus);
            thumbnails.push(self.thumbnail(&sample)?);
            samples.push(sample);
        }

        log::info!(
            "Prepared {} of {} requested frames ({} with faces, face_focus={})",
            samples.len(),
            length.frames(),
            samples.iter().filter(|s| s.face.is_some()).count(),
            face_focus
        );

        Ok(PreparedVideo {
            samples,
            thumbnails,
            total_frames,
        })
    }

    fn process_frame(&self, index: usize, frame: RgbImage, face_focus: bool) -> FrameSample {
        let face = if face_focus { self.faces.locate(&frame) } else { None };
        let image = match &face {
            Some(face) => crop_with_margin(&frame, face, self.settings.face_margin_px),
            None => {
                if face_focus {
                    log::debug!("No face in frame {}, using full frame", index);
                }
                frame
            }
        };
        let tensor = to_tensor(&image, &self.settings);
        FrameSample {
            index,
            image,
            face,
            tensor,
        }
    }

    fn thumbnail(&self, sample: &FrameSample) -> Result<Thumbnail> {
        let max_edge = self.settings.thumbnail_size;
        let (w, h) = sample.image.dimensions();
        let scaled;
        let image = if w > max_edge || h > max_edge {
            let scale = max_edge as f32 / w.max(h) as f32;
            let tw = ((w as f32 * scale).round() as u32).max(1);
            let th = ((h as f32 * scale).round() as u32).max(1);
            scaled = imageops::resize(&sample.image, tw, th, FilterType::Triangle);
            &scaled
        } else {
            &sample.image
        };

        Ok(Thumbnail {
            index: sample.index,
            png: encode_png(image)?,
        })
    }
}

/// Resize to the model input and normalise into a `[3, H, W]` tensor
pub fn to_tensor(image: &RgbImage, settings: &VideoConfig) -> Array3<f32> {
    let size = settings.input_size;
    let resized = imageops::resize(image, size, size, FilterType::Triangle);
    let mut tensor = Array3::<f32>::zeros((3, size as usize, size as usize));
    for (x, y, px) in resized.enumerate_pixels() {
        for c in 0..3 {
            let value = px[c] as f32 / 255.0;
            tensor[[c, y as usize, x as usize]] = (value - settings.mean[c]) / settings.std[c];
        }
    }
    tensor
}

fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut png = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| DetectionError::Inference(format!("Thumbnail encoding failed: {}", e)))?;
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{solid_frames, FakeDecoder, FixedFaceLocator};
    use crate::video::face::NoFaceLocator;

    fn preprocessor(decoder: FakeDecoder, faces: Arc<dyn FaceLocator>) -> VideoPreprocessor {
        VideoPreprocessor::new(Arc::new(decoder), faces, VideoConfig::default())
    }

    #[test]
    fn test_exact_length_when_enough_frames() {
        let pre = preprocessor(FakeDecoder::new(solid_frames(50, 64, 48)), Arc::new(NoFaceLocator));
        let prepared = pre.prepare(b"video", SequenceLength::L20, false).unwrap();

        assert_eq!(prepared.samples.len(), 20);
        assert_eq!(prepared.thumbnails.len(), 20);
        assert_eq!(prepared.total_frames, 50);
        let indices: Vec<usize> = prepared.samples.iter().map(|s| s.index).collect();
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(prepared.samples[0].tensor.dim(), (3, 112, 112));
    }

    #[test]
    fn test_short_clip_returns_every_frame() {
        let pre = preprocessor(FakeDecoder::new(solid_frames(7, 32, 32)), Arc::new(NoFaceLocator));
        let prepared = pre.prepare(b"video", SequenceLength::L40, true).unwrap();
        assert_eq!(prepared.samples.len(), 7);
    }

    #[test]
    fn test_over_reported_frame_count_resamples() {
        let decoder = FakeDecoder::new(solid_frames(12, 16, 16)).reporting(100);
        let pre = preprocessor(decoder, Arc::new(NoFaceLocator));
        let prepared = pre.prepare(b"video", SequenceLength::L10, false).unwrap();
        assert_eq!(prepared.samples.len(), 10);
        assert_eq!(prepared.total_frames, 12);
    }

    #[test]
    fn test_zero_frames_is_no_frames_error() {
        let pre = preprocessor(FakeDecoder::new(Vec::new()), Arc::new(NoFaceLocator));
        let result = pre.prepare(b"video", SequenceLength::L10, false);
        assert!(matches!(result, Err(DetectionError::NoFramesExtracted(_))));

        let result = pre.prepare(b"", SequenceLength::L10, false);
        assert!(matches!(result, Err(DetectionError::Decode(_))));
    }

    #[test]
    fn test_face_fallback_keeps_full_frame() {
        // Faces only on even frame indices
        let faces = FixedFaceLocator::on_even_frames(FaceBox {
            left: 20,
            top: 20,
            right: 40,
            bottom: 40,
            score: 0.9,
        });
        let pre = preprocessor(FakeDecoder::new(solid_frames(10, 100, 80)), Arc::new(faces));
        let prepared = pre.prepare(b"video", SequenceLength::L10, true).unwrap();

        assert_eq!(prepared.samples.len(), 10);
        assert_eq!(prepared.faces_found(), 5);
        for (sample, thumb) in prepared.samples.iter().zip(&prepared.thumbnails) {
            if sample.face.is_some() {
                assert_eq!(sample.image.dimensions(), (80, 80));
            } else {
                assert_eq!(sample.image.dimensions(), (100, 80));
            }
            let full = encode_png(&sample.image).unwrap();
            assert_eq!(thumb.png, full);
        }

        let without_face = &prepared.samples[1];
        assert!(without_face.face.is_none());
        let original = solid_frames(10, 100, 80).remove(1);
        assert_eq!(without_face.image, original);
    }

    #[test]
    fn test_face_crop_applies_margin() {
        let faces = FixedFaceLocator::always(FaceBox {
            left: 100,
            top: 100,
            right: 150,
            bottom: 160,
            score: 0.9,
        });
        let pre = preprocessor(FakeDecoder::new(solid_frames(3, 400, 300)), Arc::new(faces));
        let prepared = pre.prepare(b"video", SequenceLength::L10, true).unwrap();
        assert_eq!(prepared.samples[0].image.dimensions(), (130, 140));

        let prepared = pre.prepare(b"video", SequenceLength::L10, false).unwrap();
        assert_eq!(prepared.faces_found(), 0);
        assert_eq!(prepared.samples[0].image.dimensions(), (400, 300));
    }

    #[test]
    fn test_thumbnail_downscales_large_frames() {
        let pre = preprocessor(FakeDecoder::new(solid_frames(1, 640, 320)), Arc::new(NoFaceLocator));
        let prepared = pre.prepare(b"video", SequenceLength::L10, false).unwrap();
        let png = image::load_from_memory(&prepared.thumbnails[0].png).unwrap();
        assert_eq!((png.width(), png.height()), (224, 112));
        assert!(prepared.thumbnails[0].data_url().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_to_tensor_normalisation() {
        let image = RgbImage::from_pixel(8, 8, image::Rgb([255, 0, 128]));
        let tensor = to_tensor(&image, &VideoConfig::default());
        assert_eq!(tensor.dim(), (3, 112, 112));
        let expected_r = (1.0 - 0.485) / 0.229;
        let expected_g = (0.0 - 0.456) / 0.224;
        assert!((tensor[[0, 50, 50]] - expected_r).abs() < 1e-4);
        assert!((tensor[[1, 0, 0]] - expected_g).abs() < 1e-4);
    }
}

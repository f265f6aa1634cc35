//! Video pipeline
//!
//! ```text
//! bytes ─► decode (ffprobe/ffmpeg) ─► sample L indices ─► face crop ─► resize
//!       ─► normalise ─► [1, L, 3, 112, 112] ─► temporal classifier ─► Verdict
//! ```

pub mod decode;
pub mod engine;
pub mod face;
pub mod preprocess;
pub mod sampling;

pub use decode::{FfmpegDecoder, VideoDecoder, VideoInfo};
pub use face::{build_face_locator, FaceBox, FaceLocator, NoFaceLocator};
pub use preprocess::{FrameSample, PreparedVideo, Thumbnail, VideoPreprocessor};

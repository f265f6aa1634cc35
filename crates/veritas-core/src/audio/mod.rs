//! Audio pipeline
//!
//! ```text
//! bytes ─► decode (symphonia) ─► mono ─► resample 16 kHz ─► [denoise]
//!       ─► chunks ─► [log-mel] ─► per-chunk classifier ─► mean ─► Verdict
//! ```

pub mod chunking;
pub mod decode;
pub mod denoise;
pub mod engine;
pub mod preprocess;
pub mod resample;
pub mod spectrogram;
mod stft;

pub use chunking::{AudioChunk, ChunkSize};
pub use decode::{decode_audio, DecodedAudio};
pub use preprocess::{AudioPreprocessor, PreparedAudio};

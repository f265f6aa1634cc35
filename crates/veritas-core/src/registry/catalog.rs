//! Video model catalog
//!
//! Video weights are discovered by filename in the models directory:
//!
//! ```text
//! model_{accuracy}_acc_{frames}_frames_{suffix}.onnx
//! ```
//!
//! e.g. `model_87.79_acc_20_frames_FF_data.onnx`. Files that don't follow the
//! pattern are ignored.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::types::SequenceLength;

/// Extension of video model weights
pub const WEIGHTS_EXTENSION: &str = "onnx";

/// One discovered video weights file
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub filename: String,
    pub path: PathBuf,
    pub frames: u32,
    /// Reported accuracy in percent, as encoded in the filename
    pub accuracy: f32,
}

/// Public listing shape for one catalog entry
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CatalogListing {
    pub filename: String,
    pub frames: u32,
    pub accuracy: String,
}

impl CatalogEntry {
    pub fn listing(&self) -> CatalogListing {
        CatalogListing {
            filename: self.filename.clone(),
            frames: self.frames,
            accuracy: format!("{}%", format_accuracy(self.accuracy)),
        }
    }
}

fn format_accuracy(accuracy: f32) -> String {
    let formatted = format!("{:.2}", accuracy);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Parse `(accuracy, frames)` out of a weights filename
pub fn parse_model_filename(filename: &str) -> Option<(f32, u32)> {
    let stem = filename.strip_suffix(&format!(".{}", WEIGHTS_EXTENSION))?;
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 5 || parts[0] != "model" || parts[2] != "acc" || parts[4] != "frames" {
        return None;
    }
    let accuracy: f32 = parts[1].parse().ok()?;
    let frames: u32 = parts[3].parse().ok()?;
    if !accuracy.is_finite() {
        return None;
    }
    Some((accuracy, frames))
}

/// Scan `dir` for video weights, sorted by frame count then filename
///
/// A missing or unreadable directory yields an empty catalog.
pub fn scan_catalog(dir: &Path) -> Vec<CatalogEntry> {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            log::warn!("Model catalog: cannot read {:?}: {}", dir, e);
            return Vec::new();
        }
    };

    let mut entries: Vec<CatalogEntry> = read_dir
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| {
            let filename = entry.file_name().to_string_lossy().into_owned();
            let (accuracy, frames) = parse_model_filename(&filename)?;
            Some(CatalogEntry {
                path: entry.path(),
                filename,
                frames,
                accuracy,
            })
        })
        .collect();

    entries.sort_by(|a, b| a.frames.cmp(&b.frames).then_with(|| a.filename.cmp(&b.filename)));
    entries
}

/// Highest-accuracy entry for a sequence length
pub fn best_for(entries: &[CatalogEntry], length: SequenceLength) -> Option<&CatalogEntry> {
    entries
        .iter()
        .filter(|e| e.frames as usize == length.frames())
        .max_by(|a, b| a.accuracy.total_cmp(&b.accuracy))
}

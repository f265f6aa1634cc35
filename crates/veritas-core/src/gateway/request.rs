//! Prediction requests and their validation

use std::path::Path;

use crate::audio::ChunkSize;
use crate::config::UploadLimits;
use crate::error::{DetectionError, Result};
use crate::types::{MediaKind, SequenceLength};

/// Extensions accepted for audio uploads
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "m4a", "ogg", "wma", "aac"];

/// Video extensions used only to guess the kind when nothing else says
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v"];

/// Audio MIME types accepted besides the generic `audio/*` family
const AUDIO_MIME_TYPES: &[&str] = &[
    "audio/wav",
    "audio/x-wav",
    "audio/wave",
    "audio/mpeg",
    "audio/mp3",
    "audio/flac",
    "audio/x-flac",
    "audio/mp4",
    "audio/x-m4a",
    "audio/m4a",
    "audio/ogg",
    "audio/vorbis",
    "audio/x-ms-wma",
    "audio/aac",
];

/// Per-kind request options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaOptions {
    Video {
        sequence_length: SequenceLength,
        face_focus: bool,
    },
    Audio {
        chunk_size: ChunkSize,
        noise_reduction: bool,
    },
}

impl MediaOptions {
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Video { .. } => MediaKind::Video,
            Self::Audio { .. } => MediaKind::Audio,
        }
    }

    /// Build options for `kind` from raw form fields
    ///
    /// Video requires `sequence_length`; `face_focus` defaults to on.
    /// Audio defaults to automatic chunking without noise reduction.
    pub fn from_fields(kind: MediaKind, fields: &RequestFields) -> Result<Self> {
        match kind {
            MediaKind::Video => {
                let raw = fields.sequence_length.as_deref().ok_or_else(|| {
                    DetectionError::UnsupportedConfiguration(
                        "sequence_length is required for video".to_string(),
                    )
                })?;
                let frames: u32 = raw.trim().parse().map_err(|_| {
                    DetectionError::UnsupportedConfiguration(format!(
                        "Invalid sequence_length '{}'. Must be one of [10, 20, 40, 60, 80, 100]",
                        raw.trim()
                    ))
                })?;
                Ok(Self::Video {
                    sequence_length: SequenceLength::from_frames(frames)?,
                    face_focus: parse_flag("face_focus", fields.face_focus.as_deref(), true)?,
                })
            }
            MediaKind::Audio => {
                let chunk_size = match fields.chunk_size.as_deref() {
                    Some(raw) if !raw.trim().is_empty() => raw.parse()?,
                    _ => ChunkSize::Auto,
                };
                Ok(Self::Audio {
                    chunk_size,
                    noise_reduction: parse_flag(
                        "noise_reduction",
                        fields.noise_reduction.as_deref(),
                        false,
                    )?,
                })
            }
        }
    }
}

/// Raw text fields of a prediction form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestFields {
    pub media_kind: Option<String>,
    pub sequence_length: Option<String>,
    pub face_focus: Option<String>,
    pub chunk_size: Option<String>,
    pub noise_reduction: Option<String>,
}

impl RequestFields {
    /// Record a named form field; unknown names are ignored
    pub fn set(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "media_kind" => &mut self.media_kind,
            "sequence_length" => &mut self.sequence_length,
            "face_focus" => &mut self.face_focus,
            "chunk_size" => &mut self.chunk_size,
            "noise_reduction" => &mut self.noise_reduction,
            _ => return false,
        };
        *slot = Some(value);
        true
    }
}

/// Parse a form boolean; an absent or empty field takes `default`
pub fn parse_flag(name: &str, raw: Option<&str>, default: bool) -> Result<bool> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(DetectionError::UnsupportedConfiguration(format!(
            "Invalid {} '{}', expected true or false",
            name, other
        ))),
    }
}

fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn base_mime(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Decide the media kind of an upload
///
/// An explicit `media_kind` field wins, then the declared content type, then
/// the filename extension.
pub fn resolve_kind(
    explicit: Option<&str>,
    content_type: Option<&str>,
    filename: Option<&str>,
) -> Result<MediaKind> {
    if let Some(raw) = explicit.filter(|r| !r.trim().is_empty()) {
        return MediaKind::parse(raw);
    }
    if let Some(kind) = content_type.and_then(MediaKind::from_content_type) {
        return Ok(kind);
    }
    match filename.and_then(extension) {
        Some(ext) if AUDIO_EXTENSIONS.contains(&ext.as_str()) => Ok(MediaKind::Audio),
        Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => Ok(MediaKind::Video),
        _ => Err(DetectionError::UnsupportedConfiguration(
            "Cannot determine media kind, send a video/* or audio/* file".to_string(),
        )),
    }
}

/// One prediction request, fully buffered
#[derive(Debug, Clone)]
pub struct MediaRequest {
    pub bytes: Vec<u8>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub options: MediaOptions,
}

impl MediaRequest {
    pub fn new(bytes: Vec<u8>, options: MediaOptions) -> Self {
        Self {
            bytes,
            filename: None,
            content_type: None,
            options,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn kind(&self) -> MediaKind {
        self.options.kind()
    }

    /// Lowercased filename extension, if any
    pub fn extension(&self) -> Option<String> {
        self.filename.as_deref().and_then(extension)
    }

    /// Check everything that can be checked without decoding
    pub fn validate(&self, limits: &UploadLimits) -> Result<()> {
        let limit = match self.kind() {
            MediaKind::Video => limits.max_video_upload_bytes,
            MediaKind::Audio => limits.max_audio_upload_bytes,
        };
        if self.bytes.len() > limit {
            return Err(DetectionError::PayloadTooLarge {
                size: self.bytes.len(),
                limit,
            });
        }
        if self.bytes.is_empty() {
            return Err(DetectionError::Decode("Empty upload".to_string()));
        }

        let mime = self.content_type.as_deref().map(base_mime);
        match self.options {
            MediaOptions::Video { .. } => {
                if !mime.is_some_and(|m| m.starts_with("video/")) {
                    return Err(DetectionError::UnsupportedConfiguration(
                        "File must be a video".to_string(),
                    ));
                }
            }
            MediaOptions::Audio { .. } => {
                if let Some(mime) = mime {
                    if !mime.starts_with("audio/") && !AUDIO_MIME_TYPES.contains(&mime.as_str()) {
                        return Err(DetectionError::UnsupportedConfiguration(format!(
                            "Unsupported audio content type '{}'",
                            mime
                        )));
                    }
                }
                if let Some(ext) = self.extension() {
                    if !AUDIO_EXTENSIONS.contains(&ext.as_str()) {
                        return Err(DetectionError::UnsupportedConfiguration(format!(
                            "Unsupported audio format '.{}'. Supported: {}",
                            ext,
                            AUDIO_EXTENSIONS
                                .iter()
                                .map(|e| format!(".{}", e))
                                .collect::<Vec<_>>()
                                .join(", ")
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

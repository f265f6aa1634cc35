//! Video decoding via ffprobe / ffmpeg subprocesses
//!
//! `ffprobe` counts packets of the first video stream to get the frame count
//! and dimensions. `ffmpeg` then streams raw `rgb24` frames over a pipe;
//! only the requested indices are kept and the child is stopped as soon as
//! the last one has been read.

use std::ffi::OsString;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use image::RgbImage;

use crate::error::{DetectionError, Result};

/// Stream properties reported by the probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoInfo {
    pub frame_count: usize,
    pub width: u32,
    pub height: u32,
}

/// Frames returned by a decode pass
#[derive(Debug, Default)]
pub struct DecodedFrames {
    /// `(index, frame)` pairs in ascending index order
    pub frames: Vec<(usize, RgbImage)>,
    /// Frames actually read from the stream before it ended or was stopped
    pub frames_seen: usize,
}

pub trait VideoDecoder: Send + Sync {
    fn probe(&self, path: &Path) -> Result<VideoInfo>;

    /// Decode the frames at `indices` (ascending)
    ///
    /// May return fewer frames than requested when the stream ends early;
    /// `frames_seen` then reports how many frames were actually decodable.
    fn decode_frames(&self, path: &Path, info: &VideoInfo, indices: &[usize]) -> Result<DecodedFrames>;
}

pub struct FfmpegDecoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegDecoder {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }
}

impl VideoDecoder for FfmpegDecoder {
    fn probe(&self, path: &Path) -> Result<VideoInfo> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-select_streams", "v:0", "-count_packets"])
            .args(["-show_entries", "stream=width,height,nb_read_packets"])
            .args(["-of", "csv=p=0"])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| DetectionError::Decode(format!("Failed to run ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DetectionError::Decode(format!(
                "Unreadable video: {}",
                stderr.trim().chars().take(200).collect::<String>()
            )));
        }

        parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }

    fn decode_frames(&self, path: &Path, info: &VideoInfo, indices: &[usize]) -> Result<DecodedFrames> {
        let Some(&last_wanted) = indices.last() else {
            return Ok(DecodedFrames::default());
        };

        let mut child = Command::new(&self.ffmpeg)
            .args(rawvideo_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| DetectionError::Decode(format!("Failed to run ffmpeg: {}", e)))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| DetectionError::Decode("Failed to acquire ffmpeg stdout".into()))?;

        let frame_bytes = info.width as usize * info.height as usize * 3;
        let mut buf = vec![0u8; frame_bytes];
        let mut decoded = DecodedFrames::default();
        let mut wanted = indices.iter().copied().peekable();
        let mut read_error = None;

        loop {
            match stdout.read_exact(&mut buf) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => {
                    read_error = Some(e);
                    break;
                }
            }
            let index = decoded.frames_seen;
            decoded.frames_seen += 1;

            if wanted.peek() == Some(&index) {
                wanted.next();
                let frame = RgbImage::from_raw(info.width, info.height, buf.clone())
                    .ok_or_else(|| DetectionError::Decode("Frame buffer size mismatch".into()))?;
                decoded.frames.push((index, frame));
            }
            if index >= last_wanted {
                break;
            }
        }

        drop(stdout);
        // Stopping early closes the pipe; the exit status is irrelevant then
        let _ = child.kill();
        let _ = child.wait();

        if let Some(e) = read_error {
            return Err(DetectionError::Decode(format!("Failed reading decoded frames: {}", e)));
        }
        Ok(decoded)
    }
}

/// Parse `width,height,nb_read_packets` as printed by ffprobe
/// ffmpeg arguments streaming every packet of the first video stream as
/// `rgb24`; passthrough timing keeps output frame `i` aligned with packet `i`
fn rawvideo_args(path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-v", "error", "-nostdin", "-noautorotate", "-i"]
        .iter()
        .map(OsString::from)
        .collect();
    args.push(path.as_os_str().to_owned());
    args.extend(
        [
            "-map", "0:v:0", "-fps_mode", "passthrough", "-f", "rawvideo", "-pix_fmt", "rgb24", "-",
        ]
        .iter()
        .map(OsString::from),
    );
    args
}

fn parse_probe_output(stdout: &str) -> Result<VideoInfo> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| DetectionError::Decode("No video stream found".into()))?;

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let parse = |i: usize, name: &str| -> Result<u64> {
        fields
            .get(i)
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| DetectionError::Decode(format!("Probe reported no {} ({})", name, line)))
    };

    let width = parse(0, "width")? as u32;
    let height = parse(1, "height")? as u32;
    // Missing packet count means nothing decodable
    let frame_count = fields.get(2).and_then(|v| v.parse::<usize>().ok()).unwrap_or(0);

    if width == 0 || height == 0 {
        return Err(DetectionError::Decode(format!("Invalid frame size {}x{}", width, height)));
    }
    Ok(VideoInfo {
        frame_count,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output() {
        let info = parse_probe_output("1280,720,300\n").unwrap();
        assert_eq!(
            info,
            VideoInfo {
                frame_count: 300,
                width: 1280,
                height: 720
            }
        );

        let info = parse_probe_output("640,480,N/A\n").unwrap();
        assert_eq!(info.frame_count, 0);
    }

    #[test]
    fn test_parse_probe_rejects_garbage() {
        assert!(matches!(parse_probe_output(""), Err(DetectionError::Decode(_))));
        assert!(matches!(parse_probe_output("abc"), Err(DetectionError::Decode(_))));
        assert!(matches!(parse_probe_output("0,0,10"), Err(DetectionError::Decode(_))));
    }

    #[test]
    fn test_rawvideo_args_keep_packet_timing() {
        let args = rawvideo_args(Path::new("/tmp/clip.mp4"));
        let pos = args.iter().position(|a| a == "-fps_mode").unwrap();
        assert_eq!(args[pos + 1], "passthrough");
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input + 1], "/tmp/clip.mp4");
        assert!(pos > input);
        assert_eq!(args.last().unwrap(), "-");
    }

    #[test]
    fn test_missing_binary_is_decode_error() {
        let decoder = FfmpegDecoder::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        let result = decoder.probe(Path::new("/tmp/whatever.mp4"));
        assert!(matches!(result, Err(DetectionError::Decode(_))));
    }
}

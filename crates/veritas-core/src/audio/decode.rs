//! Audio decoding from memory via Symphonia

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{DetectionError, Result};

/// Decoded mono waveform
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f64 / self.sample_rate as f64
        }
    }
}

/// Decode an in-memory audio file and downmix it to mono
///
/// `extension` (without the dot) is only a probing hint; the container is
/// detected from its content.
pub fn decode_audio(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedAudio> {
    if bytes.is_empty() {
        return Err(DetectionError::Decode("Empty audio upload".into()));
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DetectionError::Decode(format!("Unrecognised audio format: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DetectionError::Decode("No audio track found".into()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| DetectionError::Decode("Unknown sample rate".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DetectionError::Decode(format!("Unsupported audio codec: {}", e)))?;

    let mut mono: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut channels = 1usize;
    let mut decode_errors = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                log::warn!("Error reading audio packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                decode_errors += 1;
                log::debug!("Skipping undecodable audio packet: {}", e);
                continue;
            }
            Err(e) => {
                log::warn!("Audio decoder failed: {}", e);
                break;
            }
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            channels = spec.channels.count().max(1);
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            mono.extend(downmix(buf.samples(), channels));
        }
    }

    if decode_errors > 0 {
        log::warn!("Skipped {} undecodable audio packets", decode_errors);
    }
    if mono.is_empty() && decode_errors > 0 {
        return Err(DetectionError::Decode("Audio stream could not be decoded".into()));
    }

    Ok(DecodedAudio {
        samples: mono,
        sample_rate,
    })
}

/// Average interleaved channels into one
fn downmix(interleaved: &[f32], channels: usize) -> impl Iterator<Item = f32> + '_ {
    interleaved
        .chunks(channels)
        .map(move |frame| frame.iter().sum::<f32>() / channels as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::wav_bytes;

    #[test]
    fn test_decode_wav_downmixes() {
        // Stereo: left 0.5, right -0.5 -> silence
        let bytes = wav_bytes(8_000, 2, &[0.5, -0.5, 0.5, -0.5, 0.25, 0.25]);
        let decoded = decode_audio(bytes, Some("wav")).unwrap();
        assert_eq!(decoded.sample_rate, 8_000);
        assert_eq!(decoded.samples.len(), 3);
        assert!(decoded.samples[0].abs() < 1e-3);
        assert!((decoded.samples[2] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let result = decode_audio(b"definitely not audio".to_vec(), Some("mp3"));
        assert!(matches!(result, Err(DetectionError::Decode(_))));

        let result = decode_audio(Vec::new(), None);
        assert!(matches!(result, Err(DetectionError::Decode(_))));
    }

    #[test]
    fn test_duration() {
        let audio = DecodedAudio {
            samples: vec![0.0; 16_000],
            sample_rate: 16_000,
        };
        assert!((audio.duration_secs() - 1.0).abs() < 1e-9);
    }
}

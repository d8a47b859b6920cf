//! 16-bit PCM packing for the speech wire format.
//!
//! Samples travel as little-endian signed 16-bit integers, base64 encoded.

use crate::error::VoiceError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Scale between normalized float samples and i16 PCM.
const I16_SCALE: f32 = 32768.0;

/// MIME tag for raw PCM at `sample_rate` Hz.
pub fn mime_type(sample_rate: u32) -> String {
    format!("audio/pcm;rate={}", sample_rate)
}

/// Extracts the `rate=` parameter from a PCM MIME tag.
pub fn sample_rate_from_mime(mime: &str) -> Option<u32> {
    mime.split(';')
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.trim().parse().ok())
}

/// Converts float samples to i16, clamping to the representable range.
pub fn to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * I16_SCALE).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

/// Packs one capture frame into the base64 wire encoding.
pub fn encode_frame(samples: &[f32]) -> String {
    let bytes: Vec<u8> = to_i16(samples)
        .into_iter()
        .flat_map(i16::to_le_bytes)
        .collect();
    STANDARD.encode(bytes)
}

/// Unpacks a base64 PCM payload into normalized float samples.
///
/// # Errors
///
/// Returns [`VoiceError::Codec`] for invalid base64 or an odd byte count.
pub fn decode_segment(data: &str) -> Result<Vec<f32>, VoiceError> {
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| VoiceError::Codec(format!("invalid base64 audio: {}", e)))?;
    if bytes.len() % 2 != 0 {
        return Err(VoiceError::Codec(format!(
            "PCM payload has odd length {}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / I16_SCALE)
        .collect())
}

/// Playback length in seconds of `samples` mono samples.
pub fn duration_secs(samples: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    samples as f64 / f64::from(sample_rate)
}

//! WAV/PCM16 encoding.
//!
//! Produces the canonical 44-byte RIFF header followed by little-endian
//! 16-bit samples. This layout is the recorder's wire format and must stay
//! bit-exact.

use crate::models::error::RecorderError;

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Output sample width.
pub const BITS_PER_SAMPLE: u16 = 16;

const BYTES_PER_SAMPLE: u32 = (BITS_PER_SAMPLE / 8) as u32;

/// Generate a 44-byte WAV RIFF header for PCM16 data.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    36 + data_size
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * 2
/// [32-33]  block_align = channels * 2
/// [34-35]  16
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
///
/// Fails with `EncodingFailed` when a size field does not fit its width.
pub fn generate_wav_header(
    sample_rate: u32,
    channels: u16,
    data_size: u32,
) -> Result<[u8; WAV_HEADER_SIZE], RecorderError> {
    let (byte_rate, block_align) = frame_layout(sample_rate, channels).ok_or_else(|| {
        RecorderError::EncodingFailed(format!(
            "{} channels at {} Hz overflow the WAV header",
            channels, sample_rate
        ))
    })?;
    let chunk_size = data_size.checked_add(36).ok_or_else(|| {
        RecorderError::EncodingFailed(format!("{} data bytes exceed the RIFF size limit", data_size))
    })?;

    let mut header = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data sub-chunk
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    Ok(header)
}

/// `(byte_rate, block_align)` for PCM16, or `None` if either overflows its
/// header field.
pub fn frame_layout(sample_rate: u32, channels: u16) -> Option<(u32, u16)> {
    let block_align = channels.checked_mul(BYTES_PER_SAMPLE as u16)?;
    let byte_rate = sample_rate.checked_mul(block_align as u32)?;
    Some((byte_rate, block_align))
}

/// Flatten per-channel buffers into the sample stream that gets encoded.
///
/// Exactly two channels are interleaved `[L0, R0, L1, R1, ...]`. Any other
/// channel count passes channel 0 through unchanged.
pub fn interleave(buffers: &[Vec<f32>]) -> Vec<f32> {
    match buffers {
        [left, right] => {
            debug_assert_eq!(left.len(), right.len());
            let mut stereo = Vec::with_capacity(left.len() + right.len());
            for (&l, &r) in left.iter().zip(right) {
                stereo.push(l);
                stereo.push(r);
            }
            stereo
        }
        [first, ..] => first.clone(),
        [] => Vec::new(),
    }
}

/// Quantize one float sample to PCM16.
///
/// Clamps to `[-1.0, 1.0]`, then scales negatives by 32768 and everything
/// else by 32767, truncating toward zero.
pub fn quantize(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Convert float samples to little-endian PCM16 bytes.
pub fn convert_to_int16_pcm(samples: &[f32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        data.extend_from_slice(&quantize(sample).to_le_bytes());
    }
    data
}

/// Encode an already interleaved sample stream as a complete WAV file.
///
/// Output length is `44 + samples.len() * 2`.
pub fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>, RecorderError> {
    let data_size = samples
        .len()
        .checked_mul(BYTES_PER_SAMPLE as usize)
        .and_then(|bytes| u32::try_from(bytes).ok())
        .ok_or_else(|| {
            RecorderError::EncodingFailed(format!(
                "{} samples exceed the RIFF size limit",
                samples.len()
            ))
        })?;

    let header = generate_wav_header(sample_rate, channels, data_size)?;
    let mut wav = Vec::with_capacity(WAV_HEADER_SIZE + data_size as usize);
    wav.extend_from_slice(&header);
    for &sample in samples {
        wav.extend_from_slice(&quantize(sample).to_le_bytes());
    }
    Ok(wav)
}

/// Fields read back from a 44-byte PCM WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub chunk_size: u32,
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

impl WavHeader {
    /// Parse the canonical header at the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, RecorderError> {
        if bytes.len() < WAV_HEADER_SIZE {
            return Err(RecorderError::EncodingFailed(format!(
                "header needs {} bytes, got {}",
                WAV_HEADER_SIZE,
                bytes.len()
            )));
        }
        if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(RecorderError::EncodingFailed("not a RIFF/WAVE stream".into()));
        }
        if &bytes[12..16] != b"fmt " || &bytes[36..40] != b"data" {
            return Err(RecorderError::EncodingFailed("unexpected chunk layout".into()));
        }

        let u16_at = |offset: usize| u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
        let u32_at = |offset: usize| {
            u32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ])
        };

        Ok(Self {
            chunk_size: u32_at(4),
            audio_format: u16_at(20),
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bits_per_sample: u16_at(34),
            data_size: u32_at(40),
        })
    }
}

/// Decode the PCM16 payload that follows the header.
pub fn decode_pcm16(wav: &[u8]) -> Vec<i16> {
    wav.get(WAV_HEADER_SIZE..)
        .unwrap_or_default()
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

//! RIFF/WAV import and export.
//!
//! This module treats WAV purely as a codec at the interface boundary: it
//! converts between a byte stream and `(interleaved f32 samples,
//! channel_count, sample_rate, bit_depth)`. It does not know about clips,
//! tracks, or the transport.

use crate::error::{EngineError, EngineResult};

const RIFF_TAG: &[u8; 4] = b"RIFF";
const WAVE_TAG: &[u8; 4] = b"WAVE";
const FMT_TAG: &[u8; 4] = b"fmt ";
const DATA_TAG: &[u8; 4] = b"data";

const FORMAT_PCM: u16 = 1;
const FORMAT_IEEE_FLOAT: u16 = 3;

/// Decoded WAV payload: interleaved float samples plus the source format.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

/// Parse a RIFF/WAVE byte stream into interleaved float samples.
///
/// Accepts PCM 16/24/32-bit and IEEE float 32-bit, 1-8 channels.
pub fn decode(bytes: &[u8]) -> EngineResult<DecodedAudio> {
    if bytes.len() < 12 || &bytes[0..4] != RIFF_TAG || &bytes[8..12] != WAVE_TAG {
        return Err(EngineError::InvalidData(
            "missing RIFF or WAVE magic".into(),
        ));
    }

    let mut channels = None;
    let mut sample_rate = None;
    let mut bits_per_sample = None;
    let mut format_tag = None;
    let mut data: Option<&[u8]> = None;

    let mut pos = 12usize;
    while pos + 8 <= bytes.len() {
        let chunk_id = &bytes[pos..pos + 4];
        let chunk_size = u32::from_le_bytes([
            bytes[pos + 4],
            bytes[pos + 5],
            bytes[pos + 6],
            bytes[pos + 7],
        ]) as usize;
        let body_start = pos + 8;
        let body_end = body_start
            .checked_add(chunk_size)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| EngineError::InvalidData("chunk size exceeds buffer".into()))?;
        let body = &bytes[body_start..body_end];

        if chunk_id == FMT_TAG {
            if body.len() < 16 {
                return Err(EngineError::InvalidData("fmt chunk too short".into()));
            }
            format_tag = Some(u16::from_le_bytes([body[0], body[1]]));
            channels = Some(u16::from_le_bytes([body[2], body[3]]));
            sample_rate = Some(u32::from_le_bytes([body[4], body[5], body[6], body[7]]));
            bits_per_sample = Some(u16::from_le_bytes([body[14], body[15]]));
        } else if chunk_id == DATA_TAG {
            data = Some(body);
        }

        // Chunks are word-aligned; an odd chunk_size has one pad byte.
        pos = body_end + (chunk_size % 2);
    }

    let format_tag = format_tag
        .ok_or_else(|| EngineError::InvalidData("missing fmt chunk".into()))?;
    let channels = channels.ok_or_else(|| EngineError::InvalidData("missing fmt chunk".into()))?;
    let sample_rate =
        sample_rate.ok_or_else(|| EngineError::InvalidData("missing fmt chunk".into()))?;
    let bits_per_sample =
        bits_per_sample.ok_or_else(|| EngineError::InvalidData("missing fmt chunk".into()))?;
    let data = data.ok_or_else(|| EngineError::InvalidData("missing data chunk".into()))?;

    if format_tag != FORMAT_PCM && format_tag != FORMAT_IEEE_FLOAT {
        return Err(EngineError::InvalidData(format!(
            "unsupported format tag {format_tag}"
        )));
    }
    if channels == 0 || channels as usize > crate::types::MAX_CHANNELS {
        return Err(EngineError::InvalidData("unsupported channel count".into()));
    }

    let samples = match (format_tag, bits_per_sample) {
        (FORMAT_PCM, 16) => decode_pcm16(data),
        (FORMAT_PCM, 24) => decode_pcm24(data),
        (FORMAT_PCM, 32) => decode_pcm32(data),
        (FORMAT_IEEE_FLOAT, 32) => decode_float32(data),
        _ => {
            return Err(EngineError::InvalidData(format!(
                "unsupported bit depth {bits_per_sample} for format {format_tag}"
            )))
        }
    };

    Ok(DecodedAudio {
        samples,
        channels,
        sample_rate,
        bits_per_sample,
    })
}

fn decode_pcm16(data: &[u8]) -> Vec<f32> {
    data.chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32767.0)
        .collect()
}

fn decode_pcm24(data: &[u8]) -> Vec<f32> {
    data.chunks_exact(3)
        .map(|b| {
            let raw = (b[0] as i32) | ((b[1] as i32) << 8) | ((b[2] as i32) << 16);
            let signed = if raw & 0x0080_0000 != 0 {
                raw | !0x00FF_FFFFu32 as i32
            } else {
                raw
            };
            signed as f32 / 8_388_607.0
        })
        .collect()
}

fn decode_pcm32(data: &[u8]) -> Vec<f32> {
    data.chunks_exact(4)
        .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f32 / 2_147_483_647.0)
        .collect()
}

fn decode_float32(data: &[u8]) -> Vec<f32> {
    data.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Which bit depth / format to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Pcm16,
    Pcm24,
    Pcm32,
    Float32,
}

/// Serialize interleaved float samples into a canonical RIFF/WAVE byte stream.
///
/// Samples are clamped to `[-1.0, 1.0]` before scaling to the target depth.
pub fn encode(
    samples: &[f32],
    channels: u16,
    sample_rate: u32,
    format: ExportFormat,
) -> EngineResult<Vec<u8>> {
    if channels == 0 {
        return Err(EngineError::InvalidArgument("channels must be > 0".into()));
    }
    let (bits_per_sample, format_tag, payload) = match format {
        ExportFormat::Pcm16 => (16u16, FORMAT_PCM, encode_pcm16(samples)),
        ExportFormat::Pcm24 => (24u16, FORMAT_PCM, encode_pcm24(samples)),
        ExportFormat::Pcm32 => (32u16, FORMAT_PCM, encode_pcm32(samples)),
        ExportFormat::Float32 => (32u16, FORMAT_IEEE_FLOAT, encode_float32(samples)),
    };

    let block_align = channels * (bits_per_sample / 8);
    let byte_rate = sample_rate * block_align as u32;
    let data_len = payload.len() as u32;
    let fmt_len: u32 = 16;
    let riff_len = 4 + (8 + fmt_len) + (8 + data_len);

    let mut out = Vec::with_capacity(12 + 8 + fmt_len as usize + 8 + payload.len());
    out.extend_from_slice(RIFF_TAG);
    out.extend_from_slice(&riff_len.to_le_bytes());
    out.extend_from_slice(WAVE_TAG);

    out.extend_from_slice(FMT_TAG);
    out.extend_from_slice(&fmt_len.to_le_bytes());
    out.extend_from_slice(&format_tag.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits_per_sample.to_le_bytes());

    out.extend_from_slice(DATA_TAG);
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(&payload);

    Ok(out)
}

fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn encode_pcm24(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 3);
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * 8_388_607.0) as i32;
        out.push((v & 0xFF) as u8);
        out.push(((v >> 8) & 0xFF) as u8);
        out.push(((v >> 16) & 0xFF) as u8);
    }
    out
}

fn encode_pcm32(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 4);
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) as f64 * 2_147_483_647.0) as i32;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn encode_float32(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 4);
    for &s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// Normalize decoded channel content to stereo, per the importer contract:
/// mono duplicates to L=R; stereo passes through; 3+ channels downmix
/// even-indexed channels to L and odd-indexed to R.
pub fn normalize_to_stereo(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        2 => samples.to_vec(),
        n => {
            let n = n as usize;
            let frames = samples.len() / n;
            let mut out = Vec::with_capacity(frames * 2);
            for frame in samples.chunks_exact(n) {
                let (mut l_sum, mut l_n) = (0.0f32, 0u32);
                let (mut r_sum, mut r_n) = (0.0f32, 0u32);
                for (i, &s) in frame.iter().enumerate() {
                    if i % 2 == 0 {
                        l_sum += s;
                        l_n += 1;
                    } else {
                        r_sum += s;
                        r_n += 1;
                    }
                }
                let l = if l_n > 0 { l_sum / l_n as f32 } else { 0.0 };
                let r = if r_n > 0 { r_sum / r_n as f32 } else { l };
                out.push(l);
                out.push(r);
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_magic() {
        let bytes = vec![0u8; 20];
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn pcm16_round_trip_within_quantization() {
        let samples = vec![0.0f32, 0.5, -0.5, 1.0, -1.0];
        let bytes = encode(&samples, 1, 48_000, ExportFormat::Pcm16).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.sample_rate, 48_000);
        for (a, b) in samples.iter().zip(decoded.samples.iter()) {
            assert!((a - b).abs() <= 1.0 / 32767.0 + 1e-6);
        }
    }

    #[test]
    fn float32_round_trip_is_exact() {
        let samples = vec![0.1234f32, -0.9876, 0.0];
        let bytes = encode(&samples, 2, 44_100, ExportFormat::Float32).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.samples, samples);
    }

    #[test]
    fn mono_normalizes_to_duplicated_stereo() {
        let stereo = normalize_to_stereo(&[0.5, -0.5], 1);
        assert_eq!(stereo, vec![0.5, 0.5, -0.5, -0.5]);
    }

    #[test]
    fn multichannel_downmixes_even_odd() {
        let quad = normalize_to_stereo(&[1.0, 2.0, 3.0, 4.0], 4);
        assert_eq!(quad, vec![2.0, 3.0]);
    }

    proptest::proptest! {
        #[test]
        fn pcm16_round_trip_within_quantization_bound(
            samples in proptest::collection::vec(-1.0f32..1.0f32, 1..64)
        ) {
            let bytes = encode(&samples, 1, 48_000, ExportFormat::Pcm16).unwrap();
            let decoded = decode(&bytes).unwrap();
            for (a, b) in samples.iter().zip(decoded.samples.iter()) {
                proptest::prop_assert!((a - b).abs() <= 1.0 / 32767.0 + 1e-6);
            }
        }
    }
}

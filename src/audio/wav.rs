use super::store::SampleStore;
use super::types::{AudioError, SampleReader, WavHeader};
use std::fs;
use std::path::Path;

/// Size of the canonical RIFF/WAVE header preceding the payload
pub const HEADER_LEN: usize = 44;

/// Audio format code for uncompressed PCM
pub const PCM_FORMAT: u16 = 1;

/// Loads a sound file, choosing the decoder from the file extension.
///
/// Only `.wav` files are supported.
///
/// # Errors
/// * `AudioError::Format` if the extension is not a supported sound format
/// * Any error from [`read_wav_file`]
pub fn load(path: &Path) -> Result<SampleStore, AudioError> {
    let is_wav = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));

    if !is_wav {
        return Err(AudioError::Format(format!(
            "Unsupported sound format: {}",
            path.display()
        )));
    }
    read_wav_file(path)
}

/// Reads and decodes a PCM WAV file into a [`SampleStore`].
///
/// # Arguments
/// * `path` - Path to the WAV file to read
///
/// # Returns
/// * `Result<SampleStore, AudioError>` - Normalized samples or an error
///
/// # Errors
/// * `AudioError::Io` if the file cannot be opened or read
/// * `AudioError::Format` if the header or payload fails validation
pub fn read_wav_file(path: &Path) -> Result<SampleStore, AudioError> {
    let bytes = fs::read(path)?;
    decode_wav(&bytes)
}

/// Decodes a complete WAV file held in memory.
///
/// 8-bit samples are unsigned and map `0..=255` onto [0, 1]. 16-bit samples
/// are signed little-endian and map `-32768..=32767` onto [0, 1]. The
/// interleaved payload is split into one vector per channel.
///
/// Nothing is returned unless every check passes.
pub fn decode_wav(bytes: &[u8]) -> Result<SampleStore, AudioError> {
    let header = parse_header(bytes)?;

    let width = header.sample_width();
    let channel_count = header.channels as usize;
    let frame_len = channel_count * width;
    let data_size = header.data_size as usize;

    let available = bytes.len() - HEADER_LEN;
    if data_size > available {
        tracing::warn!(
            "Data subchunk declares {} bytes but only {} follow the header",
            data_size,
            available
        );
        return Err(AudioError::Format(format!(
            "Truncated payload: expected {} bytes of sample data, found {}",
            data_size, available
        )));
    }

    let payload = &bytes[HEADER_LEN..HEADER_LEN + data_size];
    let total = header.total_samples();
    if payload.len() % frame_len != 0 {
        tracing::warn!(
            "Ignoring {} trailing payload bytes that do not form a whole frame",
            payload.len() % frame_len
        );
    }

    let normalize: fn(&[u8]) -> f64 = if width == 1 {
        normalize_u8
    } else {
        normalize_i16
    };

    let mut channels: Vec<Vec<f64>> = (0..channel_count)
        .map(|_| Vec::with_capacity(total))
        .collect();
    for frame in payload.chunks_exact(frame_len) {
        for (samples, raw) in channels.iter_mut().zip(frame.chunks_exact(width)) {
            samples.push(normalize(raw));
        }
    }

    Ok(SampleStore::from_decoded(header, channels))
}

/// Parses and validates the 44-byte header.
///
/// Tags are kept as stored; all numeric fields are little-endian.
///
/// # Errors
/// * If the input is shorter than [`HEADER_LEN`]
/// * If the container or format tag is wrong
/// * If the encoding is not 8- or 16-bit PCM
/// * If the channel count or sample rate is zero
pub fn parse_header(bytes: &[u8]) -> Result<WavHeader, AudioError> {
    if bytes.len() < HEADER_LEN {
        return Err(AudioError::Format(format!(
            "File is {} bytes, a WAV header needs at least {}",
            bytes.len(),
            HEADER_LEN
        )));
    }

    let header = WavHeader {
        chunk_id: tag_at(bytes, 0),
        chunk_size: u32_at(bytes, 4),
        format: tag_at(bytes, 8),
        subchunk1_id: tag_at(bytes, 12),
        subchunk1_size: u32_at(bytes, 16),
        audio_format: u16_at(bytes, 20),
        channels: u16_at(bytes, 22),
        sample_rate: u32_at(bytes, 24),
        byte_rate: u32_at(bytes, 28),
        block_align: u16_at(bytes, 32),
        bits_per_sample: u16_at(bytes, 34),
        subchunk2_id: tag_at(bytes, 36),
        data_size: u32_at(bytes, 40),
    };

    if &header.chunk_id != b"RIFF" {
        return Err(AudioError::Format(format!(
            "Missing RIFF container tag, found {:?}",
            String::from_utf8_lossy(&header.chunk_id)
        )));
    }
    if &header.format != b"WAVE" {
        return Err(AudioError::Format(format!(
            "Missing WAVE format tag, found {:?}",
            String::from_utf8_lossy(&header.format)
        )));
    }
    if header.audio_format != PCM_FORMAT {
        return Err(AudioError::Format(format!(
            "Unsupported audio format code {} (only PCM is supported)",
            header.audio_format
        )));
    }
    if !matches!(header.bits_per_sample, 8 | 16) {
        return Err(AudioError::Format(format!(
            "Unsupported bit depth: {}-bit (only 8 and 16 are supported)",
            header.bits_per_sample
        )));
    }
    if header.channels == 0 {
        return Err(AudioError::Format("Channel count is zero".to_string()));
    }
    if header.sample_rate == 0 {
        return Err(AudioError::Format("Sample rate is zero".to_string()));
    }

    tracing::debug!(
        "Parsed WAV header: {} channel(s), {}Hz, {}-bit, {} data bytes",
        header.channels,
        header.sample_rate,
        header.bits_per_sample,
        header.data_size
    );

    Ok(header)
}

/// Encodes a store as a canonical 8- or 16-bit PCM WAV file.
///
/// This inverts the decoder's normalization, so decoding the output
/// reproduces the store's samples up to quantization.
///
/// # Errors
/// * If `bits_per_sample` is not 8 or 16
/// * If the store does not fit the header's 32-bit size fields
pub fn encode_wav<R: SampleReader + ?Sized>(
    store: &R,
    bits_per_sample: u16,
) -> Result<Vec<u8>, AudioError> {
    if !matches!(bits_per_sample, 8 | 16) {
        return Err(AudioError::InvalidParams(format!(
            "Cannot encode {}-bit audio (only 8 and 16 are supported)",
            bits_per_sample
        )));
    }

    let channels = u16::try_from(store.channel_count())
        .map_err(|_| AudioError::InvalidParams("Too many channels".to_string()))?;
    let width = bits_per_sample as usize / 8;
    let total = store.total_samples();
    let data_size = u32::try_from(total * channels as usize * width)
        .ok()
        .filter(|size| *size <= u32::MAX - 36)
        .ok_or_else(|| AudioError::InvalidParams("Audio too long for a WAV file".to_string()))?;
    let block_align = channels
        .checked_mul(width as u16)
        .ok_or_else(|| AudioError::InvalidParams("Too many channels".to_string()))?;
    let byte_rate = store
        .sample_rate()
        .checked_mul(block_align as u32)
        .ok_or_else(|| {
            AudioError::InvalidParams(format!(
                "Byte rate of {}Hz x {} bytes overflows the header",
                store.sample_rate(),
                block_align
            ))
        })?;

    let mut buf = Vec::with_capacity(HEADER_LEN + data_size as usize);
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&(36 + data_size).to_le_bytes());
    buf.extend_from_slice(b"WAVE");
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&PCM_FORMAT.to_le_bytes());
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&store.sample_rate().to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());

    for t in 0..total {
        for c in 0..channels as usize {
            let value = store.get(c, t).clamp(0.0, 1.0);
            if width == 1 {
                buf.push((value * 255.0).round() as u8);
            } else {
                let raw = (value * 65535.0 - 32768.0).round() as i16;
                buf.extend_from_slice(&raw.to_le_bytes());
            }
        }
    }

    Ok(buf)
}

/// Unsigned 8-bit sample, `0..=255` onto [0, 1]
fn normalize_u8(raw: &[u8]) -> f64 {
    let (min, max) = (u8::MIN as f64, u8::MAX as f64);
    (raw[0] as f64 - min) / (max - min)
}

/// Signed little-endian 16-bit sample, `-32768..=32767` onto [0, 1]
fn normalize_i16(raw: &[u8]) -> f64 {
    let (min, max) = (i16::MIN as f64, i16::MAX as f64);
    let amp = i16::from_le_bytes([raw[0], raw[1]]) as f64;
    (amp - min) / (max - min)
}

fn tag_at(bytes: &[u8], offset: usize) -> [u8; 4] {
    [
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ]
}

fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(tag_at(bytes, offset))
}

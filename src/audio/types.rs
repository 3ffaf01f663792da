use serde::{Deserialize, Serialize};

/// Default analysis window length in seconds (10 ms)
pub const DEFAULT_WINDOW_SECONDS: f64 = 0.01;

/// Errors that can occur during audio processing
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// IO errors when opening or reading files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Header validation failures, truncated files and unsupported encodings
    #[error("WAV format error: {0}")]
    Format(String),

    /// Requested sample range lies outside the available samples
    #[error("Sample range {from}..{to} is out of bounds (total samples: {total})")]
    Range { from: usize, to: usize, total: usize },

    /// Invalid parameter values
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
}

/// Read access to a channel x time matrix of normalized amplitudes.
///
/// This is the only surface shared by the analyzer and external consumers
/// such as a renderer. Values are normalized to the [0, 1] range.
pub trait SampleReader {
    /// Samples per second
    fn sample_rate(&self) -> u32;

    /// Number of samples per channel
    fn total_samples(&self) -> usize;

    /// Number of audio channels
    fn channel_count(&self) -> usize;

    /// Returns the sample at `time` on `channel`.
    ///
    /// # Panics
    /// * If `channel` or `time` is out of range
    fn get(&self, channel: usize, time: usize) -> f64;

    /// Returns samples `from..to` on `channel`.
    ///
    /// # Panics
    /// * If `channel` is out of range or `from..to` is not a valid range
    fn get_slice(&self, channel: usize, from: usize, to: usize) -> &[f64];

    /// Checked variant of [`SampleReader::get`]
    fn try_get(&self, channel: usize, time: usize) -> Option<f64> {
        if channel < self.channel_count() && time < self.total_samples() {
            Some(self.get(channel, time))
        } else {
            None
        }
    }

    /// Checked variant of [`SampleReader::get_slice`]
    fn try_slice(&self, channel: usize, from: usize, to: usize) -> Option<&[f64]> {
        if channel < self.channel_count() && from <= to && to <= self.total_samples() {
            Some(self.get_slice(channel, from, to))
        } else {
            None
        }
    }
}

/// Header fields of a canonical PCM WAV file, as stored on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavHeader {
    /// Container tag, always `RIFF`
    pub chunk_id: [u8; 4],
    /// Total chunk size (not used for decoding)
    pub chunk_size: u32,
    /// Format tag, always `WAVE`
    pub format: [u8; 4],
    /// Format subchunk tag, usually `fmt `
    pub subchunk1_id: [u8; 4],
    pub subchunk1_size: u32,
    /// Audio format code, 1 for PCM
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    /// Data subchunk tag, usually `data`
    pub subchunk2_id: [u8; 4],
    /// Payload length in bytes
    pub data_size: u32,
}

impl WavHeader {
    /// Bytes per sample of a single channel
    pub fn sample_width(&self) -> usize {
        self.bits_per_sample as usize / 8
    }

    /// Samples per channel described by this header
    pub fn total_samples(&self) -> usize {
        let frame = self.channels as usize * self.sample_width();
        if frame == 0 {
            0
        } else {
            self.data_size as usize / frame
        }
    }
}

/// How magnitudes are scaled across a whole spectrogram
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// Raw DFT magnitudes
    None,
    /// Divide every magnitude by the global maximum
    #[default]
    Linear,
    /// `ln(1 + a) / ln(1 + max)` over the whole matrix
    Log,
}

/// Transform used to compute each window's spectrum
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum DftMethod {
    /// Direct O(N^2) summation
    #[default]
    Direct,
    /// rustfft; magnitudes match `Direct` within floating-point tolerance
    Fast,
}

/// Configuration for spectrogram analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Window length in seconds
    pub window_seconds: f64,
    /// Scaling applied to the finished matrix
    pub normalization: Normalization,
    pub method: DftMethod,
    /// Compute windows on the rayon thread pool
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            window_seconds: DEFAULT_WINDOW_SECONDS,
            normalization: Normalization::default(),
            method: DftMethod::default(),
            parallel: false,
        }
    }
}

impl AnalysisConfig {
    /// Config with the given window length and defaults elsewhere.
    /// `None` falls back to [`DEFAULT_WINDOW_SECONDS`].
    pub fn with_window_seconds(window_seconds: Option<f64>) -> Self {
        AnalysisConfig {
            window_seconds: window_seconds.unwrap_or(DEFAULT_WINDOW_SECONDS),
            ..AnalysisConfig::default()
        }
    }

    /// Window length in samples: `round(sample_rate * window_seconds)`.
    ///
    /// # Errors
    /// * If `window_seconds` is not a positive finite number
    /// * If the window rounds to zero samples
    pub fn window_length(&self, sample_rate: u32) -> Result<usize, AudioError> {
        if !self.window_seconds.is_finite() || self.window_seconds <= 0.0 {
            return Err(AudioError::InvalidParams(format!(
                "Window length must be a positive number of seconds, got {}",
                self.window_seconds
            )));
        }

        let length = (sample_rate as f64 * self.window_seconds).round() as usize;
        if length == 0 {
            return Err(AudioError::InvalidParams(format!(
                "Window of {}s at {}Hz contains no samples",
                self.window_seconds, sample_rate
            )));
        }
        Ok(length)
    }
}

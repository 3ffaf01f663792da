use super::types::{AudioError, SampleReader, WavHeader};

/// In-memory channel-major matrix of normalized amplitudes.
///
/// Every stored value lies in [0, 1]. Stores are built once, either by the
/// WAV decoder or by one of the constructors below, and are read-only after.
#[derive(Debug, Clone)]
pub struct SampleStore {
    sample_rate: u32,
    /// `channels[c][t]`
    channels: Vec<Vec<f64>>,
    header: Option<WavHeader>,
}

impl SampleStore {
    /// Builds a store from already normalized per-channel samples.
    ///
    /// # Errors
    /// * If the sample rate is zero or there are no channels
    /// * If the channels differ in length
    /// * If any value is outside [0, 1]
    pub fn from_channels(sample_rate: u32, channels: Vec<Vec<f64>>) -> Result<Self, AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidParams(
                "Sample rate must be greater than zero".to_string(),
            ));
        }
        let Some(first) = channels.first() else {
            return Err(AudioError::InvalidParams(
                "At least one channel is required".to_string(),
            ));
        };

        let len = first.len();
        if let Some(c) = channels.iter().position(|ch| ch.len() != len) {
            return Err(AudioError::InvalidParams(format!(
                "Channel {} has {} samples, expected {}",
                c,
                channels[c].len(),
                len
            )));
        }

        for (c, ch) in channels.iter().enumerate() {
            if let Some(t) = ch.iter().position(|v| !(0.0..=1.0).contains(v)) {
                return Err(AudioError::InvalidParams(format!(
                    "Sample {} on channel {} is outside [0, 1]: {}",
                    t, c, ch[t]
                )));
            }
        }

        Ok(SampleStore {
            sample_rate,
            channels,
            header: None,
        })
    }

    /// Fills `channel_count` channels of `total_samples` samples from a
    /// generator of the sample index. Generated values are clamped to [0, 1].
    pub fn generate<F>(
        sample_rate: u32,
        channel_count: usize,
        total_samples: usize,
        gen: F,
    ) -> Result<Self, AudioError>
    where
        F: Fn(usize) -> f64,
    {
        let samples: Vec<f64> = (0..total_samples)
            .map(|t| {
                let v = gen(t);
                // NaN maps to silence at the midpoint
                if v.is_nan() {
                    0.5
                } else {
                    v.clamp(0.0, 1.0)
                }
            })
            .collect();
        Self::from_channels(sample_rate, vec![samples; channel_count])
    }

    /// Used by the decoder once all checks have passed.
    pub(crate) fn from_decoded(header: WavHeader, channels: Vec<Vec<f64>>) -> Self {
        SampleStore {
            sample_rate: header.sample_rate,
            channels,
            header: Some(header),
        }
    }

    /// Header of the file this store was decoded from, `None` for stores
    /// built in memory
    pub fn header(&self) -> Option<&WavHeader> {
        self.header.as_ref()
    }

    /// Length of the audio in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.total_samples() as f64 / self.sample_rate as f64
    }

    /// All samples of one channel
    pub fn channel(&self, channel: usize) -> Option<&[f64]> {
        self.channels.get(channel).map(Vec::as_slice)
    }
}

impl SampleReader for SampleStore {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_samples(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn get(&self, channel: usize, time: usize) -> f64 {
        self.channels[channel][time]
    }

    fn get_slice(&self, channel: usize, from: usize, to: usize) -> &[f64] {
        &self.channels[channel][from..to]
    }
}

/// Maps a stored [0, 1] amplitude onto [-1, 1] for waveform plotting.
pub fn centered(value: f64) -> f64 {
    value * 2.0 - 1.0
}

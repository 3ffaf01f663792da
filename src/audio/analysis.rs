use super::types::{AnalysisConfig, AudioError, DftMethod, Normalization, SampleReader};
use rayon::prelude::*;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::Serialize;
use std::f64::consts::PI;
use std::sync::Arc;

/// Time x frequency magnitude matrix produced by [`analyze`].
///
/// `rows()[t][k]` is the magnitude of bin `k` in window `t`. Every row holds
/// `window_length / 2` entries; entry 0 is the DC slot and is always zero so
/// that row indices equal bin indices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spectrogram {
    rows: Vec<Vec<f64>>,
    window_length: usize,
    sample_rate: u32,
    normalization: Normalization,
}

impl Spectrogram {
    /// Number of analyzed windows
    pub fn window_count(&self) -> usize {
        self.rows.len()
    }

    /// Entries per row, `window_length / 2`
    pub fn bin_count(&self) -> usize {
        self.window_length / 2
    }

    /// Samples per window
    pub fn window_length(&self) -> usize {
        self.window_length
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Scaling that was applied to the magnitudes
    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    /// Magnitudes of window `t`
    pub fn row(&self, t: usize) -> Option<&[f64]> {
        self.rows.get(t).map(Vec::as_slice)
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<f64>> {
        self.rows
    }

    /// Largest magnitude in the matrix, 0 for an empty matrix
    pub fn max_magnitude(&self) -> f64 {
        max_magnitude(&self.rows)
    }

    /// Frequency in Hz of bin `k`
    pub fn bin_frequency(&self, k: usize) -> f64 {
        bin_to_frequency(k, self.sample_rate, self.window_length)
    }

    /// Peak bin of every window
    pub fn dominant_bins(&self) -> Vec<usize> {
        self.rows.iter().map(|row| dominant_bin(row)).collect()
    }

    /// Peak frequency in Hz of every window
    pub fn dominant_frequencies(&self) -> Vec<f64> {
        self.dominant_bins()
            .into_iter()
            .map(|k| self.bin_frequency(k))
            .collect()
    }
}

/// Computes the spectrogram of channel 0 over samples `from..to`.
///
/// This function performs the following steps:
/// 1. Validates the requested range against the reader
/// 2. Derives the window length from the sample rate and configuration
/// 3. Cuts `(to - from) / window_length` whole windows, dropping the remainder
/// 4. Computes each window's magnitude spectrum, optionally in parallel
/// 5. Applies the configured normalization across the whole matrix
///
/// # Arguments
/// * `reader` - Source of normalized samples
/// * `from` - First sample of the analyzed range
/// * `to` - End of the analyzed range (exclusive)
/// * `config` - Window length, transform and normalization settings
///
/// # Errors
/// * `AudioError::Range` if `to` exceeds the available samples or `from > to`
/// * `AudioError::InvalidParams` if the window length is invalid or the
///   reader has no channels
pub fn analyze<R>(
    reader: &R,
    from: usize,
    to: usize,
    config: &AnalysisConfig,
) -> Result<Spectrogram, AudioError>
where
    R: SampleReader + Sync + ?Sized,
{
    let total = reader.total_samples();
    if from > to || to > total {
        return Err(AudioError::Range { from, to, total });
    }
    if reader.channel_count() == 0 {
        return Err(AudioError::InvalidParams(
            "Cannot analyze audio without channels".to_string(),
        ));
    }

    let sample_rate = reader.sample_rate();
    let window_length = config.window_length(sample_rate)?;
    let window_count = (to - from) / window_length;

    tracing::debug!(
        "Analyzing {} window(s) of {} samples ({:?}, {:?} normalization)",
        window_count,
        window_length,
        config.method,
        config.normalization
    );

    if window_count == 0 {
        return Ok(Spectrogram {
            rows: Vec::new(),
            window_length,
            sample_rate,
            normalization: config.normalization,
        });
    }

    let transform = Transform::new(config.method, window_length);
    let window = |t: usize| {
        let start = from + t * window_length;
        transform.magnitudes(reader.get_slice(0, start, start + window_length))
    };

    let mut rows: Vec<Vec<f64>> = if config.parallel {
        (0..window_count).into_par_iter().map(window).collect()
    } else {
        (0..window_count).map(window).collect()
    };

    normalize(&mut rows, config.normalization);

    Ok(Spectrogram {
        rows,
        window_length,
        sample_rate,
        normalization: config.normalization,
    })
}

/// Direct DFT magnitudes of one window.
///
/// Computes `|X_k| = |sum x[n] e^(-i 2 pi k n / N)|` for `k` in `1..N/2`.
/// The returned vector has `N / 2` entries with entry 0 left at zero.
pub fn dft_window(samples: &[f64]) -> Vec<f64> {
    let len = samples.len();
    let mut magnitudes = vec![0.0; len / 2];

    for (k, magnitude) in magnitudes.iter_mut().enumerate().skip(1) {
        let xk: Complex<f64> = samples
            .iter()
            .enumerate()
            .map(|(n, &x)| {
                // Reduce k*n mod N first to keep the phase argument small
                let phase = ((k * n) % len) as f64 / len as f64;
                Complex::from_polar(x, -2.0 * PI * phase)
            })
            .sum();
        *magnitude = xk.norm();
    }

    magnitudes
}

/// FFT magnitudes of one window, laid out like [`dft_window`]
pub fn fft_window(samples: &[f64]) -> Vec<f64> {
    if samples.len() < 2 {
        return Vec::new();
    }
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(samples.len());
    fft_magnitudes(&*fft, samples)
}

/// Index of the largest magnitude; the first one wins on ties.
///
/// Returns 0 for an empty slice.
pub fn dominant_bin(magnitudes: &[f64]) -> usize {
    let mut best = 0;
    for (k, &magnitude) in magnitudes.iter().enumerate() {
        if magnitude > magnitudes[best] {
            best = k;
        }
    }
    best
}

/// Converts bin `k` of a `window_length`-sample DFT to Hz
pub fn bin_to_frequency(k: usize, sample_rate: u32, window_length: usize) -> f64 {
    if window_length == 0 {
        return 0.0;
    }
    k as f64 * sample_rate as f64 / window_length as f64
}

/// Per-call transform; the FFT plan is shared by all windows
enum Transform {
    Direct,
    Fast(Arc<dyn Fft<f64>>),
}

impl Transform {
    fn new(method: DftMethod, window_length: usize) -> Self {
        match method {
            DftMethod::Direct => Transform::Direct,
            DftMethod::Fast => {
                let mut planner = FftPlanner::<f64>::new();
                Transform::Fast(planner.plan_fft_forward(window_length))
            }
        }
    }

    fn magnitudes(&self, samples: &[f64]) -> Vec<f64> {
        match self {
            Transform::Direct => dft_window(samples),
            Transform::Fast(fft) => fft_magnitudes(&**fft, samples),
        }
    }
}

fn fft_magnitudes(fft: &dyn Fft<f64>, samples: &[f64]) -> Vec<f64> {
    let mut buffer: Vec<Complex<f64>> = samples.iter().map(|&x| Complex::new(x, 0.0)).collect();
    fft.process(&mut buffer);

    let mut magnitudes: Vec<f64> = buffer[..samples.len() / 2]
        .iter()
        .map(|c| c.norm())
        .collect();
    if let Some(dc) = magnitudes.first_mut() {
        *dc = 0.0;
    }
    magnitudes
}

fn max_magnitude(rows: &[Vec<f64>]) -> f64 {
    rows.iter().flatten().copied().fold(0.0, f64::max)
}

/// Scales the whole matrix by one global maximum
fn normalize(rows: &mut [Vec<f64>], policy: Normalization) {
    let max = max_magnitude(rows);
    if max <= 0.0 {
        return;
    }

    match policy {
        Normalization::None => {}
        Normalization::Linear => rows
            .iter_mut()
            .flatten()
            .for_each(|amp| *amp /= max),
        Normalization::Log => {
            let log_max = max.ln_1p();
            rows.iter_mut()
                .flatten()
                .for_each(|amp| *amp = amp.ln_1p() / log_max);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SampleStore;

    fn sine_store(freq: f64, sample_rate: u32, len: usize) -> SampleStore {
        SampleStore::generate(sample_rate, 1, len, |t| {
            0.5 + 0.5 * (2.0 * PI * freq * t as f64 / sample_rate as f64).sin()
        })
        .unwrap()
    }

    #[test]
    fn test_dft_window_excludes_dc() {
        let magnitudes = dft_window(&[0.75; 16]);
        assert_eq!(magnitudes.len(), 8);
        assert!(magnitudes.iter().all(|&m| m.abs() < 1e-9));
    }

    #[test]
    fn test_dft_window_pure_bin() {
        let n = 32;
        let samples: Vec<f64> = (0..n)
            .map(|i| (2.0 * PI * 3.0 * i as f64 / n as f64).cos())
            .collect();
        let magnitudes = dft_window(&samples);
        assert_eq!(dominant_bin(&magnitudes), 3);
        assert!((magnitudes[3] - n as f64 / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_fft_matches_direct_dft() {
        let samples: Vec<f64> = (0..441)
            .map(|i| 0.5 + 0.3 * (i as f64 * 0.13).sin() + 0.1 * (i as f64 * 1.7).cos())
            .collect();
        let direct = dft_window(&samples);
        let fast = fft_window(&samples);
        assert_eq!(direct.len(), fast.len());
        for (d, f) in direct.iter().zip(&fast) {
            assert!((d - f).abs() < 1e-6, "{} vs {}", d, f);
        }
    }

    #[test]
    fn test_dominant_bin_ties_and_empty() {
        assert_eq!(dominant_bin(&[0.0, 2.0, 5.0, 5.0, 1.0]), 2);
        assert_eq!(dominant_bin(&[0.0, 0.0]), 0);
        assert_eq!(dominant_bin(&[]), 0);
    }

    #[test]
    fn test_bin_to_frequency() {
        assert_eq!(bin_to_frequency(4, 44100, 441), 400.0);
        assert_eq!(bin_to_frequency(0, 44100, 441), 0.0);
        assert_eq!(bin_to_frequency(3, 44100, 0), 0.0);
    }

    #[test]
    fn test_analyze_window_count_and_shape() {
        let store = sine_store(440.0, 44100, 4500);
        let spectrogram = analyze(&store, 100, 4500, &AnalysisConfig::default()).unwrap();
        assert_eq!(spectrogram.window_length(), 441);
        assert_eq!(spectrogram.window_count(), 4400 / 441);
        assert_eq!(spectrogram.bin_count(), 220);
        assert!(spectrogram.rows().iter().all(|row| row.len() == 220));
        assert_eq!(spectrogram.row(0), Some(&spectrogram.rows()[0][..]));
        assert!(spectrogram.row(9).is_none());

        let rows = spectrogram.clone().into_rows();
        assert_eq!(rows.len(), 9);
        assert_eq!(rows[0][0], 0.0);
    }

    #[test]
    fn test_window_longer_than_range_yields_no_windows() {
        let store = sine_store(440.0, 44100, 1000);
        for method in [DftMethod::Direct, DftMethod::Fast] {
            let config = AnalysisConfig {
                window_seconds: 1e6,
                method,
                ..AnalysisConfig::default()
            };
            let spectrogram = analyze(&store, 0, 1000, &config).unwrap();
            assert_eq!(spectrogram.window_count(), 0);
            assert_eq!(spectrogram.window_length(), 44_100_000_000);
            assert_eq!(spectrogram.max_magnitude(), 0.0);
        }
    }

    #[test]
    fn test_analyze_range_errors() {
        let store = sine_store(440.0, 8000, 1000);
        let config = AnalysisConfig::default();
        assert!(matches!(
            analyze(&store, 0, 1001, &config),
            Err(AudioError::Range { to: 1001, total: 1000, .. })
        ));
        assert!(matches!(
            analyze(&store, 600, 500, &config),
            Err(AudioError::Range { .. })
        ));
        assert!(analyze(&store, 1000, 1000, &config).unwrap().window_count() == 0);
    }

    #[test]
    fn test_analyze_rejects_bad_window() {
        let store = sine_store(440.0, 8000, 1000);
        for window_seconds in [0.0, -0.01, f64::NAN, 0.00001] {
            let config = AnalysisConfig {
                window_seconds,
                ..AnalysisConfig::default()
            };
            assert!(matches!(
                analyze(&store, 0, 1000, &config),
                Err(AudioError::InvalidParams(_))
            ));
        }
    }

    #[test]
    fn test_normalization_policies() {
        let store = sine_store(1000.0, 8000, 800);
        for policy in [Normalization::None, Normalization::Linear, Normalization::Log] {
            let config = AnalysisConfig {
                normalization: policy,
                ..AnalysisConfig::default()
            };
            let spectrogram = analyze(&store, 0, 800, &config).unwrap();
            assert_eq!(spectrogram.normalization(), policy);
            assert!(spectrogram.rows().iter().flatten().all(|&m| m >= 0.0));
            if policy != Normalization::None {
                assert!((spectrogram.max_magnitude() - 1.0).abs() < 1e-12);
                assert!(spectrogram.rows().iter().flatten().all(|&m| m <= 1.0));
            }
        }
    }

    #[test]
    fn test_normalization_keeps_silence_at_zero() {
        let store = SampleStore::generate(8000, 1, 400, |_| 0.0).unwrap();
        let spectrogram = analyze(&store, 0, 400, &AnalysisConfig::default()).unwrap();
        assert_eq!(spectrogram.max_magnitude(), 0.0);
        assert!(spectrogram.rows().iter().flatten().all(|m| !m.is_nan()));
    }

    #[test]
    fn test_parallel_and_fast_agree_with_sequential_direct() {
        let store = sine_store(440.0, 44100, 4410);
        let sequential = analyze(&store, 0, 4410, &AnalysisConfig::default()).unwrap();

        let parallel = analyze(
            &store,
            0,
            4410,
            &AnalysisConfig {
                parallel: true,
                ..AnalysisConfig::default()
            },
        )
        .unwrap();
        assert_eq!(sequential, parallel);

        let fast = analyze(
            &store,
            0,
            4410,
            &AnalysisConfig {
                method: DftMethod::Fast,
                ..AnalysisConfig::default()
            },
        )
        .unwrap();
        for (a, b) in sequential.rows().iter().flatten().zip(fast.rows().iter().flatten()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_dominant_frequency_of_sine() {
        let store = sine_store(440.0, 44100, 44100);
        let spectrogram = analyze(&store, 0, 44100, &AnalysisConfig::default()).unwrap();
        assert_eq!(spectrogram.window_count(), 100);
        assert!(spectrogram.dominant_bins().iter().all(|&k| k == 4));
        assert!(spectrogram
            .dominant_frequencies()
            .iter()
            .all(|&f| f == 400.0));
    }
}

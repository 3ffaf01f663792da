/// Audio module for decoding PCM WAV files and analyzing their spectra.
///
/// This module provides functionality to:
/// - Read, validate and normalize 8- and 16-bit PCM WAV files
/// - Hold decoded samples behind a read-only accessor trait
/// - Compute windowed DFT spectrograms and dominant frequencies
mod analysis;
mod store;
mod types;
mod wav;

pub use analysis::{
    analyze, bin_to_frequency, dft_window, dominant_bin, fft_window, Spectrogram,
};
pub use store::{centered, SampleStore};
pub use types::{
    AnalysisConfig, AudioError, DftMethod, Normalization, SampleReader, WavHeader,
    DEFAULT_WINDOW_SECONDS,
};
pub use wav::{decode_wav, encode_wav, load, parse_header, read_wav_file, HEADER_LEN, PCM_FORMAT};

//! Decoding of uncompressed PCM WAV files and DFT spectrogram analysis.
//!
//! The [`audio`] module holds the decoder, the in-memory sample store and the
//! spectral analyzer. [`config`] loads analysis defaults from `config.toml`.
pub mod audio;
pub mod config;

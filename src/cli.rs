use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spectro::audio::{self, AudioError, DftMethod, Normalization, SampleReader, SampleStore};
use spectro::config;

/// PCM WAV decoding and spectrogram analysis
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of ./config.toml
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the header and length of a WAV file
    Info(InfoArgs),

    /// Compute a spectrogram and print the dominant frequency of each window
    Analyze(AnalyzeArgs),
}

#[derive(Parser)]
struct InfoArgs {
    /// Path to the input WAV file
    #[arg(required = true)]
    wav_file: PathBuf,
}

#[derive(Parser)]
struct AnalyzeArgs {
    /// Path to the input WAV file
    #[arg(required = true)]
    wav_file: PathBuf,

    /// First sample to analyze
    #[arg(long, default_value_t = 0)]
    from: usize,

    /// End of the analyzed range (defaults to the end of the file)
    #[arg(long)]
    to: Option<usize>,

    /// Window length in seconds
    #[arg(long)]
    window_seconds: Option<f64>,

    /// Magnitude scaling applied across the spectrogram
    #[arg(long, value_enum)]
    normalization: Option<Normalization>,

    /// Transform used per window
    #[arg(long, value_enum)]
    method: Option<DftMethod>,

    /// Compute windows in parallel
    #[arg(long)]
    parallel: bool,

    /// Print JSON instead of one line per window
    #[arg(long)]
    json: bool,

    /// Include the full magnitude matrix in JSON output
    #[arg(long, requires = "json")]
    matrix: bool,
}

#[derive(Serialize)]
struct WindowSummary {
    index: usize,
    start_seconds: f64,
    dominant_bin: usize,
    dominant_hz: f64,
}

#[derive(Serialize)]
struct AnalysisReport<'a> {
    sample_rate: u32,
    window_length: usize,
    normalization: Normalization,
    windows: Vec<WindowSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    magnitudes: Option<&'a [Vec<f64>]>,
}

fn load_wav(path: &Path) -> Result<SampleStore, AudioError> {
    if !path.exists() {
        return Err(AudioError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("WAV file not found: {}", path.display()),
        )));
    }
    audio::load(path)
}

fn run_info_command(args: &InfoArgs) -> Result<(), AudioError> {
    let store = load_wav(&args.wav_file)?;

    if let Some(header) = store.header() {
        println!("Audio format:    {}", header.audio_format);
        println!("Channels:        {}", header.channels);
        println!("Sample rate:     {} Hz", header.sample_rate);
        println!("Byte rate:       {}", header.byte_rate);
        println!("Block align:     {}", header.block_align);
        println!("Bits per sample: {}", header.bits_per_sample);
        println!("Data size:       {} bytes", header.data_size);
    }
    println!("Total samples:   {}", store.total_samples());
    println!("Duration:        {:.3} s", store.duration_seconds());

    Ok(())
}

fn run_analyze_command(
    args: &AnalyzeArgs,
    defaults: &audio::AnalysisConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = load_wav(&args.wav_file)?;

    // Command-line flags override config.toml
    let mut analysis = defaults.clone();
    if let Some(window_seconds) = args.window_seconds {
        analysis.window_seconds = window_seconds;
    }
    if let Some(normalization) = args.normalization {
        analysis.normalization = normalization;
    }
    if let Some(method) = args.method {
        analysis.method = method;
    }
    analysis.parallel |= args.parallel;

    let to = args.to.unwrap_or_else(|| store.total_samples());
    let spectrogram = audio::analyze(&store, args.from, to, &analysis)?;
    tracing::info!(
        "Analyzed {} window(s) of {} samples",
        spectrogram.window_count(),
        spectrogram.window_length()
    );

    let windows: Vec<WindowSummary> = spectrogram
        .dominant_bins()
        .into_iter()
        .enumerate()
        .map(|(index, bin)| WindowSummary {
            index,
            start_seconds: (args.from + index * spectrogram.window_length()) as f64
                / store.sample_rate() as f64,
            dominant_bin: bin,
            dominant_hz: spectrogram.bin_frequency(bin),
        })
        .collect();

    if args.json {
        let report = AnalysisReport {
            sample_rate: spectrogram.sample_rate(),
            window_length: spectrogram.window_length(),
            normalization: spectrogram.normalization(),
            windows,
            magnitudes: args.matrix.then(|| spectrogram.rows()),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for window in &windows {
            println!(
                "{:>6}  {:>10.3}s  bin {:>5}  {:>10.1} Hz",
                window.index, window.start_seconds, window.dominant_bin, window.dominant_hz
            );
        }
    }

    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };

    match &cli.command {
        Commands::Info(args) => run_info_command(args)?,
        Commands::Analyze(args) => run_analyze_command(args, &config.analysis)?,
    }

    Ok(())
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spectro=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    if let Err(err) = run() {
        eprintln!("\nERROR: {}\n", err);
        match err.downcast_ref::<AudioError>() {
            Some(AudioError::Io(ref io_err)) if io_err.kind() == io::ErrorKind::NotFound => {
                eprintln!("Please check that:");
                eprintln!("1. The file path is correct");
                eprintln!("2. The file exists");
                eprintln!("3. You have permission to read the file");
            }
            Some(AudioError::Range { total, .. }) => {
                eprintln!("The file has {} samples per channel.", total);
            }
            _ => {}
        }
        process::exit(1);
    }
}

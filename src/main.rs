//! SDR audio and spectrum feed CLI

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

use sdr_feed::config::OutputFormat;
use sdr_feed::output::format_mhz;
use sdr_feed::{
    AudioFrame, AudioRequest, ChunkSource, Config, FallbackCache, FileChunkLoader,
    FrameFeed, FrequencyDetector, OutputWriter, Playback, PowerDistribution, PowerScanner,
    ScanError, WavRecorder,
};

/// SDR audio and spectrum feed
#[derive(Parser)]
#[command(name = "sdr-feed")]
#[command(about = "Live radio audio frames and active-frequency reports from an RTL-SDR", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

/// Frequency range overrides for a scan
#[derive(Args)]
struct RangeArgs {
    /// Lowest frequency in Hz
    #[arg(long)]
    low: Option<u32>,

    /// Highest frequency in Hz
    #[arg(long)]
    high: Option<u32>,

    /// Bin width in Hz
    #[arg(long)]
    bin: Option<u32>,
}

impl RangeArgs {
    /// Run a scan over the overridden range, defaulting to the configured one
    fn scan(&self, scanner: &PowerScanner) -> Result<PowerDistribution, ScanError> {
        let config = scanner.config();
        scanner.scan(
            self.low.unwrap_or(config.low_hz),
            self.high.unwrap_or(config.high_hz),
            self.bin.unwrap_or(config.bin_hz),
        )
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write raw PCM frames to stdout (frequency 0 = placeholder audio)
    Listen {
        /// Frequency in Hz
        #[arg(short, long)]
        freq: u32,

        /// Stop after this many frames
        #[arg(short = 'n', long)]
        count: Option<u64>,
    },

    /// Play frames on the default output device
    Play {
        /// Frequency in Hz
        #[arg(short, long)]
        freq: u32,
    },

    /// Record frames to a WAV file
    Record {
        /// Frequency in Hz
        #[arg(short, long)]
        freq: u32,

        /// Output WAV file path
        #[arg(short, long, default_value = "recording.wav")]
        output: PathBuf,

        /// Recording duration in seconds
        #[arg(short, long, default_value = "10")]
        duration: u32,
    },

    /// Capture one fixed-length window (or one placeholder chunk) as raw PCM
    Capture {
        /// Frequency in Hz
        #[arg(short, long)]
        freq: u32,

        /// Output file path
        #[arg(short, long, default_value = "capture.raw")]
        output: PathBuf,
    },

    /// Run one spectrum scan and summarise it
    Scan {
        /// Print the full distribution as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        range: RangeArgs,
    },

    /// Scan and report frequencies above the threshold
    Freqs {
        /// Threshold in dBm
        #[arg(short, long, allow_hyphen_values = true)]
        threshold: Option<f32>,

        /// Output format (text, json)
        #[arg(long)]
        format: Option<String>,

        /// Also append reports to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        range: RangeArgs,
    },

    /// List available audio output devices
    Devices,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging - quiet by default, use -v for more
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // stdout may carry PCM, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with_writer(std::io::stderr)
        .init();

    let mut config = if let Some(ref config_path) = cli.config {
        Config::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        Config::default()
    };
    config.apply_env().context("Invalid environment override")?;
    config.validate().context("Invalid configuration")?;

    match cli.command {
        Commands::Listen { freq, count } => listen(config, freq, count),
        Commands::Play { freq } => play(config, freq),
        Commands::Record {
            freq,
            output,
            duration,
        } => record(config, freq, output, duration),
        Commands::Capture { freq, output } => capture(config, freq, output),
        Commands::Scan { json, range } => scan(config, json, range),
        Commands::Freqs {
            threshold,
            format,
            output,
            range,
        } => {
            if let Some(threshold) = threshold {
                config.detect.threshold_dbm = threshold;
            }
            if let Some(format) = format {
                config.output.format = match format.as_str() {
                    "text" => OutputFormat::Text,
                    _ => OutputFormat::Json,
                };
            }
            if output.is_some() {
                config.output.output_path = output;
            }
            freqs(config, range)
        }
        Commands::Devices => list_devices(config),
    }
}

fn chunk_source(config: &Config) -> ChunkSource<FileChunkLoader> {
    let fallback = Arc::new(FallbackCache::new(FileChunkLoader::new(&config.fallback)));
    ChunkSource::new(config.clone(), fallback)
}

/// Ctrl-C clears the returned flag
fn shutdown_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;
    Ok(running)
}

/// Drive `sink` with frames for `freq` until it returns false, the stream
/// ends or the user interrupts
///
/// Frequency 0 keeps pulling placeholder chunks; anything else runs a single
/// demodulator session, which is killed when this returns.
fn pump_frames<F>(config: &Config, freq: u32, running: &AtomicBool, mut sink: F) -> Result<u64>
where
    F: FnMut(AudioFrame) -> Result<bool>,
{
    let source = chunk_source(config);
    let request = AudioRequest::new(freq);
    let mut delivered = 0u64;

    if request.is_fallback() {
        source
            .fallback()
            .preload()
            .context("Placeholder audio unavailable")?;
    }

    'requests: while running.load(Ordering::SeqCst) {
        let stream = source
            .stream(request)
            .with_context(|| format!("Failed to open audio at {}", format_mhz(freq as f64)))?;

        for frame in stream {
            let frame = frame.context("Live audio failed")?;
            delivered += 1;
            if !sink(frame)? || !running.load(Ordering::SeqCst) {
                break 'requests;
            }
        }

        if !request.is_fallback() {
            break;
        }
    }

    Ok(delivered)
}

/// Stream raw frames to stdout
fn listen(config: Config, freq: u32, count: Option<u64>) -> Result<()> {
    let running = shutdown_flag()?;
    let mut stdout = std::io::stdout().lock();
    let limit = count.unwrap_or(u64::MAX);
    let mut written = 0u64;

    let delivered = pump_frames(&config, freq, &running, |frame| {
        stdout.write_all(frame.as_bytes())?;
        written += 1;
        Ok(written < limit)
    })?;
    stdout.flush()?;

    info!("Wrote {} frames", delivered);
    Ok(())
}

/// Play frames through the default output device
fn play(config: Config, freq: u32) -> Result<()> {
    let running = shutdown_flag()?;

    let mut playback = Playback::new(config.audio.clone());
    playback.init().context("Failed to initialize audio output")?;

    let (feed, frames) = FrameFeed::from_config(&config.audio);
    playback.start(frames).context("Failed to start playback")?;
    info!(
        "Playing {} (delivery policy: {})",
        format_mhz(freq as f64),
        feed.policy()
    );

    let delivered = pump_frames(&config, freq, &running, |frame| {
        feed.push(frame)?;
        Ok(true)
    })?;

    let dropped = feed.dropped();
    drop(feed);
    while running.load(Ordering::SeqCst) && !playback.is_drained() {
        std::thread::sleep(Duration::from_millis(50));
    }
    playback.stop();

    info!("Played {} frames ({} dropped)", delivered, dropped);
    Ok(())
}

/// Record frames to a WAV file
fn record(config: Config, freq: u32, output_path: PathBuf, duration_secs: u32) -> Result<()> {
    info!("Recording {} to: {}", format_mhz(freq as f64), output_path.display());
    let running = shutdown_flag()?;

    let mut recorder =
        WavRecorder::create(&output_path, &config.audio).context("Failed to create WAV file")?;

    eprintln!(
        "Recording for {} seconds... Press Ctrl+C to stop early",
        duration_secs
    );

    pump_frames(&config, freq, &running, |frame| {
        recorder.write_frame(&frame)?;
        eprint!("\rRecording: {:.1}s / {}s", recorder.duration(), duration_secs);
        Ok(recorder.duration() < duration_secs as f32)
    })?;
    eprintln!();

    let recorded = recorder.duration();
    recorder.finalize()?;
    info!("Recording saved to: {} ({:.1}s)", output_path.display(), recorded);

    Ok(())
}

/// Write one fixed window or placeholder chunk to a file
fn capture(config: Config, freq: u32, output_path: PathBuf) -> Result<()> {
    let source = chunk_source(&config);
    let frame = source
        .next(AudioRequest::new(freq))
        .with_context(|| format!("Capture at {} failed", format_mhz(freq as f64)))?;

    std::fs::write(&output_path, frame.as_bytes())
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    info!("Wrote {} bytes to {}", frame.len(), output_path.display());
    Ok(())
}

/// Run a scan and print a summary
fn scan(config: Config, json: bool, range: RangeArgs) -> Result<()> {
    let scanner = PowerScanner::new(config.scan.clone(), config.rpc.clone());
    let dist = range.scan(&scanner).context("Spectrum scan failed")?;

    if json {
        println!("{}", serde_json::to_string(&dist)?);
        return Ok(());
    }

    println!(
        "{} - {}: {} samples, {:.0} Hz per sample",
        format_mhz(dist.low),
        format_mhz(dist.high),
        dist.len(),
        dist.step()
    );
    let unmeasured = dist
        .dbm
        .iter()
        .filter(|&&v| v == config.scan.sentinel)
        .count();
    if unmeasured > 0 {
        println!("{} samples without a reading", unmeasured);
    }
    if let Some((freq, dbm)) = dist.peak() {
        println!("Peak: {:.1} dBm at {}", dbm, format_mhz(freq));
    }
    Ok(())
}

/// Scan and report active frequencies
fn freqs(config: Config, range: RangeArgs) -> Result<()> {
    let scanner = PowerScanner::new(config.scan.clone(), config.rpc.clone());
    let detector = FrequencyDetector::new(config.detect.clone());
    debug!("Detecting above {} dBm", detector.threshold());

    let report = detector.report(range.scan(&scanner));
    if report.origin == sdr_feed::Origin::Fake {
        warn!("Receiver unavailable, reporting placeholder frequencies");
    }

    let mut output =
        OutputWriter::new(config.output.clone()).context("Failed to create output writer")?;
    output.write(&report)?;
    if let Some(path) = output.output_path() {
        info!("Report appended to {}", path.display());
    }
    Ok(())
}

/// List available audio output devices
fn list_devices(config: Config) -> Result<()> {
    let playback = Playback::new(config.audio);
    let devices = playback.list_devices()?;

    if devices.is_empty() {
        println!("No audio output devices found");
    } else {
        println!("Available audio output devices:");
        for (i, name) in devices.iter().enumerate() {
            println!("  {}. {}", i + 1, name);
        }
    }

    Ok(())
}

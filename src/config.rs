//! Configuration structures for the sdr-feed system

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

/// Environment variable overriding the rtl_rpcd server address
pub const ENV_RPC_ADDR: &str = "RTLSDR_RPC_SERV_ADDR";
/// Environment variable overriding the rtl_rpcd server port
pub const ENV_RPC_PORT: &str = "RTLSDR_RPC_SERV_PORT";

/// Longest accepted fixed-window capture (one hour)
pub const MAX_CAPTURE_SECS: f32 = 3600.0;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub demod: DemodConfig,
    pub rpc: RpcConfig,
    pub capture: CaptureConfig,
    pub fallback: FallbackConfig,
    pub scan: ScanConfig,
    pub detect: DetectConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `RTLSDR_RPC_SERV_ADDR` / `RTLSDR_RPC_SERV_PORT` overrides
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(addr) = std::env::var(ENV_RPC_ADDR).ok().filter(|v| !v.is_empty()) {
            self.rpc.addr = addr;
        }
        if let Some(port) = std::env::var(ENV_RPC_PORT).ok().filter(|v| !v.is_empty()) {
            self.rpc.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                field: ENV_RPC_PORT.to_string(),
                value: port,
            })?;
        }
        Ok(())
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audio.frame_bytes == 0 || self.audio.frame_bytes % 2 != 0 {
            return Err(invalid("audio.frame_bytes", self.audio.frame_bytes));
        }
        if self.audio.feed_capacity == 0 {
            return Err(invalid("audio.feed_capacity", self.audio.feed_capacity));
        }
        let secs = self.capture.duration_secs;
        if !secs.is_finite() || secs <= 0.0 || secs > MAX_CAPTURE_SECS {
            return Err(invalid("capture.duration_secs", secs));
        }
        if self.capture.window_bytes < self.capture.min_bytes {
            return Err(invalid("capture.window_bytes", self.capture.window_bytes));
        }
        if self.fallback.read_bytes == 0 || self.fallback.reads_per_chunk == 0 {
            return Err(invalid("fallback.read_bytes", self.fallback.read_bytes));
        }
        if self.scan.low_hz >= self.scan.high_hz {
            return Err(invalid("scan.low_hz", self.scan.low_hz));
        }
        if self.scan.rows == 0 || self.scan.cols == 0 {
            return Err(invalid("scan.rows", format!("{}x{}", self.scan.rows, self.scan.cols)));
        }
        if self.scan.bin_hz == 0 {
            return Err(invalid("scan.bin_hz", self.scan.bin_hz));
        }
        if self.detect.step_hz <= 0.0 {
            return Err(invalid("detect.step_hz", self.detect.step_hz));
        }
        Ok(())
    }
}

fn invalid(field: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

/// Live audio format and framing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate of the demodulated stream (Hz)
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Bytes per delivered live frame (must be even)
    pub frame_bytes: usize,
    /// Delay between insufficient reads (milliseconds)
    pub backoff_ms: u64,
    /// What to do with frames when the consumer lags
    pub delivery_policy: DeliveryPolicy,
    /// Frames queued between producer and consumer
    pub feed_capacity: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 32000,
            channels: 1,
            frame_bytes: 16384,
            backoff_ms: 10,
            delivery_policy: DeliveryPolicy::All,
            feed_capacity: 8,
        }
    }
}

impl AudioConfig {
    pub fn backoff(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.backoff_ms)
    }
}

/// Delivery policy for frames handed to a lagging consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryPolicy {
    /// Block the producer until the consumer catches up
    #[default]
    All,
    /// Drop the oldest queued frame so the newest is kept
    Latest,
    /// Drop the incoming frame
    New,
}

impl std::fmt::Display for DeliveryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryPolicy::All => write!(f, "all"),
            DeliveryPolicy::Latest => write!(f, "latest"),
            DeliveryPolicy::New => write!(f, "new"),
        }
    }
}

/// External demodulator invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemodConfig {
    /// Demodulator executable
    pub program: String,
    /// Arguments; `{freq}` is replaced with the requested frequency
    pub args: Vec<String>,
}

impl Default for DemodConfig {
    fn default() -> Self {
        let args = [
            "-M", "fm", "-s", "170k", "-o", "4", "-A", "fast", "-r", "32k", "-l", "0", "-E",
            "deemp", "-f", "{freq}",
        ];
        Self {
            program: "rtl_fm".to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl DemodConfig {
    /// Arguments with the frequency placeholder filled in
    pub fn args_for(&self, freq: u32) -> Vec<String> {
        let freq = freq.to_string();
        self.args.iter().map(|a| a.replace("{freq}", &freq)).collect()
    }
}

/// Remote tuner (rtl_rpcd) settings passed to child processes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub enabled: bool,
    pub addr: String,
    pub port: u16,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: "127.0.0.1".to_string(),
            port: 40000,
        }
    }
}

impl RpcConfig {
    /// Environment handed to rtl_fm / rtl_power
    pub fn env(&self) -> Vec<(String, String)> {
        if !self.enabled {
            return Vec::new();
        }
        vec![
            ("RTLSDR_RPC_IS_ENABLED".to_string(), "1".to_string()),
            (ENV_RPC_ADDR.to_string(), self.addr.clone()),
            (ENV_RPC_PORT.to_string(), self.port.to_string()),
        ]
    }
}

/// Fixed-window live capture
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// How long to record (seconds)
    pub duration_secs: f32,
    /// Shortest acceptable capture (bytes)
    pub min_bytes: usize,
    /// Exact size of a delivered capture (bytes)
    pub window_bytes: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            duration_secs: 30.0,
            min_bytes: 900_000,
            window_bytes: 938_496,
        }
    }
}

/// Placeholder audio source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Reference audio file
    pub path: PathBuf,
    /// Bytes per decoder read
    pub read_bytes: usize,
    /// Decoder reads per chunk
    pub reads_per_chunk: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("mock_audio.mp3"),
            read_bytes: 512,
            reads_per_chunk: 10997,
        }
    }
}

/// Spectrum scan (rtl_power) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub program: String,
    /// Arguments; `{low}`, `{high}`, `{bin}`, `{integration}` and `{crop}`
    /// are filled in from the fields below
    pub args: Vec<String>,
    pub low_hz: u32,
    pub high_hz: u32,
    /// Frequency bin width (Hz)
    pub bin_hz: u32,
    /// Integration interval / exit timer (seconds)
    pub integration_secs: u32,
    /// Fraction of each hop to crop, as passed to `-c`
    pub crop: String,
    /// Expected time bins
    pub rows: usize,
    /// Expected frequency bins per row
    pub cols: usize,
    /// Value substituted for non-numeric samples
    pub sentinel: f32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            program: "rtl_power".to_string(),
            args: ["-e", "{integration}", "-c", "{crop}", "-f", "{low}:{high}:{bin}"]
                .iter()
                .map(|a| a.to_string())
                .collect(),
            low_hz: 70_000_000,
            high_hz: 110_000_000,
            bin_hz: 10_000,
            integration_secs: 10,
            crop: "20%".to_string(),
            rows: 18,
            cols: 411,
            sentinel: -1234.0,
        }
    }
}

impl ScanConfig {
    /// Arguments with every placeholder filled in
    pub fn args(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| {
                a.replace("{low}", &self.low_hz.to_string())
                    .replace("{high}", &self.high_hz.to_string())
                    .replace("{bin}", &self.bin_hz.to_string())
                    .replace("{integration}", &self.integration_secs.to_string())
                    .replace("{crop}", &self.crop)
            })
            .collect()
    }
}

/// Active-frequency detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// Power a frequency must strictly exceed (dBm)
    pub threshold_dbm: f32,
    /// First candidate frequency (Hz)
    pub start_hz: f64,
    /// Distance between candidate frequencies (Hz)
    pub step_hz: f64,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            threshold_dbm: -8.0,
            start_hz: 85_900_000.0,
            step_hz: 200_000.0,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Output file path (None = console only)
    pub output_path: Option<PathBuf>,
    pub enable_console: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Json,
            output_path: None,
            enable_console: true,
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One line per report
    Text,
    /// `{"origin": .., "freqs": [..]}`
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.audio.sample_rate, 32000);
        assert_eq!(config.audio.frame_bytes, 16384);
        assert_eq!(config.scan.rows * config.scan.cols, 18 * 411);
        assert_eq!(config.detect.threshold_dbm, -8.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
            [audio]
            sample_rate = 16000
            channels = 2
            delivery_policy = "latest"

            [scan]
            rows = 4
            cols = 10
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.channels, 2);
        assert_eq!(config.audio.delivery_policy, DeliveryPolicy::Latest);
        assert_eq!(config.scan.rows, 4);
        assert_eq!(config.scan.program, "rtl_power");
    }

    #[test]
    fn test_validate_rejects_odd_frame() {
        let mut config = Config::default();
        config.audio.frame_bytes = 16383;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "audio.frame_bytes"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_capture_duration() {
        for secs in [-1.0, 0.0, f32::NAN, f32::INFINITY, 1e12] {
            let mut config = Config::default();
            config.capture.duration_secs = secs;
            assert!(
                matches!(
                    config.validate(),
                    Err(ConfigError::InvalidValue { ref field, .. }) if field == "capture.duration_secs"
                ),
                "{} accepted",
                secs
            );
        }
    }

    #[test]
    fn test_validate_rejects_empty_range() {
        let mut config = Config::default();
        config.scan.low_hz = config.scan.high_hz;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_demod_args_substitute_freq() {
        let demod = DemodConfig::default();
        let args = demod.args_for(96_100_000);
        assert_eq!(args.last().map(String::as_str), Some("96100000"));
        assert!(!args.iter().any(|a| a.contains("{freq}")));
    }

    #[test]
    fn test_scan_args() {
        let scan = ScanConfig::default();
        assert_eq!(
            scan.args(),
            vec!["-e", "10", "-c", "20%", "-f", "70000000:110000000:10000"]
        );
    }

    #[test]
    fn test_rpc_env_disabled() {
        let rpc = RpcConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(rpc.env().is_empty());
        assert_eq!(RpcConfig::default().env().len(), 3);
    }
}

//! Software-defined radio audio and spectrum feed
//!
//! Captures demodulated audio and spectral power data from an RTL-SDR
//! receiver (through `rtl_fm` and `rtl_power`) and hands it to consumers as
//! fixed-size audio frames and frequency-activity reports. When no receiver is
//! involved, a placeholder stream is served from a pre-split reference
//! recording.
//!
//! # Architecture
//!
//! - `audio`: frame accumulation, live demodulator sessions, fallback chunk
//!   pool, request routing, playback
//! - `spectrum`: scan invocation, grid parsing, threshold detection
//! - `output`: report formatting and WAV recording
//! - `config`: configuration structures
//! - `error`: error types
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sdr_feed::{
//!     AudioRequest, ChunkSource, Config, FallbackCache, FileChunkLoader, FrequencyDetector,
//!     PowerScanner,
//! };
//!
//! let config = Config::default();
//!
//! // Placeholder audio for frequency 0
//! let fallback = Arc::new(FallbackCache::new(FileChunkLoader::new(&config.fallback)));
//! let source = ChunkSource::new(config.clone(), fallback);
//! let chunk = source.next(AudioRequest::new(0)).unwrap();
//!
//! // Active stations
//! let scanner = PowerScanner::new(config.scan.clone(), config.rpc.clone());
//! let detector = FrequencyDetector::new(config.detect.clone());
//! let report = detector.report(scanner.scan(70_000_000, 110_000_000, 10_000));
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod output;
pub mod spectrum;

// Re-exports for convenience
pub use audio::{
    AudioBuffer, AudioFrame, AudioRequest, ChunkLoader, ChunkSource, ChunkStream,
    FallbackCache, FileChunkLoader, FillOutcome, FrameFeed, FrameOrigin, LiveSession,
    Playback, SessionState, WindowCapture, FRAME_BYTES,
};
pub use config::{AudioConfig, Config, DeliveryPolicy, OutputConfig, ScanConfig};
pub use error::{AudioError, ConfigError, Result, ScanError, SdrError};
pub use output::{OutputWriter, WavRecorder};
pub use spectrum::{FrequencyDetector, FrequencyReport, Origin, PowerDistribution, PowerScanner};

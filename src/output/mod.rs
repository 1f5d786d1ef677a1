//! Output formatting and writing modules

pub mod formats;
pub mod wav;

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use crate::config::{OutputConfig, OutputFormat};
use crate::spectrum::FrequencyReport;

pub use formats::{format_json, format_text};
pub use wav::WavRecorder;

/// Report writer that handles console and file destinations
pub struct OutputWriter {
    config: OutputConfig,
    file: Option<File>,
    reports_written: u32,
}

impl OutputWriter {
    /// Create a new output writer
    pub fn new(config: OutputConfig) -> io::Result<Self> {
        let file = if let Some(ref path) = config.output_path {
            // Ensure parent directory exists
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            Some(OpenOptions::new().create(true).append(true).open(path)?)
        } else {
            None
        };

        Ok(Self {
            config,
            file,
            reports_written: 0,
        })
    }

    /// Write a frequency report
    pub fn write(&mut self, report: &FrequencyReport) -> io::Result<()> {
        self.reports_written += 1;

        let formatted = self.format(report);

        if self.config.enable_console {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}", formatted)?;
            stdout.flush()?;
        }

        if let Some(ref mut file) = self.file {
            writeln!(file, "{}", formatted)?;
            file.flush()?;
        }

        Ok(())
    }

    /// Format the report according to configured format
    pub fn format(&self, report: &FrequencyReport) -> String {
        match self.config.format {
            OutputFormat::Text => format_text(report),
            OutputFormat::Json => format_json(report),
        }
    }

    /// Reports written so far
    pub fn reports_written(&self) -> u32 {
        self.reports_written
    }

    /// Get the output file path if configured
    pub fn output_path(&self) -> Option<&PathBuf> {
        self.config.output_path.as_ref()
    }
}

/// Format a frequency in Hz as `MMM.kkk MHz`
pub fn format_mhz(hz: f64) -> String {
    format!("{:.3} MHz", hz / 1_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::Origin;

    #[test]
    fn test_format_mhz() {
        assert_eq!(format_mhz(0.0), "0.000 MHz");
        assert_eq!(format_mhz(85_900_000.0), "85.900 MHz");
        assert_eq!(format_mhz(109_950_000.0), "109.950 MHz");
    }

    #[test]
    fn test_writer_appends_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("freqs.jsonl");
        let config = OutputConfig {
            format: OutputFormat::Json,
            output_path: Some(path.clone()),
            enable_console: false,
        };

        let mut writer = OutputWriter::new(config).unwrap();
        assert_eq!(writer.output_path(), Some(&path));
        writer.write(&FrequencyReport::placeholder()).unwrap();
        writer
            .write(&FrequencyReport {
                origin: Origin::SdrHardware,
                freqs: vec![96_100_000.0],
            })
            .unwrap();
        assert_eq!(writer.reports_written(), 2);

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = written.lines().collect();
        assert_eq!(lines[0], r#"{"origin":"fake","freqs":[0.0]}"#);
        assert_eq!(lines[1], r#"{"origin":"sdr_hardware","freqs":[96100000.0]}"#);
    }
}

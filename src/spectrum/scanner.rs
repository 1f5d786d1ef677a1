//! Spectrum scans via rtl_power

use parking_lot::Mutex;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::distribution::{Origin, PowerDistribution};
use crate::config::{RpcConfig, ScanConfig};
use crate::error::{GridAxis, ScanError};

/// Leading metadata fields on every rtl_power row:
/// date, time, low, high, step, samples
pub const METADATA_FIELDS: usize = 6;

/// Runs the scan tool against one receiver
///
/// Clones share the receiver, so scans from any clone run one at a time.
#[derive(Clone)]
pub struct PowerScanner {
    config: ScanConfig,
    rpc: RpcConfig,
    /// The receiver can only be tuned to one scan plan at a time
    in_flight: Arc<Mutex<()>>,
}

impl PowerScanner {
    pub fn new(config: ScanConfig, rpc: RpcConfig) -> Self {
        Self {
            config,
            rpc,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    /// Scan `[low_hz, high_hz]` in `bin_hz` bins and parse the grid
    ///
    /// Concurrent callers wait for the running scan to finish first. The
    /// remaining tool settings and the expected grid shape come from the
    /// scanner's configuration.
    pub fn scan(&self, low_hz: u32, high_hz: u32, bin_hz: u32) -> Result<PowerDistribution, ScanError> {
        if low_hz >= high_hz || bin_hz == 0 {
            return Err(ScanError::InvalidRange {
                low_hz,
                high_hz,
                bin_hz,
            });
        }
        let plan = ScanConfig {
            low_hz,
            high_hz,
            bin_hz,
            ..self.config.clone()
        };

        let _guard = self.in_flight.lock();
        let started = Instant::now();

        let args = plan.args();
        info!("Scanning with {} {}", plan.program, args.join(" "));

        let output = Command::new(&plan.program)
            .args(&args)
            .envs(self.rpc.env())
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ScanError::ProcessStart(format!("{}: {}", plan.program, e)))?;

        if !output.status.success() {
            return Err(ScanError::ToolFailure(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }

        let dist = parse_grid(&String::from_utf8_lossy(&output.stdout), &plan)?;
        info!(
            "Scan finished in {:.1}s: {} samples",
            started.elapsed().as_secs_f32(),
            dist.len()
        );
        Ok(dist)
    }

    /// Scan the configured range
    pub fn scan_default(&self) -> Result<PowerDistribution, ScanError> {
        self.scan(self.config.low_hz, self.config.high_hz, self.config.bin_hz)
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }
}

/// Parse rtl_power CSV output into a distribution over `config`'s range
///
/// The grid must be exactly `rows` x `cols` after the metadata columns are
/// dropped. Cells that are not numbers (including `nan`) become the sentinel.
pub fn parse_grid(text: &str, config: &ScanConfig) -> Result<PowerDistribution, ScanError> {
    let rows: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
    if rows.len() != config.rows {
        return Err(ScanError::GridMismatch {
            axis: GridAxis::Rows,
            expected: config.rows,
            got: rows.len(),
        });
    }

    let mut dbm = Vec::with_capacity(config.rows * config.cols);
    let mut substituted = 0usize;

    for row in rows {
        let start = dbm.len();
        for cell in row.split(',').skip(METADATA_FIELDS) {
            let value = match cell.trim().parse::<f32>() {
                Ok(v) if !v.is_nan() => v,
                _ => {
                    substituted += 1;
                    config.sentinel
                }
            };
            dbm.push(value);
        }

        let got = dbm.len() - start;
        if got != config.cols {
            return Err(ScanError::GridMismatch {
                axis: GridAxis::Columns,
                expected: config.cols,
                got,
            });
        }
    }

    if substituted > 0 {
        debug!("Replaced {} non-numeric samples with {}", substituted, config.sentinel);
    }

    Ok(PowerDistribution::new(
        Origin::SdrHardware,
        config.low_hz as f64,
        config.high_hz as f64,
        dbm,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ScanConfig {
        ScanConfig {
            rows: 3,
            cols: 4,
            ..Default::default()
        }
    }

    fn row(cells: &[&str]) -> String {
        let mut fields = vec!["2024-01-01", " 12:00:00", " 70000000", " 110000000", " 10000.00", " 8"];
        fields.extend_from_slice(cells);
        fields.join(",")
    }

    fn grid(rows: usize, cols: usize, value: &str) -> String {
        let cells = vec![value; cols];
        (0..rows).map(|_| row(&cells)).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn test_parse_full_grid() {
        let config = ScanConfig::default();
        let dist = parse_grid(&grid(18, 411, " -12.5"), &config).unwrap();
        assert_eq!(dist.len(), 18 * 411);
        assert_eq!(dist.origin, Origin::SdrHardware);
        assert_eq!(dist.low, 70e6);
        assert_eq!(dist.high, 110e6);
        assert!(dist.dbm.iter().all(|&v| v == -12.5));
    }

    #[test]
    fn test_missing_row_is_mismatch() {
        let config = ScanConfig::default();
        let result = parse_grid(&grid(17, 411, "-1"), &config);
        assert!(matches!(
            result,
            Err(ScanError::GridMismatch { axis: GridAxis::Rows, expected: 18, got: 17 })
        ));
    }

    #[test]
    fn test_short_row_is_mismatch() {
        let text = [row(&["1", "2", "3", "4"]), row(&["1", "2", "3"]), row(&["1", "2", "3", "4"])]
            .join("\n");
        let result = parse_grid(&text, &small_config());
        assert!(matches!(
            result,
            Err(ScanError::GridMismatch { axis: GridAxis::Columns, expected: 4, got: 3 })
        ));
    }

    #[test]
    fn test_metadata_only_row_is_mismatch() {
        let text = [row(&["1", "2", "3", "4"]), "2024-01-01, 12:00:00".to_string(), row(&["1", "2", "3", "4"])]
            .join("\n");
        assert!(matches!(
            parse_grid(&text, &small_config()),
            Err(ScanError::GridMismatch { axis: GridAxis::Columns, got: 0, .. })
        ));
    }

    #[test]
    fn test_non_numeric_cells_become_sentinel() {
        let text = [
            row(&["-3.1", "", "nan", "-2"]),
            row(&["abc", "-1", " -nan", "0"]),
            row(&["1", "2", "3", "4"]),
        ]
        .join("\n");
        let dist = parse_grid(&text, &small_config()).unwrap();
        assert_eq!(
            dist.dbm,
            vec![-3.1, -1234.0, -1234.0, -2.0, -1234.0, -1.0, -1234.0, 0.0, 1.0, 2.0, 3.0, 4.0]
        );
    }

    #[test]
    fn test_blank_lines_ignored() {
        let text = format!("\n{}\n\n", grid(3, 4, "-7"));
        let dist = parse_grid(&text, &small_config()).unwrap();
        assert_eq!(dist.len(), 12);
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_failure_is_verbatim() {
        let config = ScanConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "echo 'No supported devices found.' >&2; exit 1".to_string()],
            ..small_config()
        };
        let rpc = RpcConfig {
            enabled: false,
            ..Default::default()
        };
        let result = PowerScanner::new(config, rpc).scan_default();
        match result {
            Err(ScanError::ToolFailure(msg)) => assert_eq!(msg, "No supported devices found.\n"),
            other => panic!("expected tool failure, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_tool_is_start_failure() {
        let config = ScanConfig {
            program: "/nonexistent/rtl_power".to_string(),
            ..Default::default()
        };
        let result = PowerScanner::new(config, RpcConfig::default()).scan_default();
        assert!(matches!(result, Err(ScanError::ProcessStart(_))));
    }

    #[test]
    fn test_empty_range_rejected_before_running() {
        let scanner = PowerScanner::new(
            ScanConfig {
                program: "/nonexistent/rtl_power".to_string(),
                ..Default::default()
            },
            RpcConfig::default(),
        );
        assert!(matches!(
            scanner.scan(110_000_000, 70_000_000, 10_000),
            Err(ScanError::InvalidRange { .. })
        ));
        assert!(matches!(
            scanner.scan(70_000_000, 110_000_000, 0),
            Err(ScanError::InvalidRange { bin_hz: 0, .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_requested_range_reaches_tool() {
        let mut config = ScanConfig::default();
        let mut args = vec!["-c".to_string(), "printf '%s\\n' \"$*\" >&2; exit 1".to_string(), "sh".to_string()];
        args.extend(config.args.drain(..));
        config.program = "sh".to_string();
        config.args = args;
        let rpc = RpcConfig {
            enabled: false,
            ..Default::default()
        };
        let scanner = PowerScanner::new(config, rpc);

        match scanner.scan(88_000_000, 108_000_000, 5_000) {
            Err(ScanError::ToolFailure(message)) => {
                assert_eq!(message, "-e 10 -c 20% -f 88000000:108000000:5000\n");
            }
            other => panic!("expected tool failure, got {:?}", other),
        }
    }
}

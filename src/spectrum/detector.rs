//! Threshold detection of active frequencies

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::distribution::{Origin, PowerDistribution};
use crate::config::DetectConfig;
use crate::error::ScanError;

/// Frequencies judged active in one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyReport {
    pub origin: Origin,
    pub freqs: Vec<f64>,
}

impl FrequencyReport {
    /// Stand-in report for when the receiver could not be scanned
    ///
    /// Distinguishable from "nothing found" by its origin.
    pub fn placeholder() -> Self {
        Self {
            origin: Origin::Fake,
            freqs: vec![0.0],
        }
    }
}

/// Sample index for `freq`; see [`PowerDistribution::index_for`]
pub fn index_for(freq: f64, dist: &PowerDistribution) -> usize {
    dist.index_for(freq)
}

/// Frequencies `start + k * step` below `dist.high` whose power is strictly
/// above `threshold`, ascending
///
/// Candidates below `dist.low` are skipped. A non-positive step yields nothing.
pub fn detect_active(dist: &PowerDistribution, threshold: f32, start: f64, step: f64) -> Vec<f64> {
    let mut active = Vec::new();
    if step <= 0.0 || !step.is_finite() {
        return active;
    }

    let mut k: u64 = 0;
    loop {
        let freq = start + k as f64 * step;
        if freq >= dist.high {
            break;
        }
        if let Some(power) = dist.power_at(freq) {
            if power > threshold {
                active.push(freq);
            }
        }
        k += 1;
    }
    active
}

/// Applies the configured threshold and candidate grid to scans
pub struct FrequencyDetector {
    config: DetectConfig,
}

impl FrequencyDetector {
    pub fn new(config: DetectConfig) -> Self {
        Self { config }
    }

    /// Active frequencies in a successful scan
    pub fn detect(&self, dist: &PowerDistribution) -> FrequencyReport {
        let freqs = detect_active(
            dist,
            self.config.threshold_dbm,
            self.config.start_hz,
            self.config.step_hz,
        );
        debug!(
            "{} of the candidate frequencies exceed {} dBm",
            freqs.len(),
            self.config.threshold_dbm
        );
        FrequencyReport {
            origin: dist.origin,
            freqs,
        }
    }

    /// Report for a scan attempt, substituting the placeholder on failure
    pub fn report(&self, scan: Result<PowerDistribution, ScanError>) -> FrequencyReport {
        match scan {
            Ok(dist) => self.detect(&dist),
            Err(e) => {
                warn!("Spectrum scan failed, sending placeholder: {}", e);
                FrequencyReport::placeholder()
            }
        }
    }

    pub fn threshold(&self) -> f32 {
        self.config.threshold_dbm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(value: f32) -> PowerDistribution {
        PowerDistribution::new(Origin::SdrHardware, 70e6, 110e6, vec![value; 18 * 411])
    }

    fn candidates() -> Vec<f64> {
        (0..)
            .map(|k| 85.9e6 + k as f64 * 200e3)
            .take_while(|&f| f < 110e6)
            .collect()
    }

    #[test]
    fn test_all_below_threshold() {
        assert!(detect_active(&flat(-10.0), -8.0, 85.9e6, 200e3).is_empty());
    }

    #[test]
    fn test_all_above_threshold() {
        let active = detect_active(&flat(-5.0), -8.0, 85.9e6, 200e3);
        assert_eq!(active, candidates());
        assert_eq!(active.len(), 121);
        assert!(active.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_threshold_is_strict() {
        assert!(detect_active(&flat(-8.0), -8.0, 85.9e6, 200e3).is_empty());
    }

    #[test]
    fn test_single_peak() {
        let mut dist = flat(-30.0);
        let idx = index_for(96.1e6, &dist);
        dist.dbm[idx] = 2.0;

        let active = detect_active(&dist, -8.0, 85.9e6, 200e3);
        assert_eq!(active.len(), 1);
        assert!((active[0] - 96.1e6).abs() < 1.0);
    }

    #[test]
    fn test_candidates_below_low_are_skipped() {
        let active = detect_active(&flat(0.0), -8.0, 69.5e6, 200e3);
        assert!(active.iter().all(|&f| f >= 70e6));
        assert_eq!(active.first().copied(), Some(69.5e6 + 3.0 * 200e3));
    }

    #[test]
    fn test_zero_step_terminates() {
        assert!(detect_active(&flat(0.0), -8.0, 85.9e6, 0.0).is_empty());
    }

    #[test]
    fn test_report_uses_config() {
        let detector = FrequencyDetector::new(DetectConfig::default());
        let report = detector.report(Ok(flat(-5.0)));
        assert_eq!(report.origin, Origin::SdrHardware);
        assert_eq!(report.freqs, candidates());
    }

    #[test]
    fn test_failed_scan_gives_placeholder() {
        let detector = FrequencyDetector::new(DetectConfig::default());
        let report = detector.report(Err(ScanError::ToolFailure("usb_claim_interface error -6".into())));
        assert_eq!(report, FrequencyReport::placeholder());
        assert_eq!(
            serde_json::to_string(&report).unwrap(),
            r#"{"origin":"fake","freqs":[0.0]}"#
        );
    }
}

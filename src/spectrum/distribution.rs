//! Power-vs-frequency data from one scan

use serde::{Deserialize, Serialize};

/// Where spectrum data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Measured by the receiver
    SdrHardware,
    /// Placeholder used when no scan was possible
    Fake,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::SdrHardware => write!(f, "sdr_hardware"),
            Origin::Fake => write!(f, "fake"),
        }
    }
}

/// Dense dBm samples spanning `[low, high]` at a uniform step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerDistribution {
    pub origin: Origin,
    pub low: f64,
    pub high: f64,
    pub dbm: Vec<f32>,
}

impl PowerDistribution {
    pub fn new(origin: Origin, low: f64, high: f64, dbm: Vec<f32>) -> Self {
        Self {
            origin,
            low,
            high,
            dbm,
        }
    }

    /// Sample index covering `freq`
    ///
    /// Only meaningful for `low <= freq < high`. Frequencies below `low`
    /// map to 0 and frequencies at or above `high` map past the end, so
    /// callers must range-check or go through [`power_at`](Self::power_at).
    pub fn index_for(&self, freq: f64) -> usize {
        let fraction = (freq - self.low) / (self.high - self.low);
        (self.dbm.len() as f64 * fraction).floor() as usize
    }

    /// Power at `freq`, or `None` when it falls outside the samples
    pub fn power_at(&self, freq: f64) -> Option<f32> {
        if freq < self.low {
            return None;
        }
        self.dbm.get(self.index_for(freq)).copied()
    }

    /// Width of one sample in Hz
    pub fn step(&self) -> f64 {
        if self.dbm.is_empty() {
            return 0.0;
        }
        (self.high - self.low) / self.dbm.len() as f64
    }

    pub fn len(&self) -> usize {
        self.dbm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dbm.is_empty()
    }

    /// Strongest sample and the frequency at its lower edge
    pub fn peak(&self) -> Option<(f64, f32)> {
        self.dbm
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, &dbm)| (self.low + i as f64 * self.step(), dbm))
    }
}

//! Spectrum scanning and active-frequency detection

pub mod detector;
pub mod distribution;
pub mod scanner;

pub use detector::{detect_active, index_for, FrequencyDetector, FrequencyReport};
pub use distribution::{Origin, PowerDistribution};
pub use scanner::{parse_grid, PowerScanner, METADATA_FIELDS};

//! Report format implementations

use crate::spectrum::FrequencyReport;
use super::format_mhz;

/// Format as a single human-readable line
pub fn format_text(report: &FrequencyReport) -> String {
    if report.freqs.is_empty() {
        return format!("[{}] no active frequencies", report.origin);
    }
    let freqs: Vec<String> = report.freqs.iter().map(|&f| format_mhz(f)).collect();
    format!(
        "[{}] {} active: {}",
        report.origin,
        report.freqs.len(),
        freqs.join(", ")
    )
}

/// Format as JSON: `{"origin": .., "freqs": [..]}`
pub fn format_json(report: &FrequencyReport) -> String {
    serde_json::to_string(report)
        .unwrap_or_else(|_| format!("{{\"origin\": \"{}\", \"freqs\": []}}", report.origin))
}

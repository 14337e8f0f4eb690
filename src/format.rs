//! Formatting helpers for human-readable byte sizes and times.

use std::time::Duration;

/// Unit labels for binary-prefixed byte sizes, smallest first.
const UNIT_LABELS: [&str; 5] = ["", "K", "M", "G", "T"];

/// Formats a byte count as a binary-prefixed human-readable string
/// ("1 KB", "1.5 KB", "1 GB"). A zero count renders as an empty string.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return String::new();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNIT_LABELS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{} {}B", trim_decimals(value), UNIT_LABELS[unit])
}

/// Renders a value rounded to two decimals with trailing zeros removed,
/// so 1.00 becomes "1" and 1.50 becomes "1.5".
fn trim_decimals(value: f64) -> String {
    let rendered = format!("{value:.2}");
    rendered
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Formats a second count as `HH:MM:SS`.
#[must_use]
pub fn format_hms(total_secs: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60
    )
}

/// Formats a duration as a human-readable string (e.g. "5.0s", "1m 05s", "1h 01m 05s").
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!(
            "{}h {:02}m {:02}s",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        )
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}.{:01}s", secs, d.subsec_millis() / 100)
    }
}

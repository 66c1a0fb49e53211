//! Quantity parsing and human-readable formatting helpers.
//!
//! The cluster API reports resource quantities in binary-suffix notation
//! (`16383424Ki`, `3800m`) and embeds the same notation inside eviction and
//! condition messages. The patterns here are compiled once and shared
//! process-wide.

use chrono::Duration;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static KIBI_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)Ki\b").expect("kibi pattern"));
static MEBI_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)Mi\b").expect("mebi pattern"));
static GIBI_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)Gi\b").expect("gibi pattern"));
static MILLI_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)m$").expect("milli pattern"));

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Rewrite binary byte suffixes inside free text into human-readable sizes.
///
/// `"memory usage exceeds 16383424Ki"` becomes
/// `"memory usage exceeds 15.6GB"`. Text without such suffixes passes
/// through unchanged.
#[must_use]
pub fn humanize_units(message: &str) -> String {
    let replace = |re: &Regex, text: &str, scale: f64| -> String {
        re.replace_all(text, |caps: &Captures<'_>| {
            caps[1]
                .parse::<f64>()
                .map_or_else(|_| caps[0].to_string(), |n| format_bytes(n * scale))
        })
        .into_owned()
    };

    let message = replace(&KIBI_PATTERN, message, KIB);
    let message = replace(&MEBI_PATTERN, &message, MIB);
    replace(&GIBI_PATTERN, &message, GIB)
}

/// Parse a Kubernetes resource quantity string into a plain number
/// (bytes for memory-like resources, cores for CPU).
#[must_use]
pub fn parse_quantity(quantity: &str) -> Option<f64> {
    let quantity = quantity.trim();
    if quantity.is_empty() {
        return None;
    }
    if let Some(caps) = MILLI_PATTERN.captures(quantity) {
        return caps[1].parse::<f64>().ok().map(|n| n / 1000.0);
    }
    for (suffix, scale) in [
        ("Ki", KIB),
        ("Mi", MIB),
        ("Gi", GIB),
        ("Ti", GIB * 1024.0),
        ("k", 1e3),
        ("M", 1e6),
        ("G", 1e9),
        ("T", 1e12),
    ] {
        if let Some(digits) = quantity.strip_suffix(suffix) {
            return digits.parse::<f64>().ok().map(|n| n * scale);
        }
    }
    quantity.parse::<f64>().ok()
}

/// Format a byte count as a short human-readable size.
#[must_use]
pub fn format_bytes(bytes: f64) -> String {
    if bytes >= GIB {
        format!("{:.1}GB", bytes / GIB)
    } else if bytes >= MIB {
        format!("{:.1}MB", bytes / MIB)
    } else if bytes >= KIB {
        format!("{:.1}KB", bytes / KIB)
    } else {
        format!("{}B", bytes.round() as i64)
    }
}

/// Compact duration rendering: the two most significant units, seconds
/// resolution, `0s` for anything shorter than a second.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if days > 0 {
        if hours > 0 {
            format!("{days}d{hours}h")
        } else {
            format!("{days}d")
        }
    } else if hours > 0 {
        if minutes > 0 {
            format!("{hours}h{minutes}m")
        } else {
            format!("{hours}h")
        }
    } else if minutes > 0 {
        if seconds > 0 {
            format!("{minutes}m{seconds}s")
        } else {
            format!("{minutes}m")
        }
    } else {
        format!("{seconds}s")
    }
}

/// Split a CamelCase condition reason into words:
/// `ContainersNotReady` -> `Containers Not Ready`, `CPUPressure` ->
/// `CPU Pressure`.
#[must_use]
pub fn reason_as_words(reason: &str) -> String {
    let chars: Vec<char> = reason.chars().collect();
    let mut out = String::with_capacity(reason.len() + 4);
    for (i, c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev_lower = chars[i - 1].is_lowercase();
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev_lower || (chars[i - 1].is_uppercase() && next_lower) {
                out.push(' ');
            }
        }
        out.push(*c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_parsing() {
        assert_eq!(parse_quantity("4"), Some(4.0));
        assert_eq!(parse_quantity("3800m"), Some(3.8));
        assert_eq!(parse_quantity("1Ki"), Some(1024.0));
        assert_eq!(parse_quantity("2Mi"), Some(2.0 * 1024.0 * 1024.0));
        assert_eq!(parse_quantity("1Gi"), Some(1024.0 * 1024.0 * 1024.0));
        assert_eq!(parse_quantity("2k"), Some(2000.0));
        assert_eq!(parse_quantity(""), None);
        assert_eq!(parse_quantity("garbage"), None);
    }

    #[test]
    fn byte_formatting() {
        assert_eq!(format_bytes(512.0), "512B");
        assert_eq!(format_bytes(2048.0), "2.0KB");
        assert_eq!(format_bytes(16_383_424.0 * 1024.0), "15.6GB");
    }

    #[test]
    fn humanizes_eviction_message() {
        let msg = "The node was low on resource: memory. Container app was using 1527840Ki, \
                   which exceeds its request of 0.";
        let human = humanize_units(msg);
        assert!(human.contains("1.5GB"), "got: {human}");
        assert!(!human.contains("Ki"));
    }

    #[test]
    fn humanize_leaves_plain_text_alone() {
        assert_eq!(humanize_units("nothing to see"), "nothing to see");
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(Duration::milliseconds(400)), "0s");
        assert_eq!(format_duration(Duration::seconds(45)), "45s");
        assert_eq!(format_duration(Duration::seconds(250)), "4m10s");
        assert_eq!(format_duration(Duration::minutes(60)), "1h");
        assert_eq!(format_duration(Duration::minutes(65)), "1h5m");
        assert_eq!(format_duration(Duration::hours(51)), "2d3h");
        assert_eq!(format_duration(Duration::days(3)), "3d");
        assert_eq!(format_duration(Duration::seconds(-5)), "0s");
    }

    #[test]
    fn reason_splitting() {
        assert_eq!(reason_as_words("ContainersNotReady"), "Containers Not Ready");
        assert_eq!(reason_as_words("Unschedulable"), "Unschedulable");
        assert_eq!(reason_as_words("CPUPressure"), "CPU Pressure");
        assert_eq!(reason_as_words("ReplicaFailure"), "Replica Failure");
        assert_eq!(reason_as_words(""), "");
    }
}

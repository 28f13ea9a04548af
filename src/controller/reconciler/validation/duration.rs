//! # Interval Parsing
//!
//! Parses reconcile intervals written as Go-style duration strings: one or more
//! `<number><unit>` components, e.g. `10s`, `1m`, `1h30m`, `1.5h`, `500ms`.
//! Units are `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`, plus `d` for days.

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

static COMPONENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<number>[0-9]*(?:\.[0-9]*)?)(?P<unit>ns|us|µs|μs|ms|s|m|h|d)")
        .expect("Failed to compile duration regex - this should never happen")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("duration must not be empty")]
    Empty,
    #[error("invalid duration '{0}': expected <number><unit>, e.g. '30s', '1m', '1h30m'")]
    Invalid(String),
    #[error("duration '{0}' must be greater than zero")]
    NotPositive(String),
    #[error("duration '{0}' is too large")]
    Overflow(String),
}

fn unit_nanos(unit: &str) -> u128 {
    match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 3_600 * 1_000_000_000,
        _ => 86_400 * 1_000_000_000,
    }
}

/// Nanoseconds for one `<number><unit>` component
fn component_nanos(number: &str, unit: &str, original: &str) -> Result<u128, DurationError> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(DurationError::Invalid(original.to_string()));
    }

    let scale = unit_nanos(unit);
    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| DurationError::Overflow(original.to_string()))?
    };
    let mut nanos = whole
        .checked_mul(scale)
        .ok_or_else(|| DurationError::Overflow(original.to_string()))?;

    // Fractional digits beyond nanosecond precision are dropped
    let mut place = scale;
    for digit in fraction.chars() {
        place /= 10;
        if place == 0 {
            break;
        }
        nanos += u128::from(digit.to_digit(10).unwrap_or(0)) * place;
    }
    Ok(nanos)
}

/// Parse a reconcile interval
///
/// # Errors
/// Returns `DurationError` when the string is empty, malformed, zero, negative, or
/// larger than `u64` nanoseconds.
pub fn parse_interval(value: &str) -> Result<Duration, DurationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DurationError::Empty);
    }
    if trimmed.starts_with('-') || trimmed == "0" {
        return Err(DurationError::NotPositive(trimmed.to_string()));
    }
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);

    let mut position = 0;
    let mut total: u128 = 0;
    for captures in COMPONENT.captures_iter(body) {
        let (Some(whole), Some(number), Some(unit)) =
            (captures.get(0), captures.name("number"), captures.name("unit"))
        else {
            return Err(DurationError::Invalid(trimmed.to_string()));
        };
        if whole.start() != position {
            return Err(DurationError::Invalid(trimmed.to_string()));
        }
        position = whole.end();
        total = total
            .checked_add(component_nanos(number.as_str(), unit.as_str(), trimmed)?)
            .ok_or_else(|| DurationError::Overflow(trimmed.to_string()))?;
    }

    if position == 0 || position != body.len() {
        return Err(DurationError::Invalid(trimmed.to_string()));
    }
    if total == 0 {
        return Err(DurationError::NotPositive(trimmed.to_string()));
    }
    let nanos = u64::try_from(total).map_err(|_| DurationError::Overflow(trimmed.to_string()))?;
    Ok(Duration::from_nanos(nanos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_unit_intervals() {
        assert_eq!(parse_interval("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_interval("1m"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_interval("2h"), Ok(Duration::from_secs(7200)));
        assert_eq!(parse_interval("1d"), Ok(Duration::from_secs(86_400)));
        assert_eq!(parse_interval("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_interval("250us"), Ok(Duration::from_micros(250)));
        assert_eq!(parse_interval("250µs"), Ok(Duration::from_micros(250)));
        assert_eq!(parse_interval("7ns"), Ok(Duration::from_nanos(7)));
    }

    #[test]
    fn test_compound_and_fractional_intervals() {
        assert_eq!(parse_interval("1h30m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_interval("1m30s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_interval("1.5h"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_interval(".5s"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_interval("2.s"), Ok(Duration::from_secs(2)));
        assert_eq!(parse_interval(" 30s "), Ok(Duration::from_secs(30)));
        assert_eq!(parse_interval("+5m"), Ok(Duration::from_secs(300)));
    }

    #[test]
    fn test_invalid_intervals() {
        assert_eq!(parse_interval(""), Err(DurationError::Empty));
        assert_eq!(parse_interval("   "), Err(DurationError::Empty));
        assert!(matches!(parse_interval("abc"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_interval("10"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_interval("s"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_interval("."), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_interval("1x"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_interval("1m abc"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_interval("10S"), Err(DurationError::Invalid(_))));
    }

    #[test]
    fn test_non_positive_intervals() {
        assert!(matches!(parse_interval("0"), Err(DurationError::NotPositive(_))));
        assert!(matches!(parse_interval("0s"), Err(DurationError::NotPositive(_))));
        assert!(matches!(parse_interval("-1m"), Err(DurationError::NotPositive(_))));
    }

    #[test]
    fn test_overflowing_interval() {
        assert!(matches!(
            parse_interval("99999999999999999999h"),
            Err(DurationError::Overflow(_))
        ));
    }
}

//! `rpc-timeout` header codec.
//!
//! Values are an ASCII integer of at most 8 digits followed by a unit:
//! `H` hours, `M` minutes, `S` seconds, `m` milliseconds, `u` microseconds,
//! `n` nanoseconds.

use std::time::Duration;

/// Header carrying the caller's remaining deadline
pub const TIMEOUT_HEADER: &str = "rpc-timeout";

const MAX_DIGITS: usize = 8;

/// Timeout header errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeoutError {
    #[error("empty timeout value")]
    Empty,

    #[error("invalid timeout unit in {0:?}")]
    InvalidUnit(String),

    #[error("invalid timeout value {0:?}")]
    InvalidValue(String),
}

/// Parse a timeout header value
pub fn parse_timeout(value: &str) -> Result<Duration, TimeoutError> {
    let value = value.trim();
    let unit = value.chars().last().ok_or(TimeoutError::Empty)?;
    let digits = &value[..value.len() - unit.len_utf8()];

    if digits.is_empty() || digits.len() > MAX_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimeoutError::InvalidValue(value.to_string()));
    }
    let amount: u64 = digits
        .parse()
        .map_err(|_| TimeoutError::InvalidValue(value.to_string()))?;

    let duration = match unit {
        'H' => Duration::from_secs(amount * 60 * 60),
        'M' => Duration::from_secs(amount * 60),
        'S' => Duration::from_secs(amount),
        'm' => Duration::from_millis(amount),
        'u' => Duration::from_micros(amount),
        'n' => Duration::from_nanos(amount),
        _ => return Err(TimeoutError::InvalidUnit(value.to_string())),
    };
    Ok(duration)
}

/// Encode a duration as a timeout header value, choosing the finest unit
/// that fits in eight digits.
pub fn encode_timeout(duration: Duration) -> String {
    const LIMIT: u128 = 100_000_000;

    let nanos = duration.as_nanos();
    if nanos < LIMIT {
        return format!("{}n", nanos);
    }
    let micros = duration.as_micros();
    if micros < LIMIT {
        return format!("{}u", micros);
    }
    let millis = duration.as_millis();
    if millis < LIMIT {
        return format!("{}m", millis);
    }
    let secs = duration.as_secs() as u128;
    if secs < LIMIT {
        return format!("{}S", secs);
    }
    let mins = secs / 60;
    if mins < LIMIT {
        return format!("{}M", mins);
    }
    format!("{}H", (mins / 60).min(LIMIT - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_timeout("2H").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_timeout("3M").unwrap(), Duration::from_secs(180));
        assert_eq!(parse_timeout("5S").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_timeout("250m").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_timeout("10u").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_timeout("7n").unwrap(), Duration::from_nanos(7));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_timeout(""), Err(TimeoutError::Empty));
        assert!(matches!(parse_timeout("5x"), Err(TimeoutError::InvalidUnit(_))));
        assert!(matches!(parse_timeout("S"), Err(TimeoutError::InvalidValue(_))));
        assert!(matches!(parse_timeout("-5S"), Err(TimeoutError::InvalidValue(_))));
        assert!(matches!(parse_timeout("123456789S"), Err(TimeoutError::InvalidValue(_))));
    }

    #[test]
    fn test_encode_then_parse_is_close() {
        for d in [
            Duration::from_millis(1500),
            Duration::from_secs(30),
            Duration::from_secs(3 * 24 * 3600),
        ] {
            let parsed = parse_timeout(&encode_timeout(d)).unwrap();
            assert!(parsed <= d);
            assert!(d - parsed < Duration::from_secs(60));
        }
    }
}

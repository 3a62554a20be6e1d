//! Go-style duration strings (`30s`, `1m30s`, `250ms`, `-1s`)

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

/// A duration that may be negative
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SignedDuration {
    negative: bool,
    magnitude: Duration,
}

impl SignedDuration {
    /// The zero duration
    pub const ZERO: Self = Self {
        negative: false,
        magnitude: Duration::ZERO,
    };

    /// A non-negative duration
    #[must_use]
    pub const fn positive(magnitude: Duration) -> Self {
        Self {
            negative: false,
            magnitude,
        }
    }

    /// Whether the duration is strictly below zero
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.negative && !self.magnitude.is_zero()
    }

    /// Absolute value
    #[must_use]
    pub fn magnitude(&self) -> Duration {
        self.magnitude
    }
}

impl fmt::Display for SignedDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(f, "-{:?}", self.magnitude)
        } else {
            write!(f, "{:?}", self.magnitude)
        }
    }
}

impl FromStr for SignedDuration {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_duration(s)
    }
}

fn invalid(input: &str, reason: &str) -> Error {
    Error::Duration(format!("invalid duration {input:?}: {reason}"))
}

fn unit_nanos(unit: &str) -> Option<u128> {
    Some(match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 3_600 * 1_000_000_000,
        _ => return None,
    })
}

/// Parses a duration such as `1h15m`, `1.5s` or `-1s`
///
/// # Errors
/// Returns [`Error::Duration`] for empty input, missing or unknown units and overflow
pub fn parse_duration(input: &str) -> Result<SignedDuration> {
    let s = input.trim();
    let (negative, mut rest) = match s.chars().next() {
        Some('-') => (true, &s[1..]),
        Some('+') => (false, &s[1..]),
        _ => (false, s),
    };

    if rest == "0" {
        return Ok(SignedDuration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid(input, "empty"));
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_end);
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        rest = tail;

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid(input, "expected a number"));
        }
        if unit.is_empty() {
            return Err(invalid(input, "missing unit"));
        }
        let scale = unit_nanos(unit).ok_or_else(|| invalid(input, "unknown unit"))?;

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid(input, "bad number"))?
        };
        let mut nanos = whole
            .checked_mul(scale)
            .ok_or_else(|| invalid(input, "overflow"))?;

        let mut place = scale;
        for digit in fraction.chars() {
            let digit = digit
                .to_digit(10)
                .ok_or_else(|| invalid(input, "bad number"))?;
            place /= 10;
            nanos += u128::from(digit) * place;
        }

        total = total
            .checked_add(nanos)
            .ok_or_else(|| invalid(input, "overflow"))?;
    }

    let nanos = u64::try_from(total).map_err(|_| invalid(input, "overflow"))?;
    Ok(SignedDuration {
        negative,
        magnitude: Duration::from_nanos(nanos),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Duration {
        let d = parse_duration(s).unwrap();
        assert!(!d.is_negative(), "{s} parsed negative");
        d.magnitude()
    }

    #[test]
    fn single_units() {
        assert_eq!(parse("30s"), Duration::from_secs(30));
        assert_eq!(parse("5m"), Duration::from_secs(300));
        assert_eq!(parse("2h"), Duration::from_secs(7200));
        assert_eq!(parse("250ms"), Duration::from_millis(250));
        assert_eq!(parse("10us"), Duration::from_micros(10));
        assert_eq!(parse("10µs"), Duration::from_micros(10));
        assert_eq!(parse("7ns"), Duration::from_nanos(7));
    }

    #[test]
    fn compound_and_fractional() {
        assert_eq!(parse("1h30m"), Duration::from_secs(5400));
        assert_eq!(parse("1m0.5s"), Duration::from_millis(60_500));
        assert_eq!(parse("1.5s"), Duration::from_millis(1500));
        assert_eq!(parse(".5s"), Duration::from_millis(500));
        assert_eq!(parse("+3s"), Duration::from_secs(3));
    }

    #[test]
    fn zero_forms() {
        assert_eq!(parse("0"), Duration::ZERO);
        assert_eq!(parse("0s"), Duration::ZERO);
        assert!(!parse_duration("-0s").unwrap().is_negative());
    }

    #[test]
    fn negative() {
        let d = parse_duration("-1s").unwrap();
        assert!(d.is_negative());
        assert_eq!(d.magnitude(), Duration::from_secs(1));
        assert_eq!(d.to_string(), "-1s");
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "-", "30", "s", "3x", "1..5s", "5 s", "."] {
            assert!(
                matches!(parse_duration(bad), Err(Error::Duration(_))),
                "{bad:?} should not parse"
            );
        }
    }
}

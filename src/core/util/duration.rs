// SPDX-License-Identifier: MIT OR Apache-2.0

//! Duration strings used by configuration (`100ms`, `1.5s`, `1m30s`, `2h`).

use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Unit suffixes and their length in nanoseconds
const UNITS: &[(&str, u128)] = &[
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("μs", 1_000),
    ("ms", 1_000_000),
    ("s", NANOS_PER_SEC),
    ("m", 60 * NANOS_PER_SEC),
    ("h", 3_600 * NANOS_PER_SEC),
];

/// Fraction digits beyond this are below nanosecond precision for every unit
const MAX_FRACTION_DIGITS: usize = 18;

/// Parse a duration string.
///
/// Accepted forms:
/// - a bare integer, interpreted as milliseconds (`"250"`)
/// - one or more `<number><unit>` groups, with units `ns`, `us` (or `µs`),
///   `ms`, `s`, `m`, `h` (`"100s"`, `"1m30.5s"`, `".5h"`, `"300us"`)
///
/// Numbers in groups may carry a decimal fraction. Results are truncated to
/// whole nanoseconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err(
            "Invalid duration '': expected number or duration with suffix (ns, us, ms, s, m, h)"
                .to_string(),
        );
    }

    // Default to milliseconds if no suffix
    if s.bytes().all(|b| b.is_ascii_digit()) {
        let millis = s
            .parse::<u64>()
            .map_err(|_| format!("Invalid duration '{}': number out of range", s))?;
        return Ok(Duration::from_millis(millis));
    }

    let out_of_range = || format!("Invalid duration '{}': number out of range", s);
    let mut total: u128 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let (whole, after_whole) = split_digits(rest);
        let (fraction, after_fraction) = match after_whole.strip_prefix('.') {
            Some(tail) => split_digits(tail),
            None => ("", after_whole),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(format!(
                "Invalid duration '{}': expected number before '{}'",
                s, rest
            ));
        }

        let unit_len = after_fraction
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after_fraction.len());
        let unit = match &after_fraction[..unit_len] {
            "" => {
                return Err(format!(
                    "Invalid duration '{}': missing unit after '{}'",
                    s,
                    &rest[..rest.len() - after_fraction.len()]
                ))
            }
            suffix => UNITS
                .iter()
                .find(|(name, _)| *name == suffix)
                .map(|(_, nanos)| *nanos)
                .ok_or_else(|| {
                    format!(
                        "Invalid duration '{}': unknown unit '{}' (expected ns, us, ms, s, m, h)",
                        s, suffix
                    )
                })?,
        };

        let whole_nanos = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u128>()
                .ok()
                .and_then(|n| n.checked_mul(unit))
                .ok_or_else(out_of_range)?
        };
        let fraction = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
        let fraction_nanos = if fraction.is_empty() {
            0
        } else {
            let scale = 10u128.pow(fraction.len() as u32);
            let digits = fraction.parse::<u128>().map_err(|_| out_of_range())?;
            digits * unit / scale
        };

        total = total
            .checked_add(whole_nanos)
            .and_then(|t| t.checked_add(fraction_nanos))
            .ok_or_else(out_of_range)?;
        rest = &after_fraction[unit_len..];
    }

    let secs = u64::try_from(total / NANOS_PER_SEC).map_err(|_| out_of_range())?;
    Ok(Duration::new(secs, (total % NANOS_PER_SEC) as u32))
}

fn split_digits(s: &str) -> (&str, &str) {
    let len = s.bytes().take_while(|b| b.is_ascii_digit()).count();
    s.split_at(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_units() {
        assert_eq!(parse_duration("100ms").unwrap(), Duration::from_millis(100));
        assert_eq!(parse_duration("100s").unwrap(), Duration::from_secs(100));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("250ns").unwrap(), Duration::from_nanos(250));
        assert_eq!(parse_duration("500us").unwrap(), Duration::from_micros(500));
        assert_eq!(parse_duration("500µs").unwrap(), Duration::from_micros(500));
        assert_eq!(parse_duration("500μs").unwrap(), Duration::from_micros(500));
    }

    #[test]
    fn test_parse_bare_number_is_millis() {
        assert_eq!(parse_duration("250").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration(" 5s ").unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn test_parse_compound() {
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(
            parse_duration("1s500ms").unwrap(),
            Duration::from_millis(1500)
        );
        assert_eq!(
            parse_duration("1h15m30.5s").unwrap(),
            Duration::from_millis(4_530_500)
        );
    }

    #[test]
    fn test_parse_fractions() {
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration(".5s").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("1.s").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_duration("0.25h").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_duration("1.0000000001s").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_duration("2.5us").unwrap(), Duration::from_nanos(2500));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("5s10").is_err());
        assert!(parse_duration("1.").is_err());
        assert!(parse_duration(".s").is_err());
        assert!(parse_duration("1..5s").is_err());
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("99999999999999999999999h").is_err());
    }
}

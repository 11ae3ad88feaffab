//! Human readable elapsed time ("age") for Jobs and Pods.

use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum AgeError {
    #[error("invalid timestamp {input:?}: {reason}")]
    InvalidTimestamp { input: String, reason: String },
}

/// Render the time elapsed from `timestamp` (RFC 3339) until `now`.
///
/// Largest non-zero unit first, down to seconds: `1d 0h 0m 0s`, `2h 0m 0s`, `30m 0s`, `45s`.
/// A zero duration is `0s`; a timestamp after `now` yields `In the future`.
pub fn age_since(timestamp: &str, now: DateTime<Utc>) -> Result<String, AgeError> {
    let then = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|e| AgeError::InvalidTimestamp { input: timestamp.to_string(), reason: e.to_string() })?
        .with_timezone(&Utc);
    if now < then {
        return Ok("In the future".to_string());
    }
    Ok(render_secs((now - then).num_seconds()))
}

fn render_secs(total: i64) -> String {
    let d = total / 86_400;
    let h = total % 86_400 / 3_600;
    let m = total % 3_600 / 60;
    let s = total % 60;
    if d > 0 {
        format!("{d}d {h}h {m}m {s}s")
    } else if h > 0 {
        format!("{h}h {m}m {s}s")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, SecondsFormat, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap()
    }

    fn ts(t: DateTime<Utc>) -> String {
        t.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    #[test]
    fn zero_duration() {
        assert_eq!(age_since(&ts(now()), now()).unwrap(), "0s");
    }

    #[test]
    fn largest_unit_first() {
        assert_eq!(age_since(&ts(now() - Duration::days(1)), now()).unwrap(), "1d 0h 0m 0s");
        assert_eq!(age_since(&ts(now() - Duration::hours(2)), now()).unwrap(), "2h 0m 0s");
        assert_eq!(age_since(&ts(now() - Duration::minutes(30)), now()).unwrap(), "30m 0s");
        assert_eq!(age_since(&ts(now() - Duration::seconds(45)), now()).unwrap(), "45s");
    }

    #[test]
    fn mixed_units() {
        let t = now() - (Duration::days(3) + Duration::hours(4) + Duration::minutes(5) + Duration::seconds(6));
        assert_eq!(age_since(&ts(t), now()).unwrap(), "3d 4h 5m 6s");
        let t = now() - (Duration::minutes(1) + Duration::seconds(1));
        assert_eq!(age_since(&ts(t), now()).unwrap(), "1m 1s");
    }

    #[test]
    fn future_timestamps() {
        assert_eq!(age_since(&ts(now() + Duration::seconds(1)), now()).unwrap(), "In the future");
        assert_eq!(age_since(&ts(now() + Duration::days(400)), now()).unwrap(), "In the future");
    }

    #[test]
    fn past_never_in_the_future() {
        for secs in [0i64, 1, 59, 60, 3_599, 3_600, 86_399, 86_400, 10_000_000] {
            let out = age_since(&ts(now() - Duration::seconds(secs)), now()).unwrap();
            assert_ne!(out, "In the future", "secs={secs}");
        }
    }

    #[test]
    fn offsets_are_honoured() {
        assert_eq!(age_since("2023-01-01T13:00:00+02:00", now()).unwrap(), "1h 0m 0s");
    }

    #[test]
    fn invalid_input_fails() {
        let err = age_since("invalid", now()).unwrap_err();
        assert!(matches!(err, AgeError::InvalidTimestamp { ref input, .. } if input == "invalid"));
    }
}

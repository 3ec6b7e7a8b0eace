// ABOUTME: Utilities for working with times and timestamps.
// ABOUTME: Provides UTC capture times, RFC3339 formatting and monotonic timers.
use chrono::{DateTime, SecondsFormat, Utc};
use std::time::{Duration, Instant};

/// Current wall-clock time in UTC
///
/// # Examples
///
/// ```
/// use pw_core::utc_now;
/// let now = utc_now();
/// assert!(now.timestamp() > 1_577_836_800);
/// ```
pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a UTC time as an RFC3339 string with second precision
///
/// # Examples
///
/// ```
/// use pw_core::{from_epoch_secs, to_rfc3339};
///
/// let time = from_epoch_secs(1_609_459_200.0).unwrap(); // 2021-01-01
/// assert_eq!(to_rfc3339(time), "2021-01-01T00:00:00Z");
/// ```
pub fn to_rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Convert fractional UNIX epoch seconds into a UTC time
///
/// Returns `None` for non-finite or out-of-range values.
pub fn from_epoch_secs(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1_000_000_000.0).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

/// Create a monotonic duration measurer
///
/// # Examples
///
/// ```
/// use pw_core::MonotonicTimer;
/// use std::thread;
/// use std::time::Duration;
///
/// let timer = MonotonicTimer::new();
/// thread::sleep(Duration::from_millis(1));
/// assert!(timer.elapsed() >= Duration::from_millis(1));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTimer {
    start: Instant,
}

impl MonotonicTimer {
    /// Create a new timer starting now
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time since creation
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Reset the timer to now
    pub fn reset(&mut self) {
        self.start = Instant::now();
    }
}

impl Default for MonotonicTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_to_rfc3339() {
        let time = from_epoch_secs(1_609_459_200.0).unwrap();
        assert_eq!(to_rfc3339(time), "2021-01-01T00:00:00Z");
    }

    #[test]
    fn test_from_epoch_secs_fraction() {
        let time = from_epoch_secs(1_609_459_200.5).unwrap();
        assert_eq!(time.timestamp(), 1_609_459_200);
        assert_eq!(time.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_from_epoch_secs_rejects_nan() {
        assert!(from_epoch_secs(f64::NAN).is_none());
        assert!(from_epoch_secs(f64::INFINITY).is_none());
    }

    #[test]
    fn test_monotonic_timer_reset() {
        let mut timer = MonotonicTimer::new();
        thread::sleep(Duration::from_millis(1));
        let first_elapsed = timer.elapsed();
        timer.reset();
        let second_elapsed = timer.elapsed();
        assert!(second_elapsed < first_elapsed);
    }
}

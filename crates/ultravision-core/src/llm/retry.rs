//! Exponential backoff between batch attempts.

use std::time::Duration;

/// Sleep before retry number `attempt` (1-based): `min(base^attempt, cap)` seconds.
pub fn backoff_delay(attempt: u32, base: f64, cap_secs: f64) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let secs = base.powi(exponent).min(cap_secs);
    let secs = if secs.is_finite() && secs > 0.0 {
        secs
    } else {
        cap_secs.max(0.0)
    };
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_exponential() {
        assert_eq!(backoff_delay(1, 2.0, 10.0), Duration::from_secs(2));
        assert_eq!(backoff_delay(2, 2.0, 10.0), Duration::from_secs(4));
        assert_eq!(backoff_delay(3, 2.0, 10.0), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_capped() {
        assert_eq!(backoff_delay(5, 2.0, 5.0), Duration::from_secs(5));
        assert_eq!(backoff_delay(u32::MAX, 1.7, 25.0), Duration::from_secs(25));
    }

    #[test]
    fn test_backoff_default_curve_grows() {
        let first = backoff_delay(1, 1.7, 25.0);
        let second = backoff_delay(2, 1.7, 25.0);
        assert!(second > first);
        assert!((first.as_secs_f64() - 1.7).abs() < 1e-9);
    }

    #[test]
    fn test_backoff_beyond_duration_range_saturates() {
        assert_eq!(backoff_delay(2, 1e10, 1e30), Duration::MAX);
        assert_eq!(backoff_delay(1, 2.0, f64::INFINITY), Duration::from_secs(2));
        assert_eq!(backoff_delay(3, f64::INFINITY, f64::INFINITY), Duration::MAX);
    }
}

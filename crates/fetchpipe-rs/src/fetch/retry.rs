//! Retry policy for transient HTTP/REST failures (§4.C: "failure maps to a
//! fetch-failed error" — we give transient failures a bounded number of
//! attempts before letting that mapping happen).

use std::time::Duration;

/// Backoff schedule for retrying a transient HTTP/REST failure.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Ceiling on any single delay.
    pub max_delay: Duration,
    /// Exponential multiplier applied per attempt.
    pub multiplier: f64,
    /// Whether to jitter each delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A config with retries disabled.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay to wait before attempt number `attempt` (0-indexed, where 0 is
    /// the delay before the first retry).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        let factor = if self.jitter {
            // Deterministic jitter table, avoiding a dependency on `rand`
            // for a cosmetic backoff smoothing.
            const JITTER: [f64; 4] = [0.75, 0.90, 0.60, 0.85];
            JITTER[(attempt % 4) as usize]
        } else {
            1.0
        };
        Duration::from_secs_f64(capped * factor)
    }
}

/// Is `message` a transient failure worth retrying (rate limiting, server
/// errors, connection churn)?
pub fn is_transient_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    for status in ["429", "500", "502", "503", "504"] {
        if message.contains(&format!("HTTP {status}")) {
            return true;
        }
    }
    [
        "request failed:",
        "connection reset",
        "connection refused",
        "timed out",
        "timeout",
        "broken pipe",
        "network",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retries_twice() {
        assert_eq!(RetryConfig::default().max_retries, 2);
    }

    #[test]
    fn disabled_has_no_retries() {
        assert_eq!(RetryConfig::disabled().max_retries, 0);
    }

    #[test]
    fn delay_grows_and_caps() {
        let config = RetryConfig {
            jitter: false,
            ..Default::default()
        };
        let first = config.delay_for_attempt(0);
        let second = config.delay_for_attempt(1);
        assert!(second > first);
        let far = config.delay_for_attempt(20);
        assert!(far <= config.max_delay);
    }

    #[test]
    fn recognizes_transient_statuses() {
        assert!(is_transient_error("HTTP 503 Service Unavailable"));
        assert!(is_transient_error("request failed: connection reset"));
        assert!(!is_transient_error("HTTP 404 Not Found"));
    }
}

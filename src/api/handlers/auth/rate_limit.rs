//! One-time-code issuance throttle.
//!
//! Policy is evaluated against per-user issuance stats read in the same
//! transaction-free query path as the insert; a racing pair of requests can
//! both pass, which is acceptable — the limit bounds abuse, it is not an
//! exactness guarantee.

use crate::api::handlers::auth::state::AuthConfig;

/// Issuance history for one user and purpose.
#[derive(Clone, Copy, Debug, Default)]
pub struct OtpIssuanceStats {
    /// Codes issued within the last rolling hour.
    pub issued_last_hour: i64,
    /// Seconds elapsed since the most recent code, if any.
    pub seconds_since_last: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ThrottleDecision {
    Allow,
    /// Caller must wait this many seconds before the next code.
    Deny { retry_after_seconds: i64 },
}

/// Decide whether a new code may be issued.
#[must_use]
pub fn decide(config: &AuthConfig, stats: OtpIssuanceStats) -> ThrottleDecision {
    if stats.issued_last_hour >= config.otp_hourly_limit {
        return ThrottleDecision::Deny {
            retry_after_seconds: 3600,
        };
    }
    if let Some(elapsed) = stats.seconds_since_last {
        if elapsed < config.otp_cooldown_seconds {
            return ThrottleDecision::Deny {
                retry_after_seconds: config.otp_cooldown_seconds - elapsed,
            };
        }
    }
    ThrottleDecision::Allow
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig::new("Sesamo")
    }

    #[test]
    fn first_code_allowed() {
        assert_eq!(
            decide(&config(), OtpIssuanceStats::default()),
            ThrottleDecision::Allow
        );
    }

    #[test]
    fn hourly_limit_denies() {
        let stats = OtpIssuanceStats {
            issued_last_hour: 5,
            seconds_since_last: Some(3000),
        };
        assert_eq!(
            decide(&config(), stats),
            ThrottleDecision::Deny {
                retry_after_seconds: 3600
            }
        );
    }

    #[test]
    fn cooldown_denies_with_remaining_wait() {
        let stats = OtpIssuanceStats {
            issued_last_hour: 1,
            seconds_since_last: Some(20),
        };
        assert_eq!(
            decide(&config(), stats),
            ThrottleDecision::Deny {
                retry_after_seconds: 40
            }
        );
    }

    #[test]
    fn cooldown_elapsed_allows() {
        let stats = OtpIssuanceStats {
            issued_last_hour: 2,
            seconds_since_last: Some(61),
        };
        assert_eq!(decide(&config(), stats), ThrottleDecision::Allow);
    }

    #[test]
    fn hourly_limit_checked_before_cooldown() {
        let stats = OtpIssuanceStats {
            issued_last_hour: 7,
            seconds_since_last: Some(10),
        };
        assert_eq!(
            decide(&config(), stats),
            ThrottleDecision::Deny {
                retry_after_seconds: 3600
            }
        );
    }
}

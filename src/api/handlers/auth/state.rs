//! Shared configuration and capabilities for the auth handlers.

use crate::api::notify::{LogNotificationSender, NotificationSender};
use std::sync::Arc;

pub const DEFAULT_OTP_TTL_SECONDS: i64 = 600;
pub const DEFAULT_OTP_HOURLY_LIMIT: i64 = 5;
pub const DEFAULT_OTP_COOLDOWN_SECONDS: i64 = 60;
pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
pub const DEFAULT_PASSWORD_MIN_LEN: usize = 8;

/// Tunables for one-time codes, sessions and two-factor provisioning.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub totp_issuer: String,
    pub otp_ttl_seconds: i64,
    pub otp_hourly_limit: i64,
    pub otp_cooldown_seconds: i64,
    pub session_ttl_seconds: i64,
    pub password_min_len: usize,
}

impl AuthConfig {
    #[must_use]
    pub fn new(totp_issuer: impl Into<String>) -> Self {
        Self {
            totp_issuer: totp_issuer.into(),
            otp_ttl_seconds: DEFAULT_OTP_TTL_SECONDS,
            otp_hourly_limit: DEFAULT_OTP_HOURLY_LIMIT,
            otp_cooldown_seconds: DEFAULT_OTP_COOLDOWN_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            password_min_len: DEFAULT_PASSWORD_MIN_LEN,
        }
    }

    #[must_use]
    pub const fn with_otp_ttl_seconds(mut self, seconds: i64) -> Self {
        self.otp_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_otp_hourly_limit(mut self, limit: i64) -> Self {
        self.otp_hourly_limit = limit;
        self
    }

    #[must_use]
    pub const fn with_otp_cooldown_seconds(mut self, seconds: i64) -> Self {
        self.otp_cooldown_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_password_min_len(mut self, len: usize) -> Self {
        self.password_min_len = len;
        self
    }
}

/// Injected capabilities shared by all auth routes.
#[derive(Clone)]
pub struct AuthState {
    pub config: AuthConfig,
    pub sms: Arc<dyn NotificationSender>,
    pub mail: Arc<dyn NotificationSender>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            sms: Arc::new(LogNotificationSender::sms()),
            mail: Arc::new(LogNotificationSender::mail()),
        }
    }

    #[must_use]
    pub fn with_sms(mut self, sender: Arc<dyn NotificationSender>) -> Self {
        self.sms = sender;
        self
    }

    #[must_use]
    pub fn with_mail(mut self, sender: Arc<dyn NotificationSender>) -> Self {
        self.mail = sender;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AuthConfig::new("Sesamo");
        assert_eq!(config.totp_issuer, "Sesamo");
        assert_eq!(config.otp_ttl_seconds, 600);
        assert_eq!(config.otp_hourly_limit, 5);
        assert_eq!(config.otp_cooldown_seconds, 60);
        assert_eq!(config.session_ttl_seconds, 604_800);
        assert_eq!(config.password_min_len, 8);
    }

    #[test]
    fn builders_override() {
        let config = AuthConfig::new("Sesamo")
            .with_otp_ttl_seconds(300)
            .with_otp_hourly_limit(3)
            .with_otp_cooldown_seconds(30)
            .with_session_ttl_seconds(3600)
            .with_password_min_len(12);
        assert_eq!(config.otp_ttl_seconds, 300);
        assert_eq!(config.otp_hourly_limit, 3);
        assert_eq!(config.otp_cooldown_seconds, 30);
        assert_eq!(config.session_ttl_seconds, 3600);
        assert_eq!(config.password_min_len, 12);
    }
}

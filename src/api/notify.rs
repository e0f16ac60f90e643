//! Notification delivery abstraction.
//!
//! Handlers never talk to an SMS or email vendor directly: they hand a
//! `Notification` to an injected `NotificationSender` and carry on. Delivery
//! failures are reported back (`smsSent:false`) but never abort a flow whose
//! durable state has already been written — the one-time code exists even if
//! the message did not arrive, and the caller can request a resend within the
//! rate-limit window.
//!
//! The default sender for local dev is `LogNotificationSender`, which logs the
//! payload and returns `Ok(())`.

use anyhow::Result;
use tracing::info;

#[derive(Clone, Debug)]
pub struct Notification {
    pub destination: String,
    pub body: String,
}

/// Delivery abstraction for SMS and email capabilities.
pub trait NotificationSender: Send + Sync {
    /// Deliver a message or return an error so the caller can flag it.
    fn send(&self, notification: &Notification) -> Result<()>;
}

/// Local dev sender that logs the payload instead of delivering it.
#[derive(Clone, Debug)]
pub struct LogNotificationSender {
    channel: &'static str,
}

impl LogNotificationSender {
    #[must_use]
    pub const fn sms() -> Self {
        Self { channel: "sms" }
    }

    #[must_use]
    pub const fn mail() -> Self {
        Self { channel: "mail" }
    }
}

impl NotificationSender for LogNotificationSender {
    fn send(&self, notification: &Notification) -> Result<()> {
        info!(
            channel = self.channel,
            destination = %notification.destination,
            body = %notification.body,
            "notification send stub"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sender_always_succeeds() {
        let sender = LogNotificationSender::sms();
        let result = sender.send(&Notification {
            destination: "+15551234567".to_string(),
            body: "Your code is 123456".to_string(),
        });
        assert!(result.is_ok());
    }
}

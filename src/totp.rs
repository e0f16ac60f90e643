//! TOTP helpers shared by the two-factor handlers.
//!
//! Codes are standard RFC 6238: SHA-1, 6 digits, 30-second step, and one step
//! of drift tolerated in either direction. The shared secret is kept base32
//! encoded so it can be embedded in `otpauth://` provisioning URIs as-is.

use anyhow::{Result, anyhow};
use totp_rs::{Algorithm, Secret, TOTP};

const TOTP_DIGITS: usize = 6;
const TOTP_SKEW: u8 = 1;
const TOTP_STEP_SECONDS: u64 = 30;

/// Generate a fresh random shared secret, base32 encoded.
#[must_use]
pub fn generate_secret() -> String {
    Secret::generate_secret().to_encoded().to_string()
}

/// Build a TOTP instance for a stored secret.
///
/// The account label ends up in the provisioning URI, so callers should pass
/// something the user recognizes in their authenticator app.
///
/// # Errors
/// Returns an error if the secret is not valid base32 or is too short.
pub fn build(secret_base32: &str, issuer: &str, account: &str) -> Result<TOTP> {
    let secret = Secret::Encoded(secret_base32.to_string())
        .to_bytes()
        .map_err(|err| anyhow!("invalid TOTP secret: {err:?}"))?;
    TOTP::new(
        Algorithm::SHA1,
        TOTP_DIGITS,
        TOTP_SKEW,
        TOTP_STEP_SECONDS,
        secret,
        Some(issuer.to_string()),
        account.to_string(),
    )
    .map_err(|err| anyhow!("failed to build TOTP: {err}"))
}

/// Check a presented code against the current time window.
#[must_use]
pub fn check_now(totp: &TOTP, code: &str) -> bool {
    totp.check_current(code).unwrap_or(false)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP";

    #[test]
    fn generated_secret_round_trips() {
        let secret = generate_secret();
        let totp = build(&secret, "Sesamo", "alice@example.com").unwrap();
        assert_eq!(totp.get_secret_base32(), secret);
    }

    #[test]
    fn provisioning_uri_carries_issuer_and_account() {
        let totp = build(SECRET, "Sesamo", "alice@example.com").unwrap();
        let url = totp.get_url();
        assert!(url.starts_with("otpauth://totp/"));
        assert!(url.contains("issuer=Sesamo"));
        assert!(url.contains("alice%40example.com"));
    }

    #[test]
    fn code_accepted_within_drift_window() {
        let totp = build(SECRET, "Sesamo", "alice@example.com").unwrap();
        let now = 1_700_000_000;
        let code = totp.generate(now);
        assert!(totp.check(&code, now));
        // One step of drift in either direction is tolerated.
        assert!(totp.check(&code, now + TOTP_STEP_SECONDS));
        assert!(totp.check(&code, now.saturating_sub(TOTP_STEP_SECONDS)));
    }

    #[test]
    fn code_rejected_beyond_drift_window() {
        let totp = build(SECRET, "Sesamo", "alice@example.com").unwrap();
        let now = 1_700_000_000;
        let code = totp.generate(now);
        assert!(!totp.check(&code, now + 3 * TOTP_STEP_SECONDS));
    }

    #[test]
    fn build_rejects_garbage_secret() {
        assert!(build("not base32!!", "Sesamo", "alice@example.com").is_err());
    }
}

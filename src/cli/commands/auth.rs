use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

pub const ARG_TOTP_ISSUER: &str = "totp-issuer";

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_otp_args(command);
    with_session_args(command)
}

fn with_otp_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("otp-ttl-seconds")
                .long("otp-ttl-seconds")
                .help("One-time code TTL in seconds")
                .env("SESAMO_OTP_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("otp-hourly-limit")
                .long("otp-hourly-limit")
                .help("Max one-time codes per user and purpose in a rolling hour")
                .env("SESAMO_OTP_HOURLY_LIMIT")
                .default_value("5")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("otp-cooldown-seconds")
                .long("otp-cooldown-seconds")
                .help("Cooldown between one-time codes for the same user and purpose")
                .env("SESAMO_OTP_COOLDOWN_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("session-ttl-seconds")
                .long("session-ttl-seconds")
                .help("Session TTL in seconds")
                .env("SESAMO_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_TOTP_ISSUER)
                .long(ARG_TOTP_ISSUER)
                .help("Issuer label embedded in TOTP provisioning URIs")
                .env("SESAMO_TOTP_ISSUER")
                .default_value("Sesamo"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub otp_ttl_seconds: i64,
    pub otp_hourly_limit: i64,
    pub otp_cooldown_seconds: i64,
    pub session_ttl_seconds: i64,
    pub totp_issuer: String,
}

impl Options {
    /// Extract auth options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a defaulted argument is somehow missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            otp_ttl_seconds: matches
                .get_one::<i64>("otp-ttl-seconds")
                .copied()
                .context("missing argument: --otp-ttl-seconds")?,
            otp_hourly_limit: matches
                .get_one::<i64>("otp-hourly-limit")
                .copied()
                .context("missing argument: --otp-hourly-limit")?,
            otp_cooldown_seconds: matches
                .get_one::<i64>("otp-cooldown-seconds")
                .copied()
                .context("missing argument: --otp-cooldown-seconds")?,
            session_ttl_seconds: matches
                .get_one::<i64>("session-ttl-seconds")
                .copied()
                .context("missing argument: --session-ttl-seconds")?,
            totp_issuer: matches
                .get_one::<String>(ARG_TOTP_ISSUER)
                .cloned()
                .context("missing argument: --totp-issuer")?,
        })
    }
}

//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::auth;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        otp_ttl_seconds: auth_opts.otp_ttl_seconds,
        otp_hourly_limit: auth_opts.otp_hourly_limit,
        otp_cooldown_seconds: auth_opts.otp_cooldown_seconds,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        totp_issuer: auth_opts.totp_issuer,
    }))
}

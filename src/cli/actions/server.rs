use crate::api;
use anyhow::Result;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub otp_ttl_seconds: i64,
    pub otp_hourly_limit: i64,
    pub otp_cooldown_seconds: i64,
    pub session_ttl_seconds: i64,
    pub totp_issuer: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = api::handlers::auth::AuthConfig::new(args.totp_issuer)
        .with_otp_ttl_seconds(args.otp_ttl_seconds)
        .with_otp_hourly_limit(args.otp_hourly_limit)
        .with_otp_cooldown_seconds(args.otp_cooldown_seconds)
        .with_session_ttl_seconds(args.session_ttl_seconds);

    api::new(args.port, args.dsn, auth_config).await
}

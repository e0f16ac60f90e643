//! Account creation.
//!
//! Signup writes the user row first and the verification code second: the
//! UNIQUE(mobile_number, country_code) constraint settles duplicate races, and
//! a code that fails to send can be re-requested through `/v1/auth/send-otp`.

use axum::{Json, extract::Extension, http::StatusCode};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use std::sync::Arc;

use super::error::AuthError;
use super::state::AuthState;
use super::storage::{SignupOutcome, UserRecord, ensure_default_role, insert_user};
use super::types::{OtpPurpose, SignupRequest, SignupResponse};
use super::utils::{
    hash_password, normalize_country_code, normalize_mobile, valid_country_code, valid_email,
    valid_mobile,
};
use super::verify::issue_otp;

pub(super) const DEFAULT_COUNTRY_CODE: &str = "+1";
pub(super) const DEFAULT_ROLE: &str = "user";

/// Register a new account and send the first verification code.
#[utoipa::path(
    post,
    path = "/v1/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = SignupResponse),
        (status = 400, description = "Invalid input or duplicate mobile number", body = super::error::ErrorBody),
        (status = 429, description = "Too many verification codes", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn signup(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SignupRequest>>,
) -> Result<(StatusCode, Json<SignupResponse>), AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::validation("Missing payload"));
    };

    let mobile = normalize_mobile(&request.mobile_number);
    if !valid_mobile(&mobile) {
        return Err(AuthError::validation("Invalid mobile number"));
    }

    let country_code = request
        .country_code
        .as_deref()
        .map_or_else(|| DEFAULT_COUNTRY_CODE.to_string(), normalize_country_code);
    if !valid_country_code(&country_code) {
        return Err(AuthError::validation("Invalid country code"));
    }

    let full_name = request.full_name.trim();
    if full_name.is_empty() {
        return Err(AuthError::validation("Missing full name"));
    }

    let email = match request.email.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(email) => {
            let email = email.to_lowercase();
            if !valid_email(&email) {
                return Err(AuthError::validation("Invalid email address"));
            }
            Some(email)
        }
    };

    let password = request.password.expose_secret();
    if password.len() < auth_state.config.password_min_len {
        return Err(AuthError::validation(format!(
            "Password must be at least {} characters",
            auth_state.config.password_min_len
        )));
    }

    let password_hash = hash_password(password)?;
    let user_id = match insert_user(
        &pool,
        &mobile,
        &country_code,
        email.as_deref(),
        &password_hash,
        full_name,
    )
    .await?
    {
        SignupOutcome::Created(user_id) => user_id,
        SignupOutcome::Conflict => {
            return Err(AuthError::Conflict(
                "Mobile number is already registered".to_string(),
            ));
        }
    };

    ensure_default_role(&pool, user_id, DEFAULT_ROLE).await?;

    // The throttle never fires for a brand-new user; the shared issuance path
    // handles delivery and the email copy.
    let user = UserRecord {
        user_id,
        mobile_number: mobile,
        country_code,
        email,
        password_hash,
        full_name: full_name.to_string(),
        is_verified: false,
        is_active: true,
    };
    let sms_sent = issue_otp(&pool, &auth_state, &user, OtpPurpose::Signup).await?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user_id: user_id.to_string(),
            mobile_number: user.mobile_number,
            country_code: user.country_code,
            message: "Account created. Verify your mobile number with the code we sent."
                .to_string(),
            requires_otp: true,
            sms_sent,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::super::state::{AuthConfig, AuthState};
    use super::{DEFAULT_COUNTRY_CODE, DEFAULT_ROLE, signup};
    use crate::api::handlers::auth::error::AuthError;
    use crate::api::handlers::auth::types::SignupRequest;
    use anyhow::Result;
    use axum::Json;
    use axum::extract::Extension;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;

    fn auth_state() -> Arc<AuthState> {
        Arc::new(AuthState::new(AuthConfig::new("Sesamo")))
    }

    fn request(mobile: &str, password: &str) -> SignupRequest {
        SignupRequest {
            mobile_number: mobile.to_string(),
            country_code: None,
            password: SecretString::from(password),
            full_name: "Alice Example".to_string(),
            email: None,
        }
    }

    #[test]
    fn defaults() {
        assert_eq!(DEFAULT_COUNTRY_CODE, "+1");
        assert_eq!(DEFAULT_ROLE, "user");
    }

    #[tokio::test]
    async fn signup_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let result = signup(Extension(pool), Extension(auth_state()), None).await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
        Ok(())
    }

    #[tokio::test]
    async fn signup_rejects_bad_mobile() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let result = signup(
            Extension(pool),
            Extension(auth_state()),
            Some(Json(request("12", "longenoughpassword"))),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
        Ok(())
    }

    #[tokio::test]
    async fn signup_rejects_short_password() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let result = signup(
            Extension(pool),
            Extension(auth_state()),
            Some(Json(request("5551234567", "short"))),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
        Ok(())
    }

    #[tokio::test]
    async fn signup_rejects_blank_name() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let mut req = request("5551234567", "longenoughpassword");
        req.full_name = "  ".to_string();
        let result = signup(Extension(pool), Extension(auth_state()), Some(Json(req))).await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
        Ok(())
    }

    #[tokio::test]
    async fn signup_rejects_bad_email() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let mut req = request("5551234567", "longenoughpassword");
        req.email = Some("not-an-email".to_string());
        let result = signup(Extension(pool), Extension(auth_state()), Some(Json(req))).await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
        Ok(())
    }
}

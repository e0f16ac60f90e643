//! Request/response types for auth endpoints.
//!
//! Wire field names are camelCase. Password-bearing requests wrap the secret
//! in `SecretString` and deliberately do not implement `Serialize`, so a
//! stray debug or log line cannot leak it.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub mobile_number: String,
    #[serde(default)]
    pub country_code: Option<String>,
    #[schema(value_type = String)]
    pub password: SecretString,
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub user_id: String,
    /// Normalized identity echo, so the client knows what to verify against.
    pub mobile_number: String,
    pub country_code: String,
    pub message: String,
    /// Always true: the account stays unverified until the code is redeemed.
    pub requires_otp: bool,
    pub sms_sent: bool,
}

#[derive(ToSchema, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SigninRequest {
    pub mobile_number: String,
    #[serde(default)]
    pub country_code: Option<String>,
    #[schema(value_type = String)]
    pub password: SecretString,
}

/// Password sign-in never returns tokens directly; it issues a `signin` code
/// and the session is minted when the code is redeemed.
#[derive(ToSchema, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SigninResponse {
    pub message: String,
    /// Normalized identity echo for the follow-up verify call.
    pub mobile_number: String,
    pub country_code: String,
    /// Always true: the code is the only way to finish sign-in.
    pub requires_otp: bool,
    pub sms_sent: bool,
}

#[derive(ToSchema, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: String,
    pub mobile_number: String,
    pub country_code: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub is_verified: bool,
    pub roles: Vec<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    Signup,
    Signin,
    PasswordReset,
}

impl OtpPurpose {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Signup => "signup",
            Self::Signin => "signin",
            Self::PasswordReset => "password_reset",
        }
    }
}

#[derive(ToSchema, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpRequest {
    /// Phone identity in any common spelling; digits are what matter.
    pub identity: String,
    #[serde(rename = "otpType")]
    pub purpose: OtpPurpose,
}

#[derive(ToSchema, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpResponse {
    pub message: String,
    pub sms_sent: bool,
}

#[derive(ToSchema, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub identity: String,
    #[serde(rename = "otpCode")]
    pub code: String,
    #[serde(rename = "otpType")]
    pub purpose: OtpPurpose,
}

/// The raw session triple. Appears in responses only; the database stores
/// digests.
#[derive(ToSchema, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionCredentials {
    pub token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Session grant plus user projection, shared by OTP redemption and the
/// two-factor step-up. `two_factor_required` tells the client whether the
/// account still expects `/v1/auth/2fa/signin` before sensitive operations.
#[derive(ToSchema, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrantResponse {
    pub message: String,
    pub session: SessionCredentials,
    pub two_factor_required: bool,
    pub user: UserSummary,
}

#[derive(ToSchema, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub identity: String,
}

#[derive(ToSchema, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub identity: String,
    #[serde(rename = "otpCode")]
    pub code: String,
    #[schema(value_type = String)]
    pub new_password: SecretString,
}

#[derive(ToSchema, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,
}

#[derive(ToSchema, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: UserSummary,
    pub expires_at: i64,
    pub two_factor_enabled: bool,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorGenerateRequest {
    /// Optional when the bearer token is sent in the Authorization header.
    #[serde(default)]
    pub session_token: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorGenerateResponse {
    pub secret: String,
    pub otpauth_url: String,
}

#[derive(ToSchema, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorVerifyRequest {
    #[serde(default)]
    pub session_token: Option<String>,
    pub code: String,
}

#[derive(ToSchema, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorVerifyResponse {
    pub message: String,
    pub recovery_codes: Vec<String>,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorDisableRequest {
    #[serde(default)]
    pub session_token: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorDisableResponse {
    pub success: bool,
    pub message: String,
}

#[derive(ToSchema, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorSigninRequest {
    #[serde(default)]
    pub session_token: Option<String>,
    /// A TOTP code, or a recovery code when `isRecoveryCode` is set.
    pub token: String,
    #[serde(default)]
    pub is_recovery_code: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};
    use secrecy::ExposeSecret;
    use serde_json::json;

    #[test]
    fn signup_request_decodes_camel_case() -> Result<()> {
        let request: SignupRequest = serde_json::from_value(json!({
            "mobileNumber": "5551234567",
            "countryCode": "+1",
            "password": "hunter22",
            "fullName": "Alice Example"
        }))?;
        assert_eq!(request.mobile_number, "5551234567");
        assert_eq!(request.country_code.as_deref(), Some("+1"));
        assert_eq!(request.password.expose_secret(), "hunter22");
        assert!(request.email.is_none());
        Ok(())
    }

    #[test]
    fn otp_requests_use_wire_field_names() -> Result<()> {
        let request: SendOtpRequest = serde_json::from_value(json!({
            "identity": "+15551234567",
            "otpType": "password_reset"
        }))?;
        assert_eq!(request.purpose, OtpPurpose::PasswordReset);
        assert_eq!(request.purpose.as_str(), "password_reset");

        let request: VerifyOtpRequest = serde_json::from_value(json!({
            "identity": "+15551234567",
            "otpCode": "123456",
            "otpType": "signin"
        }))?;
        assert_eq!(request.code, "123456");
        assert_eq!(request.purpose, OtpPurpose::Signin);

        let request: ResetPasswordRequest = serde_json::from_value(json!({
            "identity": "+15551234567",
            "otpCode": "123456",
            "newPassword": "longenoughpassword"
        }))?;
        assert_eq!(request.code, "123456");
        assert_eq!(request.new_password.expose_secret(), "longenoughpassword");
        Ok(())
    }

    #[test]
    fn session_grant_nests_credentials() -> Result<()> {
        let response = SessionGrantResponse {
            message: "Signed in".to_string(),
            session: SessionCredentials {
                token: "tok".to_string(),
                refresh_token: "ref".to_string(),
                expires_at: 1_700_000_000,
            },
            two_factor_required: false,
            user: UserSummary {
                user_id: "u1".to_string(),
                mobile_number: "5551234567".to_string(),
                country_code: "+1".to_string(),
                full_name: "Alice Example".to_string(),
                email: None,
                is_verified: true,
                roles: vec!["user".to_string()],
            },
        };
        let value = serde_json::to_value(&response)?;
        // The triple rides under `session`, not at the top level.
        assert!(value.get("token").is_none());
        let session = value.get("session").context("missing session")?;
        assert!(session.get("token").is_some());
        assert!(session.get("refreshToken").is_some());
        assert!(session.get("expiresAt").is_some());
        assert!(value.get("twoFactorRequired").is_some());
        let user = value.get("user").context("missing user")?;
        assert!(user.get("email").is_none());
        assert!(user.get("isVerified").is_some());
        Ok(())
    }

    #[test]
    fn signup_response_echoes_identity_and_flags_otp() -> Result<()> {
        let response = SignupResponse {
            user_id: "u1".to_string(),
            mobile_number: "5551234567".to_string(),
            country_code: "+1".to_string(),
            message: "Account created".to_string(),
            requires_otp: true,
            sms_sent: false,
        };
        let value = serde_json::to_value(&response)?;
        assert_eq!(
            value.get("mobileNumber").and_then(serde_json::Value::as_str),
            Some("5551234567")
        );
        assert_eq!(
            value.get("countryCode").and_then(serde_json::Value::as_str),
            Some("+1")
        );
        assert_eq!(
            value.get("requiresOtp").and_then(serde_json::Value::as_bool),
            Some(true)
        );
        assert_eq!(
            value.get("smsSent").and_then(serde_json::Value::as_bool),
            Some(false)
        );
        Ok(())
    }

    #[test]
    fn signin_response_echoes_identity_and_flags_otp() -> Result<()> {
        let response = SigninResponse {
            message: "Verification code sent".to_string(),
            mobile_number: "5551234567".to_string(),
            country_code: "+1".to_string(),
            requires_otp: true,
            sms_sent: true,
        };
        let value = serde_json::to_value(&response)?;
        assert_eq!(
            value.get("mobileNumber").and_then(serde_json::Value::as_str),
            Some("5551234567")
        );
        assert_eq!(
            value.get("requiresOtp").and_then(serde_json::Value::as_bool),
            Some(true)
        );
        Ok(())
    }

    #[test]
    fn two_factor_disable_reports_success() -> Result<()> {
        let response = TwoFactorDisableResponse {
            success: true,
            message: "Two-factor disabled".to_string(),
        };
        let value = serde_json::to_value(&response)?;
        assert_eq!(
            value.get("success").and_then(serde_json::Value::as_bool),
            Some(true)
        );
        Ok(())
    }

    #[test]
    fn two_factor_requests_allow_empty_bodies() -> Result<()> {
        let request: TwoFactorGenerateRequest = serde_json::from_value(json!({}))?;
        assert!(request.session_token.is_none());

        let request: TwoFactorDisableRequest = serde_json::from_value(json!({}))?;
        assert!(request.session_token.is_none());

        let request: TwoFactorSigninRequest = serde_json::from_value(json!({
            "token": "123456"
        }))?;
        assert!(!request.is_recovery_code);
        assert!(request.session_token.is_none());
        Ok(())
    }
}

//! Session introspection and logout, plus the bearer-token resolution shared
//! by every authenticated route.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::sync::Arc;

use super::error::AuthError;
use super::mfa;
use super::state::AuthState;
use super::storage::{
    SessionRecord, UserRecord, delete_session, load_roles, lookup_session, lookup_user_by_id,
};
use super::types::{SessionResponse, UserSummary};
use super::utils::{extract_bearer_token, hash_session_token};

/// Build the wire view of an account.
pub(super) fn summarize(user: &UserRecord, roles: Vec<String>) -> UserSummary {
    UserSummary {
        user_id: user.user_id.to_string(),
        mobile_number: user.mobile_number.clone(),
        country_code: user.country_code.clone(),
        full_name: user.full_name.clone(),
        email: user.email.clone(),
        is_verified: user.is_verified,
        roles,
    }
}

/// Resolve a raw session token (body field first, bearer header as fallback)
/// into a live session, or fail with a single generic 401.
pub(super) async fn resolve_session(
    pool: &PgPool,
    headers: &HeaderMap,
    body_token: Option<&str>,
) -> Result<SessionRecord, AuthError> {
    let token = body_token
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .or_else(|| extract_bearer_token(headers));
    let Some(token) = token else {
        return Err(AuthError::unauthorized("Missing session token"));
    };
    let session = lookup_session(pool, &hash_session_token(&token)).await?;
    session.ok_or_else(|| AuthError::unauthorized("Invalid or expired session"))
}

pub(super) async fn load_user(pool: &PgPool, session: &SessionRecord) -> Result<UserRecord, AuthError> {
    lookup_user_by_id(pool, session.user_id)
        .await?
        .ok_or_else(|| AuthError::unauthorized("Invalid or expired session"))
}

/// Describe the account behind a session token. A missing, expired, or
/// revoked session is not an error; it answers 204 so clients can probe
/// without handling failures.
#[utoipa::path(
    get,
    path = "/v1/auth/session",
    security(("bearer_token" = [])),
    responses(
        (status = 200, description = "Active session", body = SessionResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    _auth_state: Extension<Arc<AuthState>>,
) -> Result<Response, AuthError> {
    let Some(token) = extract_bearer_token(&headers) else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };
    let Some(record) = lookup_session(&pool, &hash_session_token(&token)).await? else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };
    let Some(user) = lookup_user_by_id(&pool, record.user_id).await? else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };
    let roles = load_roles(&pool, user.user_id).await?;
    let two_factor_enabled = mfa::storage::two_factor_enabled(&pool, user.user_id).await?;

    Ok(Json(SessionResponse {
        user: summarize(&user, roles),
        expires_at: record.expires_at_unix,
        two_factor_enabled,
    })
    .into_response())
}

/// Revoke the presented session token. Idempotent.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    security(("bearer_token" = [])),
    responses(
        (status = 204, description = "Session revoked"),
        (status = 401, description = "Missing session token", body = super::error::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, pool: Extension<PgPool>) -> Result<StatusCode, AuthError> {
    let Some(token) = extract_bearer_token(&headers) else {
        return Err(AuthError::unauthorized("Missing session token"));
    };
    delete_session(&pool, &hash_session_token(&token)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::super::storage::UserRecord;
    use super::{logout, resolve_session, summarize};
    use crate::api::handlers::auth::error::AuthError;
    use anyhow::Result;
    use axum::http::{HeaderMap, HeaderValue};
    use sqlx::postgres::PgPoolOptions;
    use uuid::Uuid;

    #[test]
    fn summarize_copies_fields() {
        let user = UserRecord {
            user_id: Uuid::nil(),
            mobile_number: "5551234567".to_string(),
            country_code: "+1".to_string(),
            email: Some("alice@example.com".to_string()),
            password_hash: "$argon2id$...".to_string(),
            full_name: "Alice Example".to_string(),
            is_verified: true,
            is_active: true,
        };
        let summary = summarize(&user, vec!["user".to_string()]);
        assert_eq!(summary.mobile_number, "5551234567");
        assert_eq!(summary.roles, vec!["user".to_string()]);
        assert!(summary.is_verified);
    }

    #[tokio::test]
    async fn resolve_session_requires_a_token() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let result = resolve_session(&pool, &HeaderMap::new(), None).await;
        assert!(matches!(result, Err(AuthError::Unauthorized(_))));

        let result = resolve_session(&pool, &HeaderMap::new(), Some("  ")).await;
        assert!(matches!(result, Err(AuthError::Unauthorized(_))));
        Ok(())
    }

    #[tokio::test]
    async fn resolve_session_prefers_body_token_over_header() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer header-token"),
        );
        // Both paths hit the database; a lazy pool fails with Dependency, which
        // proves the token made it past extraction.
        let result = resolve_session(&pool, &headers, Some("body-token")).await;
        assert!(matches!(result, Err(AuthError::Dependency(_))));
        Ok(())
    }

    #[tokio::test]
    async fn session_without_token_is_no_content() -> Result<()> {
        use super::super::state::{AuthConfig, AuthState};
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = std::sync::Arc::new(AuthState::new(AuthConfig::new("Sesamo")));
        let response = super::session(
            HeaderMap::new(),
            axum::extract::Extension(pool),
            axum::extract::Extension(state),
        )
        .await
        .map_err(|err| anyhow::anyhow!("{err:?}"))?;
        assert_eq!(response.status(), axum::http::StatusCode::NO_CONTENT);
        Ok(())
    }

    #[tokio::test]
    async fn logout_missing_token() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let result = logout(HeaderMap::new(), axum::extract::Extension(pool)).await;
        assert!(matches!(result, Err(AuthError::Unauthorized(_))));
        Ok(())
    }
}

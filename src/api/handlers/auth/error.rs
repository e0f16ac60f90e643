//! Closed error taxonomy for the auth handlers.
//!
//! Every failure a handler can surface is one of these kinds; the boundary
//! maps each kind to a status code and a small JSON body carrying both a
//! machine-readable `kind` and a display message. Dependency failures keep
//! their detail in the server log only — unauthenticated callers get a
//! generic message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Account is not verified")]
    Unverified,
    #[error("{0}")]
    RateLimited(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Internal error")]
    Dependency(#[from] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) | Self::Unverified => "forbidden",
            Self::RateLimited(_) => "rate_limited",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Dependency(_) => "dependency",
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            // Duplicate users are reported as a plain client error, not 409.
            Self::Validation(_) | Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) | Self::Unverified => StatusCode::FORBIDDEN,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Dependency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
    #[serde(rename = "needsVerification", skip_serializing_if = "Option::is_none")]
    pub needs_verification: Option<bool>,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let Self::Dependency(err) = &self {
            // Full detail stays server-side.
            error!("auth dependency failure: {err:#}");
        }
        let body = ErrorBody {
            kind: self.kind().to_string(),
            message: self.to_string(),
            needs_verification: matches!(self, Self::Unverified).then_some(true),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn kinds_map_to_statuses() {
        assert_eq!(
            AuthError::validation("bad").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::unauthorized("nope").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::Forbidden("inactive".to_string()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AuthError::Unverified.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::RateLimited("slow down".to_string()).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AuthError::NotFound("who".to_string()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AuthError::Conflict("dup".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::Dependency(anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn dependency_message_is_generic() {
        let err = AuthError::Dependency(anyhow!("connection refused to 10.0.0.1:5432"));
        assert_eq!(err.to_string(), "Internal error");
        assert_eq!(err.kind(), "dependency");
    }

    #[test]
    fn unverified_flags_needs_verification() {
        let response = AuthError::Unverified.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}

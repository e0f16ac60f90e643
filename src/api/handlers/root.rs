use axum::response::IntoResponse;

use crate::APP_USER_AGENT;

/// Undocumented landing route; useful as a liveness poke.
pub async fn root() -> impl IntoResponse {
    APP_USER_AGENT
}

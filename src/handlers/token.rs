//! Video credential endpoint.
//!
//! `POST /api/stream/token` mints a short-lived token for the signed-in
//! caller. The route sits under `/api`, so it is rate limited by the gate but
//! not auth-gated there; the handler answers 401 itself when no session is
//! present.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use tracing::instrument;

use crate::error::AppResult;
use crate::models::TokenResponse;
use crate::state::AppState;

/// Issue a video SDK token.
///
/// # Response Body
///
/// ```json
/// { "token": "eyJhbGciOi...", "expiresAt": "2024-01-15T11:30:00Z" }
/// ```
#[instrument(skip_all)]
pub async fn issue_stream_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<TokenResponse>> {
    let issued = state.tokens.issue_token(&headers).await?;

    Ok(Json(TokenResponse {
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

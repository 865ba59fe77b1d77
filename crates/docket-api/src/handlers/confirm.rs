//! Public confirmation gateway handlers.
//!
//! These two endpoints are unauthenticated: the emailed token is the only
//! credential a recipient has. Every failure mode (unknown token, token
//! not yet live, token already consumed) answers with the same message so
//! an unauthenticated caller learns nothing about internal state.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use crate::{ApiError, AppState};
use docket_core::{ConfirmationRepository, ConfirmRequest, Error};

const INVALID_TOKEN_MESSAGE: &str = "confirmation link is invalid or expired";

/// Resolve a confirmation token into its reminder, record, and recipient.
///
/// # Returns
/// - 200 OK with the confirmation context while the token is live
/// - 404 Not Found with a generic message otherwise
pub async fn resolve_confirmation(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match state.db.confirmations.resolve_token(&token).await? {
        Some(context) => Ok(Json(context)),
        None => Err(ApiError::NotFound(INVALID_TOKEN_MESSAGE.to_string())),
    }
}

/// Submit a confirmation against a token.
///
/// Exactly-once: the first valid submission consumes the token; any repeat
/// gets the same generic 404 as an unknown token.
///
/// # Returns
/// - 200 OK with `{"success": true}`
/// - 400 Bad Request on missing confirmed_by/confirmed_email
/// - 404 Not Found with a generic message for unusable tokens
pub async fn submit_confirmation(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<ConfirmRequest>,
) -> Result<impl IntoResponse, ApiError> {
    match state.db.confirmations.confirm(&token, req).await {
        Ok(_) => Ok(Json(serde_json::json!({ "success": true }))),
        Err(Error::NotFound(_)) => Err(ApiError::NotFound(INVALID_TOKEN_MESSAGE.to_string())),
        Err(e) => Err(e.into()),
    }
}

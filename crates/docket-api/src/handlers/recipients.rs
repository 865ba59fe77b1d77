//! Recipient registry HTTP handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{ApiError, AppState, RequireAuth};
use docket_core::{CreateRecipientRequest, RecipientRepository};

/// List a record's recipients, ordered by creation.
///
/// # Returns
/// - 200 OK with the recipient array (removed recipients excluded)
/// - 404 Not Found if the record does not exist
pub async fn list_recipients(
    _auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let recipients = state.db.recipients.list_for_record(id).await?;
    Ok(Json(recipients))
}

/// Add a recipient to a record.
///
/// # Returns
/// - 201 Created with `{"id": ...}`
/// - 400 Bad Request on missing email/name or ambiguous provenance
/// - 404 Not Found if the record does not exist
pub async fn add_recipient(
    _auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateRecipientRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let recipient_id = state.db.recipients.add(id, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": recipient_id })),
    ))
}

/// Remove a recipient.
///
/// Idempotent: removing an already-removed or unknown recipient also
/// returns 204. Pending reminders for the recipient stop being dispatched.
pub async fn remove_recipient(
    _auth: RequireAuth,
    State(state): State<AppState>,
    Path(recipient_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.recipients.remove(recipient_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

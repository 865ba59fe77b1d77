//! Reminder scheduling and dispatch HTTP handlers.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{ApiError, AppState, RequireAuth};
use docket_core::ReminderRepository;

/// (Re)schedule reminders for a record's current due-date cycle.
///
/// Idempotent per (record, recipient, milestone, cycle); repeated calls
/// report `{"scheduled": 0}` rather than duplicating.
///
/// # Returns
/// - 200 OK with `{"scheduled": n}`
/// - 404 Not Found if the record does not exist or has no recipients
pub async fn schedule_reminders(
    _auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let scheduled = state.db.reminders.schedule_for_record(id).await?;
    Ok(Json(serde_json::json!({ "scheduled": scheduled })))
}

/// List a record's reminders. Token values are never serialized.
pub async fn list_reminders(
    _auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let reminders = state.db.reminders.list_for_record(id).await?;
    Ok(Json(reminders))
}

/// Run one dispatch pass immediately (operational/testing trigger).
///
/// The background loop keeps running either way; this just borrows it.
pub async fn send_reminders(
    _auth: RequireAuth,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state.dispatcher.run_once().await?;
    Ok(Json(summary))
}

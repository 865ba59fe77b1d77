//! Compliance record HTTP handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiError, AppState, ListResponse, RequireAuth};
use docket_core::defaults::{MAX_PAGE_LIMIT, PAGE_LIMIT};
use docket_core::{CreateRecordRequest, RecordRepository};

/// Query parameters for listing records.
#[derive(Debug, Deserialize)]
pub struct ListRecordsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Create a compliance record.
///
/// # Returns
/// - 201 Created with `{"id": ...}`
/// - 400 Bad Request on empty name
pub async fn create_record(
    _auth: RequireAuth,
    State(state): State<AppState>,
    Json(req): Json<CreateRecordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state.db.records.create(req).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// List compliance records, newest first, with pagination metadata.
pub async fn list_records(
    _auth: RequireAuth,
    State(state): State<AppState>,
    Query(query): Query<ListRecordsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);

    let records = state.db.records.list(limit, offset).await?;
    let total = state.db.records.count().await?;

    Ok(Json(ListResponse::new(
        records,
        total as usize,
        limit as usize,
        offset as usize,
    )))
}

/// Fetch one compliance record.
pub async fn get_record(
    _auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .db
        .records
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("compliance record {} not found", id)))?;
    Ok(Json(record))
}

//! Audit log endpoints
//!
//! - POST /audit/log: append one event
//! - GET /audit/logs: list records matching every supplied filter
//! - GET /audit/verify: recompute the hash chain

use axum::{
    extract::{Query, State},
    Json,
};
use cdss_common::api::{ApiError, ApiJson, ApiResult};
use cdss_common::audit::AuditEvent;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::{AuditRecord, ChainReport, LogFilter};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateLogResponse {
    pub message: String,
    pub log_id: i64,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GetLogsResponse {
    pub message: String,
    pub logs: Vec<AuditRecord>,
}

/// POST /audit/log
pub async fn create_log(
    State(state): State<AppState>,
    ApiJson(event): ApiJson<AuditEvent>,
) -> ApiResult<Json<CreateLogResponse>> {
    if event.service.trim().is_empty() {
        return Err(ApiError::Validation("service is required".to_string()));
    }
    if event.event.trim().is_empty() {
        return Err(ApiError::Validation("event is required".to_string()));
    }

    let record = state.store.append(&event).await?;
    debug!("Audit record {} from {}: {}", record.id, record.service, record.event);

    Ok(Json(CreateLogResponse {
        message: "Log created successfully".to_string(),
        log_id: record.id,
        created_at: record.created_at,
    }))
}

/// GET /audit/logs
pub async fn get_logs(
    State(state): State<AppState>,
    Query(filter): Query<LogFilter>,
) -> ApiResult<Json<GetLogsResponse>> {
    let logs = state.store.list(&filter).await?;

    Ok(Json(GetLogsResponse {
        message: "Logs retrieved successfully".to_string(),
        logs,
    }))
}

/// GET /audit/verify
pub async fn verify_chain(State(state): State<AppState>) -> ApiResult<Json<ChainReport>> {
    Ok(Json(state.store.verify().await?))
}

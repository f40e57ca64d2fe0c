//! Preprocessing endpoints
//!
//! - POST /data_processing/process
//! - GET /data_processing/retrieve/:id

use axum::{
    extract::{Path, State},
    Json,
};
use cdss_common::api::{ApiJson, ApiResult, ProcessRequest, ProcessResponse, RetrieveResponse};

use crate::AppState;

pub async fn process(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ProcessRequest>,
) -> ApiResult<Json<ProcessResponse>> {
    let artifact_id = state.service.process(request).await?;

    Ok(Json(ProcessResponse {
        message: "Processed data saved successfully".to_string(),
        artifact_id,
    }))
}

pub async fn retrieve(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<RetrieveResponse>> {
    let artifact = state.service.retrieve(id).await?;

    Ok(Json(RetrieveResponse {
        message: "Processed data retrieved successfully".to_string(),
        artifact,
    }))
}

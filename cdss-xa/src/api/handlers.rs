//! Analysis endpoints
//!
//! - POST /explainable_ai/analyse
//! - GET /explainable_ai/reports/:account_id?patient_hashed_id=

use axum::{
    extract::{Path, Query, State},
    Json,
};
use cdss_common::api::{
    AnalysisRequest, ApiJson, ApiResult, ReportResponse, ReportsQuery, ReportsResponse,
};

use crate::AppState;

pub async fn analyse(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AnalysisRequest>,
) -> ApiResult<Json<ReportResponse>> {
    let report = state.service.analyse(request).await?;

    Ok(Json(ReportResponse {
        message: "Analysis completed successfully".to_string(),
        report,
    }))
}

pub async fn reports(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    Query(query): Query<ReportsQuery>,
) -> ApiResult<Json<ReportsResponse>> {
    let reports = state
        .service
        .reports(account_id, query.patient_hashed_id.as_deref())
        .await?;

    let message = if reports.is_empty() {
        "No reports retrieved"
    } else {
        "Reports retrieved successfully"
    };

    Ok(Json(ReportsResponse {
        message: message.to_string(),
        reports,
    }))
}

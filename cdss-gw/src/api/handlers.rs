//! Gateway endpoints
//!
//! - POST /gateway/register
//! - POST /gateway/login
//! - POST /gateway/analyse (bearer token)
//! - GET /gateway/reports?patient_hashed_id= (bearer token)

use axum::{
    extract::{Query, State},
    Json,
};
use cdss_common::api::{
    ApiJson, ApiResult, GatewayAnalyseRequest, LoginRequest, LoginResponse, RegisterRequest,
    RegisterResponse, ReportResponse, ReportsQuery, ReportsResponse,
};

use crate::auth::BearerToken;
use crate::AppState;

pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<Json<RegisterResponse>> {
    Ok(Json(state.gateway.register(request).await?))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    Ok(Json(state.gateway.login(request).await?))
}

pub async fn analyse(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    ApiJson(request): ApiJson<GatewayAnalyseRequest>,
) -> ApiResult<Json<ReportResponse>> {
    let report = state.gateway.analyse(&token, request).await?;

    Ok(Json(ReportResponse {
        message: "Analysis completed successfully".to_string(),
        report,
    }))
}

pub async fn reports(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
    Query(query): Query<ReportsQuery>,
) -> ApiResult<Json<ReportsResponse>> {
    let reports = state
        .gateway
        .reports(&token, query.patient_hashed_id.as_deref())
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

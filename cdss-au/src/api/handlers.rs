//! Authentication endpoints
//!
//! - POST /authentication/register
//! - POST /authentication/login
//! - POST /authentication/validate

use axum::{extract::State, Json};
use cdss_common::api::{
    ApiJson, ApiResult, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
    ValidateRequest, ValidateResponse,
};

use crate::AppState;

pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<Json<RegisterResponse>> {
    let account_id = state.service.register(request).await?;

    Ok(Json(RegisterResponse {
        message: "Account registered successfully".to_string(),
        account_id,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let outcome = state.service.authenticate(request).await?;

    Ok(Json(LoginResponse {
        message: "Logged in successfully".to_string(),
        token: outcome.token.token,
        expires_at: outcome.token.expires_at,
        account: outcome.account,
    }))
}

pub async fn validate(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ValidateRequest>,
) -> ApiResult<Json<ValidateResponse>> {
    let account_id = state.service.validate(&request.token).await?;

    Ok(Json(ValidateResponse {
        message: "Token validated successfully".to_string(),
        account_id,
    }))
}

//! Request orchestration
//!
//! The gateway holds no state between requests. `analyse` runs token
//! validation, preprocessing and analysis strictly in sequence and returns
//! either the report or the error of the first step that failed.

use crate::clients::{Analyzer, Preprocessor, TokenAuthority};
use cdss_common::api::{
    AnalysisRequest, ApiError, ApiResult, GatewayAnalyseRequest, LoginRequest, LoginResponse,
    ProcessRequest, RegisterRequest, RegisterResponse, ReportView,
};
use cdss_common::http::UpstreamError;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Gateway {
    authority: Arc<dyn TokenAuthority>,
    preprocessor: Arc<dyn Preprocessor>,
    analyzer: Arc<dyn Analyzer>,
}

impl Gateway {
    pub fn new(
        authority: Arc<dyn TokenAuthority>,
        preprocessor: Arc<dyn Preprocessor>,
        analyzer: Arc<dyn Analyzer>,
    ) -> Self {
        Self {
            authority,
            preprocessor,
            analyzer,
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> ApiResult<RegisterResponse> {
        let request = request.normalized()?;
        Ok(self.authority.register(&request).await?)
    }

    pub async fn login(&self, request: LoginRequest) -> ApiResult<LoginResponse> {
        let request = request.normalized()?;
        Ok(self.authority.login(&request).await?)
    }

    /// Resolve the bearer token to an account id
    ///
    /// A rejection by the authority becomes an authentication failure; an
    /// authority that cannot be reached stays an upstream failure.
    pub async fn authenticate(&self, token: &str) -> ApiResult<i64> {
        match self.authority.validate(token).await {
            Ok(account_id) => Ok(account_id),
            Err(UpstreamError::Rejected {
                status: 401,
                message,
                ..
            }) => Err(ApiError::Authentication(message)),
            Err(e) => {
                warn!("Token validation failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Preprocess the raw data and analyse the resulting artifact
    pub async fn analyse(&self, token: &str, request: GatewayAnalyseRequest) -> ApiResult<ReportView> {
        let account_id = self.authenticate(token).await?;
        request.validate()?;

        let strategy = request.strategy.trim().to_string();
        let artifact_id = self
            .preprocessor
            .process(&ProcessRequest {
                strategy: strategy.clone(),
                raw_data: request.raw_data,
            })
            .await?;
        debug!("Account {} artifact {} ready for '{}'", account_id, artifact_id, strategy);

        let report = self
            .analyzer
            .analyse(&AnalysisRequest {
                account_id,
                patient_hashed_id: request.patient_hashed_id.trim().to_string(),
                strategy,
                artifact_id,
            })
            .await?;
        info!(
            "Report {} for account {} ({} → {})",
            report.id, account_id, report.strategy, report.diagnosis
        );

        Ok(report)
    }

    /// Reports of the token's account, optionally for one patient
    pub async fn reports(&self, token: &str, patient_hashed_id: Option<&str>) -> ApiResult<Vec<ReportView>> {
        let account_id = self.authenticate(token).await?;
        let patient = patient_hashed_id.map(str::trim).filter(|p| !p.is_empty());
        Ok(self.analyzer.reports(account_id, patient).await?)
    }
}

//! Analysis dispatch and report queries
//!
//! `analyse` resolves the strategy before touching the artifact, so an
//! unknown tag is reported regardless of the payload. A strategy that
//! cannot produce a result still yields a stored (degraded) report.

use crate::artifacts::ArtifactSource;
use crate::db::{NewReport, ReportStore};
use crate::strategy::{AnalysisResult, StrategyRegistry};
use cdss_common::api::{validate_patient_hash, AnalysisRequest, ApiError, ApiResult, ReportView};
use cdss_common::audit::{AuditEvent, AuditSubject};
use cdss_common::payload::CanonicalPayload;
use std::sync::Arc;
use tracing::{error, info, warn};

const SERVICE: &str = "explainable_ai";

pub struct AnalysisService {
    registry: StrategyRegistry,
    artifacts: Arc<dyn ArtifactSource>,
    reports: ReportStore,
    audit: AuditSubject,
}

impl AnalysisService {
    pub fn new(
        registry: StrategyRegistry,
        artifacts: Arc<dyn ArtifactSource>,
        reports: ReportStore,
        audit: AuditSubject,
    ) -> Self {
        Self {
            registry,
            artifacts,
            reports,
            audit,
        }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Run the strategy for an artifact and store the report
    pub async fn analyse(&self, request: AnalysisRequest) -> ApiResult<ReportView> {
        let strategy = self.registry.resolve(&request.strategy).await?;
        validate_patient_hash(&request.patient_hashed_id)?;

        let artifact = self.artifacts.fetch(request.artifact_id).await?;
        if artifact.tag != request.strategy {
            return Err(ApiError::Validation(format!(
                "artifact {} was processed as '{}', not '{}'",
                artifact.id, artifact.tag, request.strategy
            )));
        }

        let payload = CanonicalPayload::decode(&artifact.payload).map_err(|e| {
            error!("Artifact {} payload unreadable: {}", artifact.id, e);
            ApiError::Internal(format!("artifact {} payload is unreadable", artifact.id))
        })?;

        let result = match strategy.analyse(&artifact.tag, &payload).await {
            Ok(result) => result,
            Err(failure) => {
                warn!("Strategy '{}' degraded: {}", request.strategy, failure);
                AnalysisResult::degraded(&failure)
            }
        };

        let report = self
            .reports
            .insert(&NewReport {
                account_id: request.account_id,
                patient_hashed_id: &request.patient_hashed_id,
                artifact_id: artifact.id,
                strategy: &request.strategy,
                diagnosis: &result.diagnosis,
                confidence: result.confidence,
                explanation: &result.explanation,
            })
            .await?;
        info!(
            "Report {} stored ({} → {}, confidence {:.3})",
            report.id, report.strategy, report.diagnosis, report.confidence
        );

        self.audit
            .notify(
                AuditEvent::new(SERVICE, "analysis_completed", "Report saved")
                    .with_report(report.id)
                    .with_artifact(artifact.id)
                    .with_account(request.account_id)
                    .with_patient(&request.patient_hashed_id),
            )
            .await;

        Ok(report)
    }

    /// Reports of an account, optionally for one patient
    pub async fn reports(
        &self,
        account_id: i64,
        patient_hashed_id: Option<&str>,
    ) -> ApiResult<Vec<ReportView>> {
        let patient = patient_hashed_id.map(str::trim).filter(|p| !p.is_empty());
        let reports = self.reports.find(account_id, patient).await?;

        let event = match patient {
            Some(patient) => AuditEvent::new(SERVICE, "reports_patient", "Reports viewed for a patient")
                .with_account(account_id)
                .with_patient(patient),
            None => AuditEvent::new(SERVICE, "reports_all", "Reports viewed").with_account(account_id),
        };
        self.audit.notify(event).await;

        Ok(reports)
    }
}

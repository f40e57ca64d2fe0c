//! Report storage

use cdss_common::api::ReportView;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::info;

#[derive(Debug, Clone, sqlx::FromRow)]
struct ReportRow {
    id: i64,
    account_id: i64,
    patient_hashed_id: String,
    artifact_id: i64,
    strategy: String,
    diagnosis: String,
    confidence: f64,
    explanation: String,
    created_at: DateTime<Utc>,
}

impl From<ReportRow> for ReportView {
    fn from(row: ReportRow) -> Self {
        ReportView {
            id: row.id,
            account_id: row.account_id,
            patient_hashed_id: row.patient_hashed_id,
            artifact_id: row.artifact_id,
            strategy: row.strategy,
            diagnosis: row.diagnosis,
            confidence: row.confidence,
            explanation: row.explanation,
            created_at: row.created_at,
        }
    }
}

/// Fields of a report about to be stored
#[derive(Debug, Clone)]
pub struct NewReport<'a> {
    pub account_id: i64,
    pub patient_hashed_id: &'a str,
    pub artifact_id: i64,
    pub strategy: &'a str,
    pub diagnosis: &'a str,
    pub confidence: f64,
    pub explanation: &'a str,
}

#[derive(Debug, Clone)]
pub struct ReportStore {
    pool: SqlitePool,
}

impl ReportStore {
    /// Wrap a pool, creating the table if needed
    pub async fn new(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        create_tables(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn insert(&self, report: &NewReport<'_>) -> Result<ReportView, sqlx::Error> {
        let created_at = Utc::now();
        let id = sqlx::query(
            r#"
            INSERT INTO reports (
                account_id, patient_hashed_id, artifact_id, strategy,
                diagnosis, confidence, explanation, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(report.account_id)
        .bind(report.patient_hashed_id)
        .bind(report.artifact_id)
        .bind(report.strategy)
        .bind(report.diagnosis)
        .bind(report.confidence)
        .bind(report.explanation)
        .bind(created_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(ReportView {
            id,
            account_id: report.account_id,
            patient_hashed_id: report.patient_hashed_id.to_string(),
            artifact_id: report.artifact_id,
            strategy: report.strategy.to_string(),
            diagnosis: report.diagnosis.to_string(),
            confidence: report.confidence,
            explanation: report.explanation.to_string(),
            created_at,
        })
    }

    pub async fn get(&self, id: i64) -> Result<Option<ReportView>, sqlx::Error> {
        let row: Option<ReportRow> = sqlx::query_as("SELECT * FROM reports WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ReportView::from))
    }

    /// Reports of `account_id`, narrowed to one patient when given; oldest first
    pub async fn find(
        &self,
        account_id: i64,
        patient_hashed_id: Option<&str>,
    ) -> Result<Vec<ReportView>, sqlx::Error> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM reports WHERE account_id = ");
        query.push_bind(account_id);
        if let Some(patient) = patient_hashed_id {
            query.push(" AND patient_hashed_id = ").push_bind(patient);
        }
        query.push(" ORDER BY id ASC");

        let rows: Vec<ReportRow> = query.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(ReportView::from).collect())
    }
}

pub async fn create_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id INTEGER NOT NULL,
            patient_hashed_id TEXT NOT NULL,
            artifact_id INTEGER NOT NULL,
            strategy TEXT NOT NULL,
            diagnosis TEXT NOT NULL,
            confidence REAL NOT NULL CHECK (confidence >= 0.0 AND confidence <= 1.0),
            explanation TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_reports_account_patient ON reports(account_id, patient_hashed_id)")
        .execute(pool)
        .await?;

    info!("Report tables ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdss_common::db::connect_in_memory;

    fn report<'a>(account_id: i64, patient: &'a str) -> NewReport<'a> {
        NewReport {
            account_id,
            patient_hashed_id: patient,
            artifact_id: 1,
            strategy: "numeric",
            diagnosis: "Low",
            confidence: 0.2,
            explanation: "[]",
        }
    }

    #[tokio::test]
    async fn test_find_and_semantics() {
        let store = ReportStore::new(connect_in_memory().await.unwrap()).await.unwrap();
        store.insert(&report(1, "p1")).await.unwrap();
        store.insert(&report(1, "p2")).await.unwrap();
        store.insert(&report(2, "p1")).await.unwrap();

        assert_eq!(store.find(1, None).await.unwrap().len(), 2);

        let narrowed = store.find(1, Some("p1")).await.unwrap();
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].account_id, 1);
        assert_eq!(narrowed[0].patient_hashed_id, "p1");

        assert!(store.find(3, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_round_trip() {
        let store = ReportStore::new(connect_in_memory().await.unwrap()).await.unwrap();
        let stored = store.insert(&report(1, "p1")).await.unwrap();
        let loaded = store.get(stored.id).await.unwrap().unwrap();
        assert_eq!(loaded.diagnosis, "Low");
        assert_eq!(loaded.confidence, 0.2);
    }

    #[tokio::test]
    async fn test_out_of_range_confidence_rejected_by_schema() {
        let store = ReportStore::new(connect_in_memory().await.unwrap()).await.unwrap();
        let mut bad = report(1, "p1");
        bad.confidence = 1.5;
        assert!(store.insert(&bad).await.is_err());
    }
}

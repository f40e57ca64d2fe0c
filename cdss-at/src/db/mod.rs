//! Audit record storage
//!
//! Records are append-only. Each record stores the hash of its predecessor
//! and its own hash over `previous_hash + canonical(event fields, created_at)`,
//! so editing or deleting a stored row breaks every later link.

use cdss_common::audit::AuditEvent;
use cdss_common::canonical::{chain_hash, GENESIS_HASH};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// One stored audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditRecord {
    pub id: i64,
    pub service: String,
    pub event: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_hashed_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<i64>,
    /// RFC 3339, microsecond precision; hashed exactly as stored
    pub created_at: String,
    pub previous_hash: String,
    pub entry_hash: String,
}

impl AuditRecord {
    fn event(&self) -> AuditEvent {
        AuditEvent {
            service: self.service.clone(),
            event: self.event.clone(),
            description: self.description.clone(),
            account_id: self.account_id,
            patient_hashed_id: self.patient_hashed_id.clone(),
            report_id: self.report_id,
            artifact_id: self.artifact_id,
        }
    }
}

/// Equality filters for record listing; absent fields match everything
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogFilter {
    pub service: Option<String>,
    pub event: Option<String>,
    pub account_id: Option<i64>,
    pub patient_hashed_id: Option<String>,
    pub report_id: Option<i64>,
    pub artifact_id: Option<i64>,
}

/// Result of walking the hash chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainReport {
    pub valid: bool,
    pub checked: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_broken_id: Option<i64>,
}

/// Value covered by `entry_hash`
fn hashed_content(event: &AuditEvent, created_at: &str) -> Value {
    let mut value = serde_json::to_value(event).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert("created_at".to_string(), Value::String(created_at.to_string()));
    }
    value
}

/// Append-only audit store
pub struct AuditStore {
    pool: SqlitePool,
    // Serializes read-last-hash + insert so the chain never forks
    append_lock: Mutex<()>,
}

impl AuditStore {
    /// Wrap a pool, creating the table if needed
    pub async fn new(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        create_tables(&pool).await?;
        Ok(Self {
            pool,
            append_lock: Mutex::new(()),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Append one event, extending the chain
    pub async fn append(&self, event: &AuditEvent) -> Result<AuditRecord, sqlx::Error> {
        let _guard = self.append_lock.lock().await;

        let previous_hash: String =
            sqlx::query_scalar("SELECT entry_hash FROM audit_logs ORDER BY id DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?
                .unwrap_or_else(|| GENESIS_HASH.to_string());

        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let entry_hash = chain_hash(&previous_hash, &hashed_content(event, &created_at));

        let id = sqlx::query(
            r#"
            INSERT INTO audit_logs (
                service, event, description, account_id, patient_hashed_id,
                report_id, artifact_id, created_at, previous_hash, entry_hash
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.service)
        .bind(&event.event)
        .bind(&event.description)
        .bind(event.account_id)
        .bind(&event.patient_hashed_id)
        .bind(event.report_id)
        .bind(event.artifact_id)
        .bind(&created_at)
        .bind(&previous_hash)
        .bind(&entry_hash)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(AuditRecord {
            id,
            service: event.service.clone(),
            event: event.event.clone(),
            description: event.description.clone(),
            account_id: event.account_id,
            patient_hashed_id: event.patient_hashed_id.clone(),
            report_id: event.report_id,
            artifact_id: event.artifact_id,
            created_at,
            previous_hash,
            entry_hash,
        })
    }

    /// Records matching every supplied filter, oldest first
    pub async fn list(&self, filter: &LogFilter) -> Result<Vec<AuditRecord>, sqlx::Error> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM audit_logs WHERE 1 = 1");

        if let Some(service) = &filter.service {
            query.push(" AND service = ").push_bind(service);
        }
        if let Some(event) = &filter.event {
            query.push(" AND event = ").push_bind(event);
        }
        if let Some(account_id) = filter.account_id {
            query.push(" AND account_id = ").push_bind(account_id);
        }
        if let Some(patient) = &filter.patient_hashed_id {
            query.push(" AND patient_hashed_id = ").push_bind(patient);
        }
        if let Some(report_id) = filter.report_id {
            query.push(" AND report_id = ").push_bind(report_id);
        }
        if let Some(artifact_id) = filter.artifact_id {
            query.push(" AND artifact_id = ").push_bind(artifact_id);
        }
        query.push(" ORDER BY id ASC");

        query.build_query_as::<AuditRecord>().fetch_all(&self.pool).await
    }

    /// Recompute every link of the chain
    pub async fn verify(&self) -> Result<ChainReport, sqlx::Error> {
        let records: Vec<AuditRecord> = sqlx::query_as("SELECT * FROM audit_logs ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut expected_previous = GENESIS_HASH.to_string();
        let mut checked = 0;

        for record in &records {
            checked += 1;
            let recomputed = chain_hash(
                &record.previous_hash,
                &hashed_content(&record.event(), &record.created_at),
            );

            if record.previous_hash != expected_previous || recomputed != record.entry_hash {
                warn!("Audit chain broken at record {}", record.id);
                return Ok(ChainReport {
                    valid: false,
                    checked,
                    first_broken_id: Some(record.id),
                });
            }
            expected_previous = record.entry_hash.clone();
        }

        Ok(ChainReport {
            valid: true,
            checked,
            first_broken_id: None,
        })
    }
}

/// Create the audit table and its lookup indexes
pub async fn create_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            service TEXT NOT NULL,
            event TEXT NOT NULL,
            description TEXT NOT NULL,
            account_id INTEGER,
            patient_hashed_id TEXT,
            report_id INTEGER,
            artifact_id INTEGER,
            created_at TEXT NOT NULL,
            previous_hash TEXT NOT NULL,
            entry_hash TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_logs_account ON audit_logs(account_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_logs_patient ON audit_logs(patient_hashed_id)")
        .execute(pool)
        .await?;

    info!("Audit tables ready");
    Ok(())
}

//! Processed artifact storage

use cdss_common::api::ArtifactView;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;

#[derive(Debug, Clone, sqlx::FromRow)]
struct ArtifactRow {
    id: i64,
    tag: String,
    payload: String,
    created_at: DateTime<Utc>,
}

impl From<ArtifactRow> for ArtifactView {
    fn from(row: ArtifactRow) -> Self {
        ArtifactView {
            id: row.id,
            tag: row.tag,
            payload: row.payload,
            created_at: row.created_at,
        }
    }
}

/// Immutable store of canonical payloads
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    pool: SqlitePool,
}

impl ArtifactStore {
    /// Wrap a pool, creating the table if needed
    pub async fn new(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        create_tables(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn insert(&self, tag: &str, payload: &str) -> Result<ArtifactView, sqlx::Error> {
        let created_at = Utc::now();
        let id = sqlx::query("INSERT INTO artifacts (tag, payload, created_at) VALUES (?, ?, ?)")
            .bind(tag)
            .bind(payload)
            .bind(created_at)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        Ok(ArtifactView {
            id,
            tag: tag.to_string(),
            payload: payload.to_string(),
            created_at,
        })
    }

    pub async fn get(&self, id: i64) -> Result<Option<ArtifactView>, sqlx::Error> {
        let row: Option<ArtifactRow> = sqlx::query_as("SELECT * FROM artifacts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ArtifactView::from))
    }
}

pub async fn create_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artifacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tag TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("Artifact tables ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdss_common::db::connect_in_memory;

    #[tokio::test]
    async fn test_insert_then_get() {
        let store = ArtifactStore::new(connect_in_memory().await.unwrap()).await.unwrap();

        let stored = store.insert("text", r#"{"kind":"text","text":"a"}"#).await.unwrap();
        let loaded = store.get(stored.id).await.unwrap().unwrap();

        assert_eq!(loaded.tag, "text");
        assert_eq!(loaded.payload, stored.payload);
        assert!(store.get(stored.id + 1).await.unwrap().is_none());
    }
}

//! Account storage

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;

/// Registered account
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of an insert
#[derive(Debug)]
pub enum InsertOutcome {
    Created(i64),
    DuplicateEmail,
}

#[derive(Debug, Clone)]
pub struct AccountStore {
    pool: SqlitePool,
}

impl AccountStore {
    /// Wrap a pool, creating the table if needed
    pub async fn new(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        create_tables(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM accounts WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Insert a new account; the UNIQUE email constraint settles races
    pub async fn insert(
        &self,
        name: &str,
        surname: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<InsertOutcome, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO accounts (name, surname, email, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(surname)
        .bind(email)
        .bind(password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(InsertOutcome::Created(done.last_insert_rowid())),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Ok(InsertOutcome::DuplicateEmail)
            }
            Err(e) => Err(e),
        }
    }
}

pub async fn create_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            surname TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password_hash TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("Account tables ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdss_common::db::connect_in_memory;

    #[tokio::test]
    async fn test_ids_increase() {
        let store = AccountStore::new(connect_in_memory().await.unwrap()).await.unwrap();

        let a = store.insert("Ada", "Lovelace", "ada@example.org", "h").await.unwrap();
        let b = store.insert("Alan", "Turing", "alan@example.org", "h").await.unwrap();

        match (a, b) {
            (InsertOutcome::Created(a), InsertOutcome::Created(b)) => assert!(b > a),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_email_unique_ignoring_case() {
        let store = AccountStore::new(connect_in_memory().await.unwrap()).await.unwrap();

        store.insert("Ada", "Lovelace", "ada@example.org", "h").await.unwrap();
        let again = store.insert("Ada", "Byron", "ADA@example.org", "h").await.unwrap();
        assert!(matches!(again, InsertOutcome::DuplicateEmail));

        let found = store.find_by_email("Ada@Example.org").await.unwrap().unwrap();
        assert_eq!(found.surname, "Lovelace");
    }
}

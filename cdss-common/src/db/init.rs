//! Database initialization
//!
//! Every CDSS service owns one SQLite database file inside the root folder.
//! This module opens (or creates) it with the pragmas all services share and
//! provides the `settings` key-value table. Service-specific tables are
//! created by each service on top of the returned pool.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open or create a service database
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_settings_table(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database
///
/// A single connection is used because every `:memory:` connection is a
/// separate database.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    create_settings_table(&pool).await?;

    Ok(pool)
}

/// Create the settings table
///
/// Stores service configuration key-value pairs that must survive restarts
/// (e.g. the generated token signing secret).
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Read a setting value, `None` if the key is absent or NULL
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    Ok(value.flatten())
}

/// Insert a setting unless one already exists, returning the stored value
///
/// Uses INSERT OR IGNORE so that two services racing on first start agree on
/// a single value.
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<String> {
    sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?;

    match get_setting(pool, key).await? {
        Some(value) => Ok(value),
        None => {
            // Row existed with NULL value: reset it
            sqlx::query("UPDATE settings SET value = ?, updated_at = CURRENT_TIMESTAMP WHERE key = ?")
                .bind(default_value)
                .bind(key)
                .execute(pool)
                .await?;
            info!("Reset NULL setting '{}' to default", key);
            Ok(default_value.to_string())
        }
    }
}

/// Load a secret from settings, generating a random one on first use
///
/// The generated value is 32 random bytes, base64url encoded.
pub async fn load_or_init_secret(pool: &SqlitePool, key: &str) -> Result<String> {
    if let Some(existing) = get_setting(pool, key).await? {
        if !existing.is_empty() {
            return Ok(existing);
        }
    }

    let generated = generate_secret();
    let stored = ensure_setting(pool, key, &generated).await?;
    if stored == generated {
        info!("Generated new secret for '{}'", key);
    }
    Ok(stored)
}

/// 32 random bytes, base64url without padding
pub fn generate_secret() -> String {
    use base64::Engine;
    use rand::RngCore;

    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

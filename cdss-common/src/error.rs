//! Errors raised while bootstrapping a CDSS service
//!
//! Request-level failures use [`crate::api::ApiError`]; this type only covers
//! configuration loading, root folder setup and database initialization.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Root folder or database file could not be created
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or unparseable TOML file
    #[error("Configuration error: {0}")]
    Config(String),
}

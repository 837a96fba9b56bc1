#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Report and comment store for the pollution map.
//!
//! Backed by `SQLite` via `switchy_database`. Reports are inserted once by
//! the submission pipeline; all later mutation (status changes, comments)
//! goes through this crate too. Media bytes never land here — report and
//! comment rows only carry the public URLs the blob store returned.

pub mod queries;

use std::path::Path;

use switchy_database::Database;
use switchy_database_connection::init_sqlite_rusqlite;
use thiserror::Error;

/// Default path for the report store database.
pub const DEFAULT_DB_PATH: &str = "data/pollution.db";

/// Errors from report store operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// A database query or command failed.
    #[error("Database error: {0}")]
    Database(String),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A row held something we couldn't interpret.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Opens (or creates) the report store `SQLite` database and ensures the
/// schema exists.
///
/// # Errors
///
/// Returns [`DbError`] if the database cannot be opened or schema
/// creation fails.
pub async fn open_db(path: &Path) -> Result<Box<dyn Database>, DbError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db = init_sqlite_rusqlite(Some(path)).map_err(|e| DbError::Database(e.to_string()))?;

    ensure_schema(db.as_ref()).await?;

    Ok(db)
}

/// Creates all tables if they don't already exist.
///
/// # Errors
///
/// Returns [`DbError`] if any database operation fails.
pub async fn ensure_schema(db: &dyn Database) -> Result<(), DbError> {
    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            role        TEXT NOT NULL,
            created_at  TEXT NOT NULL
        )",
    )
    .await
    .map_err(|e| DbError::Database(e.to_string()))?;

    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS reports (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL,
            lat         REAL NOT NULL,
            lng         REAL NOT NULL,
            category    TEXT NOT NULL,
            description TEXT NOT NULL,
            media_urls  TEXT NOT NULL,
            status      TEXT NOT NULL,
            created_at  TEXT NOT NULL
        )",
    )
    .await
    .map_err(|e| DbError::Database(e.to_string()))?;

    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS comments (
            id          TEXT PRIMARY KEY,
            report_id   TEXT NOT NULL REFERENCES reports(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL,
            body        TEXT NOT NULL,
            media_urls  TEXT NOT NULL,
            created_at  TEXT NOT NULL
        )",
    )
    .await
    .map_err(|e| DbError::Database(e.to_string()))?;

    db.exec_raw(
        "CREATE INDEX IF NOT EXISTS idx_reports_status
         ON reports (status, created_at)",
    )
    .await
    .map_err(|e| DbError::Database(e.to_string()))?;

    db.exec_raw(
        "CREATE INDEX IF NOT EXISTS idx_comments_report
         ON comments (report_id, created_at)",
    )
    .await
    .map_err(|e| DbError::Database(e.to_string()))?;

    // Enable foreign key enforcement (SQLite has it off by default)
    db.exec_raw("PRAGMA foreign_keys = ON")
        .await
        .map_err(|e| DbError::Database(e.to_string()))?;

    Ok(())
}

// ABOUTME: Database connection management and schema migrations for the eSign portal
// ABOUTME: Owns the SQLite pool and shared row-decoding helpers used by the per-table modules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

//! # Database Management
//!
//! One [`Database`] value wraps the `SQLite` pool. Each table has its own
//! module contributing an `impl Database` block with its migration and
//! queries. Identifiers are stored as UUID text, timestamps as RFC 3339 text.

mod audit;
mod cases;
mod documents;
mod email_logs;
mod signatures;
mod users;

pub use cases::{CaseDetails, CaseFilter, CaseListItem, NewCase};
pub use documents::{DateFilter, HistoryEntry, HistoryQuery};
pub use users::{AgentWithUser, ClientProfile, NewAgent, NewUser};

use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Database manager for cases, documents, signatures, and logs
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Create a new database connection and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be opened or a migration fails
    pub async fn new(database_url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::config(format!("Invalid database URL: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);

        let is_memory = database_url.contains(":memory:");
        if !is_memory {
            if let Some(parent) = options.get_filename().parent() {
                ensure_directory(parent).await?;
            }
        }

        // Every in-memory connection is its own database, so keep exactly one alive
        let pool_options = if is_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to database: {e}")))?;

        let db = Self { pool };
        db.migrate().await?;
        info!(url = %database_url, "Database ready");

        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Run database migrations
    ///
    /// # Errors
    ///
    /// Returns an error if any table or index creation fails
    pub async fn migrate(&self) -> AppResult<()> {
        self.migrate_users().await?;
        self.migrate_cases().await?;
        self.migrate_documents().await?;
        self.migrate_signatures().await?;
        self.migrate_audit_logs().await?;
        self.migrate_email_logs().await?;
        debug!("Database migrations applied");
        Ok(())
    }

    /// Check that the database answers queries
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be reached
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Database ping failed: {e}")))?;
        Ok(())
    }
}

async fn ensure_directory(path: &Path) -> AppResult<()> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    tokio::fs::create_dir_all(path).await.map_err(|e| {
        AppError::database(format!(
            "Failed to create database directory {}: {e}",
            path.display()
        ))
    })
}

/// Parse a UUID column
pub(crate) fn parse_uuid(value: &str, column: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| AppError::database(format!("Invalid UUID in column {column}: {e}")))
}

/// Parse an optional UUID column
pub(crate) fn parse_optional_uuid(value: Option<String>, column: &str) -> AppResult<Option<Uuid>> {
    value.as_deref().map(|v| parse_uuid(v, column)).transpose()
}

/// Parse an RFC 3339 timestamp column
pub(crate) fn parse_timestamp(value: &str, column: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::database(format!("Invalid timestamp in column {column}: {e}")))
}

/// Parse an optional RFC 3339 timestamp column
pub(crate) fn parse_optional_timestamp(
    value: Option<String>,
    column: &str,
) -> AppResult<Option<DateTime<Utc>>> {
    value.as_deref().map(|v| parse_timestamp(v, column)).transpose()
}

/// Parse a text enum column
pub(crate) fn parse_enum<T>(value: &str, column: &str) -> AppResult<T>
where
    T: FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e: String| AppError::database(format!("Invalid value in column {column}: {e}")))
}

/// Parse an optional JSON text column
pub(crate) fn parse_optional_json(
    value: Option<String>,
    column: &str,
) -> AppResult<Option<serde_json::Value>> {
    value
        .as_deref()
        .map(|v| {
            serde_json::from_str(v)
                .map_err(|e| AppError::database(format!("Invalid JSON in column {column}: {e}")))
        })
        .transpose()
}

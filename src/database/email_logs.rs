// ABOUTME: Email log database operations
// ABOUTME: Records every outgoing message and its delivery outcome
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

use super::{
    parse_enum, parse_optional_timestamp, parse_optional_uuid, parse_timestamp, parse_uuid,
    Database,
};
use crate::errors::{AppError, AppResult};
use crate::models::{EmailLog, EmailStatus};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

impl Database {
    /// Create the `email_logs` table
    pub(super) async fn migrate_email_logs(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS email_logs (
                id TEXT PRIMARY KEY,
                case_id TEXT REFERENCES insurance_cases(id) ON DELETE CASCADE,
                recipient_email TEXT NOT NULL,
                sender_email TEXT NOT NULL,
                subject TEXT NOT NULL,
                body_html TEXT NOT NULL,
                body_text TEXT,
                email_type TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'sent', 'failed')),
                external_id TEXT,
                error_message TEXT,
                sent_at TEXT,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_email_logs_case ON email_logs(case_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Insert an email log entry
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn insert_email_log(&self, entry: &EmailLog) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO email_logs (
                id, case_id, recipient_email, sender_email, subject, body_html, body_text,
                email_type, status, external_id, error_message, sent_at, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ",
        )
        .bind(entry.id.to_string())
        .bind(entry.case_id.map(|id| id.to_string()))
        .bind(&entry.recipient_email)
        .bind(&entry.sender_email)
        .bind(&entry.subject)
        .bind(&entry.body_html)
        .bind(&entry.body_text)
        .bind(entry.email_type.as_str())
        .bind(entry.status.as_str())
        .bind(&entry.external_id)
        .bind(&entry.error_message)
        .bind(entry.sent_at.map(|at| at.to_rfc3339()))
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to insert email log: {e}")))?;

        Ok(())
    }

    /// Record the delivery outcome of a logged email
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn update_email_log_status(
        &self,
        email_log_id: Uuid,
        status: EmailStatus,
        external_id: Option<&str>,
        error_message: Option<&str>,
    ) -> AppResult<()> {
        let sent_at = (status == EmailStatus::Sent).then(|| Utc::now().to_rfc3339());

        sqlx::query(
            r"
            UPDATE email_logs
            SET status = ?2, external_id = COALESCE(?3, external_id), error_message = ?4,
                sent_at = COALESCE(?5, sent_at)
            WHERE id = ?1
            ",
        )
        .bind(email_log_id.to_string())
        .bind(status.as_str())
        .bind(external_id)
        .bind(error_message)
        .bind(sent_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update email log: {e}")))?;

        Ok(())
    }

    /// List email log entries of a case, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_email_logs(&self, case_id: Uuid) -> AppResult<Vec<EmailLog>> {
        let rows = sqlx::query(
            r"
            SELECT id, case_id, recipient_email, sender_email, subject, body_html, body_text,
                   email_type, status, external_id, error_message, sent_at, created_at
            FROM email_logs
            WHERE case_id = ?1
            ORDER BY created_at ASC
            ",
        )
        .bind(case_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list email logs: {e}")))?;

        rows.iter().map(row_to_email_log).collect()
    }
}

fn row_to_email_log(row: &SqliteRow) -> AppResult<EmailLog> {
    Ok(EmailLog {
        id: parse_uuid(&row.get::<String, _>("id"), "email_logs.id")?,
        case_id: parse_optional_uuid(row.get("case_id"), "email_logs.case_id")?,
        recipient_email: row.get("recipient_email"),
        sender_email: row.get("sender_email"),
        subject: row.get("subject"),
        body_html: row.get("body_html"),
        body_text: row.get("body_text"),
        email_type: parse_enum(&row.get::<String, _>("email_type"), "email_logs.email_type")?,
        status: parse_enum(&row.get::<String, _>("status"), "email_logs.status")?,
        external_id: row.get("external_id"),
        error_message: row.get("error_message"),
        sent_at: parse_optional_timestamp(row.get("sent_at"), "email_logs.sent_at")?,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"), "email_logs.created_at")?,
    })
}

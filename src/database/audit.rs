// ABOUTME: Audit trail database operations
// ABOUTME: Appends case actions with caller origin and lists them for agents
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

use super::{parse_optional_json, parse_optional_uuid, parse_timestamp, parse_uuid, Database};
use crate::errors::{AppError, AppResult};
use crate::models::AuditLog;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

impl Database {
    /// Create the `audit_logs` table
    pub(super) async fn migrate_audit_logs(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS audit_logs (
                id TEXT PRIMARY KEY,
                case_id TEXT REFERENCES insurance_cases(id) ON DELETE CASCADE,
                action TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                entity_id TEXT,
                new_values TEXT,
                ip_address TEXT,
                user_agent TEXT,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_logs_case ON audit_logs(case_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Append an audit entry
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn insert_audit_log(&self, entry: &AuditLog) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO audit_logs (id, case_id, action, entity_type, entity_id, new_values, ip_address, user_agent, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(entry.id.to_string())
        .bind(entry.case_id.map(|id| id.to_string()))
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(entry.new_values.as_ref().map(ToString::to_string))
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to insert audit log: {e}")))?;

        Ok(())
    }

    /// List audit entries of a case, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_audit_logs(&self, case_id: Uuid) -> AppResult<Vec<AuditLog>> {
        let rows = sqlx::query(
            r"
            SELECT id, case_id, action, entity_type, entity_id, new_values, ip_address, user_agent, created_at
            FROM audit_logs
            WHERE case_id = ?1
            ORDER BY created_at ASC
            ",
        )
        .bind(case_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list audit logs: {e}")))?;

        rows.iter().map(row_to_audit_log).collect()
    }
}

fn row_to_audit_log(row: &SqliteRow) -> AppResult<AuditLog> {
    Ok(AuditLog {
        id: parse_uuid(&row.get::<String, _>("id"), "audit_logs.id")?,
        case_id: parse_optional_uuid(row.get("case_id"), "audit_logs.case_id")?,
        action: row.get("action"),
        entity_type: row.get("entity_type"),
        entity_id: row.get("entity_id"),
        new_values: parse_optional_json(row.get("new_values"), "audit_logs.new_values")?,
        ip_address: row.get("ip_address"),
        user_agent: row.get("user_agent"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"), "audit_logs.created_at")?,
    })
}

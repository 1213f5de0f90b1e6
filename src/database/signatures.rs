// ABOUTME: Electronic signature database operations
// ABOUTME: Records signature pad captures and lists them per case
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

use super::{parse_timestamp, parse_uuid, Database};
use crate::errors::{AppError, AppResult};
use crate::models::Signature;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};
use uuid::Uuid;

impl Database {
    /// Create the `signatures` table
    pub(super) async fn migrate_signatures(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS signatures (
                id TEXT PRIMARY KEY,
                case_id TEXT NOT NULL REFERENCES insurance_cases(id) ON DELETE CASCADE,
                signature_data TEXT NOT NULL,
                signer_name TEXT NOT NULL,
                ip_address TEXT,
                user_agent TEXT,
                signed_at TEXT NOT NULL,
                is_valid BOOLEAN NOT NULL DEFAULT 1
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_signatures_case ON signatures(case_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Insert a signature
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn insert_signature(&self, signature: &Signature) -> AppResult<()> {
        write_signature(&self.pool, signature).await
    }

    /// List signatures of a case, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_signatures(&self, case_id: Uuid) -> AppResult<Vec<Signature>> {
        let rows = sqlx::query(
            r"
            SELECT id, case_id, signature_data, signer_name, ip_address, user_agent, signed_at, is_valid
            FROM signatures
            WHERE case_id = ?1
            ORDER BY signed_at ASC
            ",
        )
        .bind(case_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list signatures: {e}")))?;

        rows.iter().map(row_to_signature).collect()
    }
}

pub(super) async fn write_signature<'e, E>(executor: E, signature: &Signature) -> AppResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r"
        INSERT INTO signatures (id, case_id, signature_data, signer_name, ip_address, user_agent, signed_at, is_valid)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ",
    )
    .bind(signature.id.to_string())
    .bind(signature.case_id.to_string())
    .bind(&signature.signature_data)
    .bind(&signature.signer_name)
    .bind(&signature.ip_address)
    .bind(&signature.user_agent)
    .bind(signature.signed_at.to_rfc3339())
    .bind(signature.is_valid)
    .execute(executor)
    .await
    .map_err(|e| AppError::database(format!("Failed to insert signature: {e}")))?;

    Ok(())
}

fn row_to_signature(row: &SqliteRow) -> AppResult<Signature> {
    Ok(Signature {
        id: parse_uuid(&row.get::<String, _>("id"), "signatures.id")?,
        case_id: parse_uuid(&row.get::<String, _>("case_id"), "signatures.case_id")?,
        signature_data: row.get("signature_data"),
        signer_name: row.get("signer_name"),
        ip_address: row.get("ip_address"),
        user_agent: row.get("user_agent"),
        signed_at: parse_timestamp(&row.get::<String, _>("signed_at"), "signatures.signed_at")?,
        is_valid: row.get("is_valid"),
    })
}

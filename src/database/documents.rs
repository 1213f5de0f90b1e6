// ABOUTME: Document metadata database operations
// ABOUTME: Stores uploaded and generated file records and serves the paginated documents history
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

use super::{parse_enum, parse_optional_uuid, parse_timestamp, parse_uuid, Database};
use crate::constants::limits;
use crate::errors::{AppError, AppResult};
use crate::models::{Document, DocumentType};
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, QueryBuilder, Row, Sqlite};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A history date filter: an RFC 3339 instant or a whole UTC calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilter {
    /// Exact instant
    Instant(DateTime<Utc>),
    /// `YYYY-MM-DD`, covering the whole day
    Day(NaiveDate),
}

impl DateFilter {
    /// First instant matched when used as a lower bound
    #[must_use]
    pub fn start(self) -> DateTime<Utc> {
        match self {
            Self::Instant(at) => at,
            Self::Day(day) => day.and_time(NaiveTime::MIN).and_utc(),
        }
    }

    /// Upper bound, and whether it is exclusive
    ///
    /// A calendar day ends before midnight of the following day.
    #[must_use]
    pub fn end(self) -> (DateTime<Utc>, bool) {
        match self {
            Self::Instant(at) => (at, false),
            Self::Day(day) => day.checked_add_days(Days::new(1)).map_or(
                (DateTime::<Utc>::MAX_UTC, false),
                |next| (next.and_time(NaiveTime::MIN).and_utc(), true),
            ),
        }
    }

    /// Whether a range starting at `self` and ending at `end` matches nothing
    #[must_use]
    pub fn is_after(self, end: Self) -> bool {
        let (upper, exclusive) = end.end();
        if exclusive {
            self.start() >= upper
        } else {
            self.start() > upper
        }
    }
}

impl From<DateTime<Utc>> for DateFilter {
    fn from(at: DateTime<Utc>) -> Self {
        Self::Instant(at)
    }
}

impl FromStr for DateFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(day) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self::Day(day));
        }
        DateTime::parse_from_rfc3339(s)
            .map(|at| Self::Instant(at.with_timezone(&Utc)))
            .map_err(|_| {
                AppError::invalid_input(format!(
                    "Invalid date '{s}', expected YYYY-MM-DD or an RFC 3339 timestamp"
                ))
            })
    }
}

impl fmt::Display for DateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instant(at) => write!(f, "{}", at.to_rfc3339()),
            Self::Day(day) => write!(f, "{}", day.format("%Y-%m-%d")),
        }
    }
}

impl<'de> Deserialize<'de> for DateFilter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Filters for the documents history
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    /// Only documents of this case
    pub case_id: Option<Uuid>,
    /// Only documents of this type
    pub document_type: Option<DocumentType>,
    /// `true` for signed documents only, `false` to exclude them
    pub is_signed: Option<bool>,
    /// Uploaded at or after; a bare date starts at midnight UTC
    pub start_date: Option<DateFilter>,
    /// Uploaded at or before; a bare date includes the whole day
    pub end_date: Option<DateFilter>,
    /// Page size (default 50, at most 100)
    pub limit: Option<u32>,
    /// Rows to skip
    pub offset: Option<u32>,
}

impl HistoryQuery {
    /// Effective page size
    #[must_use]
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(limits::DEFAULT_PAGE_SIZE)
            .clamp(1, limits::MAX_PAGE_SIZE)
    }

    /// Effective offset
    #[must_use]
    pub fn effective_offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}

/// A document joined with its case and client
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    /// The document
    #[serde(flatten)]
    pub document: Document,
    /// Case number
    pub case_number: String,
    /// Case status
    pub case_status: String,
    /// Client full name
    pub client_name: String,
    /// Client email
    pub client_email: String,
}

const DOCUMENT_COLUMNS: &str = r"
    d.id, d.case_id, d.document_type, d.file_name, d.file_path, d.file_size, d.mime_type,
    d.sha256, d.is_verified, d.uploaded_by, d.created_at
";

impl Database {
    /// Create the `documents` table
    pub(super) async fn migrate_documents(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                case_id TEXT NOT NULL REFERENCES insurance_cases(id) ON DELETE CASCADE,
                document_type TEXT NOT NULL,
                file_name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                file_size INTEGER NOT NULL CHECK (file_size > 0),
                mime_type TEXT NOT NULL,
                sha256 TEXT NOT NULL,
                is_verified BOOLEAN NOT NULL DEFAULT 0,
                uploaded_by TEXT REFERENCES users(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_case ON documents(case_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_created ON documents(created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a document record
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn insert_document(&self, document: &Document) -> AppResult<()> {
        write_document(&self.pool, document).await
    }

    /// List documents of a case, oldest first, optionally of one type
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_documents(
        &self,
        case_id: Uuid,
        document_type: Option<DocumentType>,
    ) -> AppResult<Vec<Document>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {DOCUMENT_COLUMNS} FROM documents d WHERE d.case_id = "));
        query.push_bind(case_id.to_string());
        if let Some(document_type) = document_type {
            query
                .push(" AND d.document_type = ")
                .push_bind(document_type.as_str());
        }
        query.push(" ORDER BY d.created_at ASC, d.id ASC");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to list documents: {e}")))?;

        rows.iter().map(row_to_document).collect()
    }

    /// Get a document by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_document(&self, document_id: Uuid) -> AppResult<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d WHERE d.id = ?1"
        ))
        .bind(document_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get document: {e}")))?;

        row.as_ref().map(row_to_document).transpose()
    }

    /// Paginated documents history across cases, newest first
    ///
    /// Returns the page and the total number of matching documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn documents_history(
        &self,
        query: &HistoryQuery,
    ) -> AppResult<(Vec<HistoryEntry>, i64)> {
        const FROM: &str = r"
            FROM documents d
            JOIN insurance_cases c ON c.id = d.case_id
            JOIN clients cl ON cl.id = c.client_id
            JOIN users u ON u.id = cl.user_id
            WHERE 1 = 1
        ";

        let mut count: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT COUNT(*) {FROM}"));
        push_history_filters(&mut count, query);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count documents: {e}")))?;

        let mut page: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {DOCUMENT_COLUMNS}, c.case_number, c.status AS case_status, u.first_name, u.last_name, u.email {FROM}"
        ));
        push_history_filters(&mut page, query);
        page.push(" ORDER BY d.created_at DESC, d.id DESC LIMIT ")
            .push_bind(i64::from(query.effective_limit()))
            .push(" OFFSET ")
            .push_bind(i64::from(query.effective_offset()));

        let rows = page
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to read documents history: {e}")))?;

        let entries = rows
            .iter()
            .map(|row| {
                let first: String = row.get("first_name");
                let last: String = row.get("last_name");
                Ok(HistoryEntry {
                    document: row_to_document(row)?,
                    case_number: row.get("case_number"),
                    case_status: row.get("case_status"),
                    client_name: format!("{first} {last}").trim().to_owned(),
                    client_email: row.get("email"),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok((entries, total))
    }
}

pub(super) async fn write_document<'e, E>(executor: E, document: &Document) -> AppResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r"
        INSERT INTO documents (id, case_id, document_type, file_name, file_path, file_size, mime_type, sha256, is_verified, uploaded_by, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ",
    )
    .bind(document.id.to_string())
    .bind(document.case_id.to_string())
    .bind(document.document_type.as_str())
    .bind(&document.file_name)
    .bind(&document.file_path)
    .bind(document.file_size)
    .bind(&document.mime_type)
    .bind(&document.sha256)
    .bind(document.is_verified)
    .bind(document.uploaded_by.map(|id| id.to_string()))
    .bind(document.created_at.to_rfc3339())
    .execute(executor)
    .await
    .map_err(|e| AppError::database(format!("Failed to insert document: {e}")))?;

    Ok(())
}

fn push_history_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &HistoryQuery) {
    if let Some(case_id) = query.case_id {
        builder.push(" AND d.case_id = ").push_bind(case_id.to_string());
    }
    if let Some(document_type) = query.document_type {
        builder
            .push(" AND d.document_type = ")
            .push_bind(document_type.as_str());
    }
    match query.is_signed {
        Some(true) => {
            builder
                .push(" AND d.document_type = ")
                .push_bind(DocumentType::SignedDocument.as_str());
        }
        Some(false) => {
            builder
                .push(" AND d.document_type <> ")
                .push_bind(DocumentType::SignedDocument.as_str());
        }
        None => {}
    }
    if let Some(start) = query.start_date {
        builder
            .push(" AND d.created_at >= ")
            .push_bind(start.start().to_rfc3339());
    }
    if let Some(end) = query.end_date {
        let (upper, exclusive) = end.end();
        builder
            .push(if exclusive {
                " AND d.created_at < "
            } else {
                " AND d.created_at <= "
            })
            .push_bind(upper.to_rfc3339());
    }
}

fn row_to_document(row: &SqliteRow) -> AppResult<Document> {
    Ok(Document {
        id: parse_uuid(&row.get::<String, _>("id"), "documents.id")?,
        case_id: parse_uuid(&row.get::<String, _>("case_id"), "documents.case_id")?,
        document_type: parse_enum(
            &row.get::<String, _>("document_type"),
            "documents.document_type",
        )?,
        file_name: row.get("file_name"),
        file_path: row.get("file_path"),
        file_size: row.get("file_size"),
        mime_type: row.get("mime_type"),
        sha256: row.get("sha256"),
        is_verified: row.get("is_verified"),
        uploaded_by: parse_optional_uuid(row.get("uploaded_by"), "documents.uploaded_by")?,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"), "documents.created_at")?,
    })
}

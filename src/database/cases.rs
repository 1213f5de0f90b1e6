// ABOUTME: Insurance case database operations
// ABOUTME: Case numbering, token lookup, guarded status transitions, and agent listings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

use super::documents::write_document;
use super::signatures::write_signature;
use super::users::{row_to_client, row_to_user, AgentWithUser};
use super::{
    parse_enum, parse_optional_timestamp, parse_optional_uuid, parse_timestamp, parse_uuid,
    Database,
};
use crate::constants::{cases, limits};
use crate::errors::{AppError, AppResult};
use crate::models::{CaseStatus, Client, Document, InsuranceCase, Signature, User};
use crate::workflow::{format_case_number, next_case_sequence};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, QueryBuilder, Row, Sqlite};
use uuid::Uuid;

/// Fields needed to insert a case
#[derive(Debug, Clone)]
pub struct NewCase {
    /// Allocated case number
    pub case_number: String,
    /// Owning client
    pub client_id: Uuid,
    /// Managing agent
    pub agent_id: Option<Uuid>,
    /// Insurance type
    pub insurance_type: String,
    /// Insurer
    pub insurance_company: Option<String>,
    /// Policy number
    pub policy_number: Option<String>,
    /// Title
    pub title: String,
    /// Description
    pub description: Option<String>,
    /// Portal token
    pub secure_token: String,
    /// Token expiry
    pub token_expires_at: DateTime<Utc>,
    /// Captured form data
    pub form_data: serde_json::Value,
}

/// A case with the people attached to it
#[derive(Debug, Clone, Serialize)]
pub struct CaseDetails {
    /// The case
    pub case: InsuranceCase,
    /// Client profile
    pub client: Client,
    /// Client user
    pub client_user: User,
    /// Managing agent, if any
    pub agent: Option<AgentWithUser>,
}

/// Filters for the agent case listing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseFilter {
    /// Only cases in this status
    pub status: Option<CaseStatus>,
    /// Only cases of this agent
    pub agent_id: Option<Uuid>,
    /// Case number, client name, or email fragment
    pub search: Option<String>,
    /// Page size
    pub limit: Option<u32>,
    /// Rows to skip
    pub offset: Option<u32>,
}

/// One row of the agent case listing
#[derive(Debug, Clone, Serialize)]
pub struct CaseListItem {
    /// The case
    #[serde(flatten)]
    pub case: InsuranceCase,
    /// Client full name
    pub client_name: String,
    /// Client email
    pub client_email: String,
    /// Number of attached documents
    pub document_count: i64,
}

const CASE_COLUMNS: &str = r"
    c.id, c.case_number, c.client_id, c.agent_id, c.insurance_type, c.insurance_company,
    c.policy_number, c.status, c.title, c.description, c.secure_token, c.token_expires_at,
    c.form_data, c.completed_at, c.created_at, c.updated_at
";

impl Database {
    /// Create the `insurance_cases` table
    pub(super) async fn migrate_cases(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS insurance_cases (
                id TEXT PRIMARY KEY,
                case_number TEXT UNIQUE NOT NULL,
                client_id TEXT NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
                agent_id TEXT REFERENCES agents(id) ON DELETE SET NULL,
                insurance_type TEXT NOT NULL,
                insurance_company TEXT,
                policy_number TEXT,
                status TEXT NOT NULL DEFAULT 'email_sent' CHECK (status IN ('email_sent', 'documents_uploaded', 'document_reviewed', 'signed', 'completed')),
                title TEXT NOT NULL,
                description TEXT,
                secure_token TEXT UNIQUE NOT NULL,
                token_expires_at TEXT NOT NULL,
                form_data TEXT NOT NULL DEFAULT '{}',
                completed_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_cases_status ON insurance_cases(status)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_cases_client ON insurance_cases(client_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Next free case number for `year` (`RES-{year}-NNN`)
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn next_case_number(&self, year: i32) -> AppResult<String> {
        let pattern = format!("{}-{year}-%", cases::CASE_NUMBER_PREFIX);
        let last: Option<String> = sqlx::query_scalar(
            r"
            SELECT case_number FROM insurance_cases
            WHERE case_number LIKE ?1
            ORDER BY length(case_number) DESC, case_number DESC
            LIMIT 1
            ",
        )
        .bind(pattern)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to read last case number: {e}")))?;

        Ok(format_case_number(
            year,
            next_case_sequence(last.as_deref()),
        ))
    }

    /// Insert a case in `email_sent`
    ///
    /// # Errors
    ///
    /// Returns `ResourceAlreadyExists` when the case number or token is taken,
    /// or an error if the database operation fails
    pub async fn create_case(&self, new_case: &NewCase) -> AppResult<InsuranceCase> {
        let now = Utc::now();
        let case = InsuranceCase {
            id: Uuid::new_v4(),
            case_number: new_case.case_number.clone(),
            client_id: new_case.client_id,
            agent_id: new_case.agent_id,
            insurance_type: new_case.insurance_type.clone(),
            insurance_company: new_case.insurance_company.clone(),
            policy_number: new_case.policy_number.clone(),
            status: CaseStatus::EmailSent,
            title: new_case.title.clone(),
            description: new_case.description.clone(),
            secure_token: new_case.secure_token.clone(),
            token_expires_at: new_case.token_expires_at,
            form_data: new_case.form_data.clone(),
            completed_at: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r"
            INSERT INTO insurance_cases (
                id, case_number, client_id, agent_id, insurance_type, insurance_company,
                policy_number, status, title, description, secure_token, token_expires_at,
                form_data, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)
            ",
        )
        .bind(case.id.to_string())
        .bind(&case.case_number)
        .bind(case.client_id.to_string())
        .bind(case.agent_id.map(|id| id.to_string()))
        .bind(&case.insurance_type)
        .bind(&case.insurance_company)
        .bind(&case.policy_number)
        .bind(case.status.as_str())
        .bind(&case.title)
        .bind(&case.description)
        .bind(&case.secure_token)
        .bind(case.token_expires_at.to_rfc3339())
        .bind(case.form_data.to_string())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(case)
    }

    /// Get a case by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_case(&self, case_id: Uuid) -> AppResult<Option<InsuranceCase>> {
        let row = sqlx::query(&format!(
            "SELECT {CASE_COLUMNS} FROM insurance_cases c WHERE c.id = ?1"
        ))
        .bind(case_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get case: {e}")))?;

        row.as_ref().map(row_to_case).transpose()
    }

    /// Get a case by its portal token (exact match)
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_case_by_token(&self, token: &str) -> AppResult<Option<InsuranceCase>> {
        let row = sqlx::query(&format!(
            "SELECT {CASE_COLUMNS} FROM insurance_cases c WHERE c.secure_token = ?1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get case by token: {e}")))?;

        row.as_ref().map(row_to_case).transpose()
    }

    /// Get a case with its client and agent
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or the client row is missing
    pub async fn get_case_details(&self, case_id: Uuid) -> AppResult<Option<CaseDetails>> {
        let Some(case) = self.get_case(case_id).await? else {
            return Ok(None);
        };
        self.load_case_details(case).await.map(Some)
    }

    /// Attach client and agent records to a loaded case
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or the client row is missing
    pub async fn load_case_details(&self, case: InsuranceCase) -> AppResult<CaseDetails> {
        let client_row = sqlx::query(
            r"
            SELECT cl.id, cl.user_id, cl.client_code, cl.date_of_birth, cl.address_line1,
                   cl.postal_code, cl.city, cl.country, cl.created_at, cl.updated_at
            FROM clients cl WHERE cl.id = ?1
            ",
        )
        .bind(case.client_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get case client: {e}")))?
        .ok_or_else(|| AppError::not_found("Client"))?;
        let client = row_to_client(&client_row)?;

        let user_row = sqlx::query(
            r"
            SELECT id, email, first_name, last_name, phone, role, is_active, created_at, updated_at
            FROM users WHERE id = ?1
            ",
        )
        .bind(client.user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get client user: {e}")))?
        .ok_or_else(|| AppError::not_found("Client user"))?;
        let client_user = row_to_user(&user_row)?;

        let agent = match case.agent_id {
            Some(agent_id) => self.get_agent(agent_id).await?,
            None => None,
        };

        Ok(CaseDetails {
            case,
            client,
            client_user,
            agent,
        })
    }

    /// Move a case from `from` to `to`
    ///
    /// The update only applies while the stored status is still `from`, so two
    /// concurrent requests cannot both advance the same case. Returns whether
    /// a row changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn update_case_status(
        &self,
        case_id: Uuid,
        from: CaseStatus,
        to: CaseStatus,
    ) -> AppResult<bool> {
        write_case_status(&self.pool, case_id, from, to).await
    }

    /// Move a case from `from` to `signed` and store the signature atomically
    ///
    /// Returns `false` without writing anything when the stored status is no
    /// longer `from`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; nothing is persisted
    /// in that case
    pub async fn record_signature(
        &self,
        signature: &Signature,
        from: CaseStatus,
    ) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;
        if !write_case_status(&mut *tx, signature.case_id, from, CaseStatus::Signed).await? {
            tx.rollback().await?;
            return Ok(false);
        }
        write_signature(&mut *tx, signature).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Move a case from `from` to `completed` and store its signed document atomically
    ///
    /// Returns `false` without writing anything when the stored status is no
    /// longer `from`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; nothing is persisted
    /// in that case
    pub async fn record_completion(
        &self,
        document: &Document,
        from: CaseStatus,
    ) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;
        if !write_case_status(&mut *tx, document.case_id, from, CaseStatus::Completed).await? {
            tx.rollback().await?;
            return Ok(false);
        }
        write_document(&mut *tx, document).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Replace the portal token and its expiry
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the case does not exist, or an error if
    /// the database operation fails
    pub async fn rotate_case_token(
        &self,
        case_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r"
            UPDATE insurance_cases
            SET secure_token = ?2, token_expires_at = ?3, updated_at = ?4
            WHERE id = ?1
            ",
        )
        .bind(case_id.to_string())
        .bind(token)
        .bind(expires_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Case"));
        }
        Ok(())
    }

    /// List cases for agents, newest first, with the total matching count
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_cases(&self, filter: &CaseFilter) -> AppResult<(Vec<CaseListItem>, i64)> {
        let limit = i64::from(
            filter
                .limit
                .unwrap_or(limits::DEFAULT_PAGE_SIZE)
                .clamp(1, limits::MAX_PAGE_SIZE),
        );
        let offset = i64::from(filter.offset.unwrap_or(0));

        let mut count_query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT COUNT(*) FROM insurance_cases c JOIN clients cl ON cl.id = c.client_id JOIN users u ON u.id = cl.user_id WHERE 1 = 1",
        );
        push_case_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to count cases: {e}")))?;

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            r"
            SELECT {CASE_COLUMNS},
                   u.first_name, u.last_name, u.email,
                   (SELECT COUNT(*) FROM documents d WHERE d.case_id = c.id) AS document_count
            FROM insurance_cases c
            JOIN clients cl ON cl.id = c.client_id
            JOIN users u ON u.id = cl.user_id
            WHERE 1 = 1
            "
        ));
        push_case_filters(&mut query, filter);
        query
            .push(" ORDER BY c.created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to list cases: {e}")))?;

        let items = rows
            .iter()
            .map(|row| {
                let first: String = row.get("first_name");
                let last: String = row.get("last_name");
                Ok(CaseListItem {
                    case: row_to_case(row)?,
                    client_name: format!("{first} {last}").trim().to_owned(),
                    client_email: row.get("email"),
                    document_count: row.get("document_count"),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok((items, total))
    }
}

async fn write_case_status<'e, E>(
    executor: E,
    case_id: Uuid,
    from: CaseStatus,
    to: CaseStatus,
) -> AppResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = Utc::now().to_rfc3339();
    let completed_at = (to == CaseStatus::Completed).then(|| now.clone());

    let result = sqlx::query(
        r"
        UPDATE insurance_cases
        SET status = ?3, updated_at = ?4, completed_at = COALESCE(?5, completed_at)
        WHERE id = ?1 AND status = ?2
        ",
    )
    .bind(case_id.to_string())
    .bind(from.as_str())
    .bind(to.as_str())
    .bind(&now)
    .bind(completed_at)
    .execute(executor)
    .await
    .map_err(|e| AppError::database(format!("Failed to update case status: {e}")))?;

    Ok(result.rows_affected() == 1)
}

fn push_case_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &CaseFilter) {
    if let Some(status) = filter.status {
        query.push(" AND c.status = ").push_bind(status.as_str());
    }
    if let Some(agent_id) = filter.agent_id {
        query.push(" AND c.agent_id = ").push_bind(agent_id.to_string());
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.to_lowercase());
        query
            .push(" AND (lower(c.case_number) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR lower(u.first_name || ' ' || u.last_name) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR lower(u.email) LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn row_to_case(row: &SqliteRow) -> AppResult<InsuranceCase> {
    let form_data: String = row.get("form_data");
    Ok(InsuranceCase {
        id: parse_uuid(&row.get::<String, _>("id"), "insurance_cases.id")?,
        case_number: row.get("case_number"),
        client_id: parse_uuid(&row.get::<String, _>("client_id"), "insurance_cases.client_id")?,
        agent_id: parse_optional_uuid(row.get("agent_id"), "insurance_cases.agent_id")?,
        insurance_type: row.get("insurance_type"),
        insurance_company: row.get("insurance_company"),
        policy_number: row.get("policy_number"),
        status: parse_enum(&row.get::<String, _>("status"), "insurance_cases.status")?,
        title: row.get("title"),
        description: row.get("description"),
        secure_token: row.get("secure_token"),
        token_expires_at: parse_timestamp(
            &row.get::<String, _>("token_expires_at"),
            "insurance_cases.token_expires_at",
        )?,
        form_data: serde_json::from_str(&form_data).unwrap_or(serde_json::Value::Null),
        completed_at: parse_optional_timestamp(
            row.get("completed_at"),
            "insurance_cases.completed_at",
        )?,
        created_at: parse_timestamp(
            &row.get::<String, _>("created_at"),
            "insurance_cases.created_at",
        )?,
        updated_at: parse_timestamp(
            &row.get::<String, _>("updated_at"),
            "insurance_cases.updated_at",
        )?,
    })
}

// ABOUTME: User, client, and agent database operations
// ABOUTME: Find-or-create users by email and manage the client and agent profiles attached to them
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

use super::{parse_enum, parse_timestamp, parse_uuid, Database};
use crate::constants::cases::DEFAULT_COUNTRY;
use crate::errors::{AppError, AppResult};
use crate::models::{Agent, Client, User, UserRole};
use crate::workflow::generate_client_code;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

/// Fields needed to create a user
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Email address
    pub email: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Phone number
    pub phone: Option<String>,
    /// Role
    pub role: UserRole,
}

/// Address and birth data stored on a client profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientProfile {
    /// Birth date (`YYYY-MM-DD`)
    pub date_of_birth: Option<String>,
    /// Street address
    pub address_line1: Option<String>,
    /// Postal code
    pub postal_code: Option<String>,
    /// City
    pub city: Option<String>,
}

/// Fields needed to register an agent
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAgent {
    /// Email address
    pub email: String,
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Phone number
    #[serde(default)]
    pub phone: Option<String>,
    /// Unique agent code
    pub agent_code: String,
    /// Department name
    #[serde(default)]
    pub department: Option<String>,
    /// Supervisor flag
    #[serde(default)]
    pub is_supervisor: bool,
}

/// An agent together with its user record
#[derive(Debug, Clone, Serialize)]
pub struct AgentWithUser {
    /// Agent profile
    pub agent: Agent,
    /// Underlying user
    pub user: User,
}

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, phone, role, is_active, created_at, updated_at";

const CLIENT_COLUMNS: &str = "id, user_id, client_code, date_of_birth, address_line1, postal_code, city, country, created_at, updated_at";

impl Database {
    /// Create users, clients, and agents tables
    pub(super) async fn migrate_users(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                phone TEXT,
                role TEXT NOT NULL CHECK (role IN ('admin', 'agent', 'client')),
                is_active BOOLEAN NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS clients (
                id TEXT PRIMARY KEY,
                user_id TEXT UNIQUE NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                client_code TEXT UNIQUE NOT NULL,
                date_of_birth TEXT,
                address_line1 TEXT,
                postal_code TEXT,
                city TEXT,
                country TEXT NOT NULL DEFAULT 'CH',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                user_id TEXT UNIQUE NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                agent_code TEXT UNIQUE NOT NULL,
                department TEXT,
                is_supervisor BOOLEAN NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Return the user with this email, creating it when absent
    ///
    /// Emails are compared case-insensitively. An existing user keeps its
    /// stored names and role.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn find_or_create_user(&self, new_user: &NewUser) -> AppResult<User> {
        let email = new_user.email.trim().to_lowercase();
        if let Some(existing) = self.get_user_by_email(&email).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            first_name: new_user.first_name.trim().to_owned(),
            last_name: new_user.last_name.trim().to_owned(),
            phone: new_user.phone.clone(),
            role: new_user.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r"
            INSERT INTO users (id, email, first_name, last_name, phone, role, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            ",
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    /// Get a user by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get user: {e}")))?;

        row.as_ref().map(row_to_user).transpose()
    }

    /// Get a user by email (case-insensitive)
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = lower(?1)"
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get user by email: {e}")))?;

        row.as_ref().map(row_to_user).transpose()
    }

    /// Create or update the client profile of a user
    ///
    /// Non-empty profile fields overwrite stored ones; empty ones keep them.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn upsert_client_for_user(
        &self,
        user_id: Uuid,
        profile: &ClientProfile,
    ) -> AppResult<Client> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r"
            INSERT INTO clients (id, user_id, client_code, date_of_birth, address_line1, postal_code, city, country, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            ON CONFLICT(user_id) DO UPDATE SET
                date_of_birth = COALESCE(excluded.date_of_birth, clients.date_of_birth),
                address_line1 = COALESCE(excluded.address_line1, clients.address_line1),
                postal_code = COALESCE(excluded.postal_code, clients.postal_code),
                city = COALESCE(excluded.city, clients.city),
                updated_at = excluded.updated_at
            ",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id.to_string())
        .bind(generate_client_code())
        .bind(non_empty(profile.date_of_birth.as_deref()))
        .bind(non_empty(profile.address_line1.as_deref()))
        .bind(non_empty(profile.postal_code.as_deref()))
        .bind(non_empty(profile.city.as_deref()))
        .bind(DEFAULT_COUNTRY)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE user_id = ?1"
        ))
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to read client after upsert: {e}")))?;

        row_to_client(&row)
    }

    /// Get a client profile by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_client(&self, client_id: Uuid) -> AppResult<Option<Client>> {
        let row = sqlx::query(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1"))
            .bind(client_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get client: {e}")))?;

        row.as_ref().map(row_to_client).transpose()
    }

    /// Register an agent, creating its user when needed
    ///
    /// # Errors
    ///
    /// Returns `ResourceAlreadyExists` if the email or agent code is already
    /// registered as an agent, or an error if the database operation fails
    pub async fn create_agent(&self, new_agent: &NewAgent) -> AppResult<AgentWithUser> {
        let user = self
            .find_or_create_user(&NewUser {
                email: new_agent.email.clone(),
                first_name: new_agent.first_name.clone(),
                last_name: new_agent.last_name.clone(),
                phone: new_agent.phone.clone(),
                role: UserRole::Agent,
            })
            .await?;

        if user.role == UserRole::Client {
            return Err(AppError::already_exists(format!(
                "{} is registered as a client",
                user.email
            )));
        }

        let now = Utc::now();
        let agent = Agent {
            id: Uuid::new_v4(),
            user_id: user.id,
            agent_code: new_agent.agent_code.trim().to_owned(),
            department: new_agent.department.clone(),
            is_supervisor: new_agent.is_supervisor,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r"
            INSERT INTO agents (id, user_id, agent_code, department, is_supervisor, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ",
        )
        .bind(agent.id.to_string())
        .bind(agent.user_id.to_string())
        .bind(&agent.agent_code)
        .bind(&agent.department)
        .bind(agent.is_supervisor)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(AgentWithUser { agent, user })
    }

    /// Get an agent and its user by agent ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_agent(&self, agent_id: Uuid) -> AppResult<Option<AgentWithUser>> {
        self.fetch_agent("a.id = ?1", agent_id.to_string()).await
    }

    /// Get an agent and its user by agent code
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn get_agent_by_code(&self, agent_code: &str) -> AppResult<Option<AgentWithUser>> {
        self.fetch_agent("a.agent_code = ?1", agent_code.trim().to_owned())
            .await
    }

    async fn fetch_agent(&self, condition: &str, value: String) -> AppResult<Option<AgentWithUser>> {
        let row = sqlx::query(&format!("{AGENT_SELECT} WHERE {condition}"))
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get agent: {e}")))?;

        row.as_ref().map(row_to_agent_with_user).transpose()
    }

    /// List agents ordered by last name
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_agents(&self) -> AppResult<Vec<AgentWithUser>> {
        let rows = sqlx::query(&format!("{AGENT_SELECT} ORDER BY u.last_name, u.first_name"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to list agents: {e}")))?;

        rows.iter().map(row_to_agent_with_user).collect()
    }
}

const AGENT_SELECT: &str = r"
    SELECT a.id AS agent_id, a.agent_code, a.department, a.is_supervisor,
           a.created_at AS agent_created_at, a.updated_at AS agent_updated_at,
           u.id, u.email, u.first_name, u.last_name, u.phone, u.role, u.is_active,
           u.created_at, u.updated_at
    FROM agents a
    JOIN users u ON u.id = a.user_id
";

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

/// Decode a `users` row (columns as in `USER_COLUMNS`)
pub(super) fn row_to_user(row: &SqliteRow) -> AppResult<User> {
    Ok(User {
        id: parse_uuid(&row.get::<String, _>("id"), "users.id")?,
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        phone: row.get("phone"),
        role: parse_enum(&row.get::<String, _>("role"), "users.role")?,
        is_active: row.get("is_active"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"), "users.created_at")?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"), "users.updated_at")?,
    })
}

/// Decode a `clients` row (columns as in `CLIENT_COLUMNS`)
pub(super) fn row_to_client(row: &SqliteRow) -> AppResult<Client> {
    Ok(Client {
        id: parse_uuid(&row.get::<String, _>("id"), "clients.id")?,
        user_id: parse_uuid(&row.get::<String, _>("user_id"), "clients.user_id")?,
        client_code: row.get("client_code"),
        date_of_birth: row.get("date_of_birth"),
        address_line1: row.get("address_line1"),
        postal_code: row.get("postal_code"),
        city: row.get("city"),
        country: row.get("country"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at"), "clients.created_at")?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"), "clients.updated_at")?,
    })
}

fn row_to_agent_with_user(row: &SqliteRow) -> AppResult<AgentWithUser> {
    let user = row_to_user(row)?;
    let agent = Agent {
        id: parse_uuid(&row.get::<String, _>("agent_id"), "agents.id")?,
        user_id: user.id,
        agent_code: row.get("agent_code"),
        department: row.get("department"),
        is_supervisor: row.get("is_supervisor"),
        created_at: parse_timestamp(
            &row.get::<String, _>("agent_created_at"),
            "agents.created_at",
        )?,
        updated_at: parse_timestamp(
            &row.get::<String, _>("agent_updated_at"),
            "agents.updated_at",
        )?,
    };
    Ok(AgentWithUser { agent, user })
}

// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses environment variables into a typed ServerConfig with validation and summary
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

//! Environment-based configuration management for production deployment

use crate::constants::{env_config, limits, storage, tokens};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

/// Strongly typed log level configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational (default)
    #[default]
    Info,
    /// Debug output
    Debug,
    /// Everything
    Trace,
}

impl LogLevel {
    /// Convert to `tracing::Level`
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Error => tracing::Level::ERROR,
            Self::Warn => tracing::Level::WARN,
            Self::Info => tracing::Level::INFO,
            Self::Debug => tracing::Level::DEBUG,
            Self::Trace => tracing::Level::TRACE,
        }
    }

    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            "warn" => Self::Warn,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => Self::Info,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development (default)
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Type-safe database location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DatabaseUrl {
    /// `SQLite` database with file path
    SQLite {
        /// Database file
        path: PathBuf,
    },
    /// In-memory `SQLite` (for testing)
    Memory,
}

impl DatabaseUrl {
    /// Parse from string with validation
    ///
    /// # Errors
    ///
    /// Returns an error for URLs naming an unsupported database engine
    pub fn parse_url(s: &str) -> Result<Self> {
        if let Some(path_str) = s.strip_prefix("sqlite:") {
            if path_str == ":memory:" {
                Ok(Self::Memory)
            } else {
                Ok(Self::SQLite {
                    path: PathBuf::from(path_str.trim_start_matches("//")),
                })
            }
        } else if s.contains("://") {
            Err(anyhow::anyhow!("Unsupported database URL scheme: {s}"))
        } else {
            Ok(Self::SQLite {
                path: PathBuf::from(s),
            })
        }
    }

    /// Convert to connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::Memory => "sqlite::memory:".to_owned(),
        }
    }

    /// Check if this is an in-memory database
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::SQLite {
            path: PathBuf::from("./data/esign.db"),
        }
    }
}

impl fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_connection_string())
    }
}

/// Where uploaded and generated files are kept
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Local filesystem under `UPLOAD_DIR`
    #[default]
    Local,
    /// Hosted object-storage bucket
    Object,
}

impl StorageBackend {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "object" | "bucket" | "supabase" => Self::Object,
            _ => Self::Local,
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Object => write!(f, "object"),
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Selected backend
    pub backend: StorageBackend,
    /// Root directory for the local backend
    pub upload_dir: PathBuf,
    /// Base URL of the object-storage REST API
    pub object_storage_url: Option<String>,
    /// Service key for the object-storage API
    #[serde(skip_serializing)]
    pub object_storage_key: Option<String>,
    /// Bucket name
    pub bucket: String,
    /// Lifetime of signed download URLs
    pub signed_url_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            upload_dir: PathBuf::from(storage::DEFAULT_UPLOAD_DIR),
            object_storage_url: None,
            object_storage_key: None,
            bucket: storage::DEFAULT_BUCKET.to_owned(),
            signed_url_ttl_secs: storage::DEFAULT_SIGNED_URL_TTL_SECS,
        }
    }
}

/// Email delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Delivery API key; `None` selects simulated delivery
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Delivery API endpoint
    pub api_url: String,
    /// Sender address
    pub from: String,
    /// Reply-to address
    pub reply_to: String,
    /// Administrator notified on signature
    pub admin_email: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        use crate::constants::email;
        Self {
            api_key: None,
            api_url: email::DEFAULT_EMAIL_API_URL.to_owned(),
            from: email::DEFAULT_FROM.to_owned(),
            reply_to: email::DEFAULT_REPLY_TO.to_owned(),
            admin_email: email::DEFAULT_ADMIN_EMAIL.to_owned(),
        }
    }
}

/// Client portal settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Public base URL used in portal links
    pub app_base_url: String,
    /// Lifetime of a portal token in days
    pub token_expiry_days: i64,
    /// Per-file upload limit in bytes
    pub max_upload_bytes: usize,
    /// Optional key required on agent routes
    #[serde(skip_serializing)]
    pub agent_api_key: Option<String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            app_base_url: "http://localhost:8080".to_owned(),
            token_expiry_days: tokens::DEFAULT_TOKEN_EXPIRY_DAYS,
            max_upload_bytes: limits::MAX_UPLOAD_BYTES,
            agent_api_key: None,
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP API port
    pub http_port: u16,
    /// Bind address
    pub host: String,
    /// Deployment environment
    pub environment: Environment,
    /// Log level
    pub log_level: LogLevel,
    /// Database location
    pub database_url: DatabaseUrl,
    /// Storage settings
    pub storage: StorageConfig,
    /// Email settings
    pub email: EmailConfig,
    /// Portal settings
    pub portal: PortalConfig,
    /// CORS allowed origins (`*` for any)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            host: "0.0.0.0".to_owned(),
            environment: Environment::Development,
            log_level: LogLevel::Info,
            database_url: DatabaseUrl::default(),
            storage: StorageConfig::default(),
            email: EmailConfig::default(),
            portal: PortalConfig::default(),
            cors_origins: vec!["*".to_owned()],
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds a value of the wrong type or the
    /// resulting configuration fails validation
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        if let Err(e) = dotenvy::dotenv() {
            warn!("No .env file found or failed to load: {}", e);
        }

        let config = Self {
            http_port: env_config::http_port(),
            host: env_config::host(),
            environment: Environment::from_str_or_default(&env_var_or(
                "ENVIRONMENT",
                "development",
            )),
            log_level: LogLevel::from_str_or_default(&env_config::log_level()),
            database_url: DatabaseUrl::parse_url(&env_config::database_url())
                .context("Invalid DATABASE_URL value")?,
            storage: StorageConfig {
                backend: StorageBackend::from_str_or_default(&env_var_or(
                    "STORAGE_BACKEND",
                    "local",
                )),
                upload_dir: PathBuf::from(env_config::upload_dir()),
                object_storage_url: env::var("OBJECT_STORAGE_URL").ok(),
                object_storage_key: env::var("OBJECT_STORAGE_KEY").ok(),
                bucket: env_config::object_storage_bucket(),
                signed_url_ttl_secs: env_var_or(
                    "SIGNED_URL_TTL_SECS",
                    &storage::DEFAULT_SIGNED_URL_TTL_SECS.to_string(),
                )
                .parse()
                .context("Invalid SIGNED_URL_TTL_SECS value")?,
            },
            email: EmailConfig {
                api_key: env_config::resend_api_key(),
                api_url: env_config::email_api_url(),
                from: env_config::email_from(),
                reply_to: env_config::email_reply_to(),
                admin_email: env_config::admin_email(),
            },
            portal: PortalConfig {
                app_base_url: env_config::app_base_url(),
                token_expiry_days: env_var_or(
                    "TOKEN_EXPIRY_DAYS",
                    &env_config::default_token_expiry_days(),
                )
                .parse()
                .context("Invalid TOKEN_EXPIRY_DAYS value")?,
                max_upload_bytes: env_var_or(
                    "MAX_UPLOAD_BYTES",
                    &env_config::default_max_upload_bytes(),
                )
                .parse()
                .context("Invalid MAX_UPLOAD_BYTES value")?,
                agent_api_key: env_config::agent_api_key(),
            },
            cors_origins: parse_origins(&env_var_or("CORS_ALLOWED_ORIGINS", "*")),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error when a value makes the service unusable
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.portal.app_base_url)
            .with_context(|| format!("Invalid APP_BASE_URL: {}", self.portal.app_base_url))?;

        if self.portal.token_expiry_days <= 0 {
            return Err(anyhow::anyhow!("TOKEN_EXPIRY_DAYS must be positive"));
        }
        if self.portal.token_expiry_days > tokens::MAX_TOKEN_EXPIRY_DAYS {
            return Err(anyhow::anyhow!(
                "TOKEN_EXPIRY_DAYS must not exceed {}",
                tokens::MAX_TOKEN_EXPIRY_DAYS
            ));
        }

        if self.portal.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_BYTES must be positive"));
        }
        if self.portal.max_upload_bytes > limits::MAX_REQUEST_BODY_BYTES {
            return Err(anyhow::anyhow!(
                "MAX_UPLOAD_BYTES must not exceed the {} byte request limit",
                limits::MAX_REQUEST_BODY_BYTES
            ));
        }

        if self.storage.backend == StorageBackend::Object
            && (self.storage.object_storage_url.is_none()
                || self.storage.object_storage_key.is_none())
        {
            return Err(anyhow::anyhow!(
                "STORAGE_BACKEND=object requires OBJECT_STORAGE_URL and OBJECT_STORAGE_KEY"
            ));
        }

        if self.email.api_key.is_none() {
            warn!("RESEND_API_KEY not set, emails will be simulated");
        }

        if self.environment.is_production() && self.portal.agent_api_key.is_none() {
            warn!("AGENT_API_KEY not set, agent routes are open");
        }

        Ok(())
    }

    /// Portal link for a token
    #[must_use]
    pub fn portal_url(&self, token: &str) -> String {
        format!("{}/client-portal/{token}", self.portal.app_base_url)
    }

    /// Get a summary of the configuration for logging (without secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "eSign Portal Configuration:\n\
             - Environment: {}\n\
             - HTTP: {}:{}\n\
             - Base URL: {}\n\
             - Log Level: {}\n\
             - Database: {}\n\
             - Storage: {} ({})\n\
             - Email Delivery: {}\n\
             - Token Expiry: {} days\n\
             - Max Upload: {} bytes\n\
             - Agent Key: {}",
            self.environment,
            self.host,
            self.http_port,
            self.portal.app_base_url,
            self.log_level,
            if self.database_url.is_memory() {
                "SQLite (memory)"
            } else {
                "SQLite"
            },
            self.storage.backend,
            match self.storage.backend {
                StorageBackend::Local => self.storage.upload_dir.display().to_string(),
                StorageBackend::Object => self.storage.bucket.clone(),
            },
            if self.email.api_key.is_some() {
                "Enabled"
            } else {
                "Simulated"
            },
            self.portal.token_expiry_days,
            self.portal.max_upload_bytes,
            if self.portal.agent_api_key.is_some() {
                "Required"
            } else {
                "Disabled"
            },
        )
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse comma-separated CORS origins
fn parse_origins(origins_str: &str) -> Vec<String> {
    if origins_str.trim() == "*" {
        vec!["*".to_owned()]
    } else {
        origins_str
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

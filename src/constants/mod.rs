// ABOUTME: Application constants plus environment-driven accessors
// ABOUTME: Re-exports core constant domains and reads deployment settings from the environment
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

//! Constants module
//!
//! Pure data constants live in `esign_core::constants`. This module re-exports
//! them and adds `env_config`, the environment accessors used by
//! [`crate::config::environment::ServerConfig::from_env`].

use std::env;

pub use esign_core::constants::{cases, email, headers, limits, service_names, storage, tokens};

/// Environment-based configuration accessors
pub mod env_config {
    use super::{email, env, limits, storage, tokens};

    /// HTTP server port from environment or default
    #[must_use]
    pub fn http_port() -> u16 {
        env::var("HTTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080)
    }

    /// Bind address from environment or default
    #[must_use]
    pub fn host() -> String {
        env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_owned())
    }

    /// Public base URL used to build portal links
    #[must_use]
    pub fn app_base_url() -> String {
        env::var("APP_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_owned())
            .trim_end_matches('/')
            .to_owned()
    }

    /// Database URL from environment or default
    #[must_use]
    pub fn database_url() -> String {
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:./data/esign.db".to_owned())
    }

    /// Log level from environment or default
    #[must_use]
    pub fn log_level() -> String {
        env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned())
    }

    /// Local upload directory
    #[must_use]
    pub fn upload_dir() -> String {
        env::var("UPLOAD_DIR").unwrap_or_else(|_| storage::DEFAULT_UPLOAD_DIR.to_owned())
    }

    /// Object storage bucket name
    #[must_use]
    pub fn object_storage_bucket() -> String {
        env::var("OBJECT_STORAGE_BUCKET").unwrap_or_else(|_| storage::DEFAULT_BUCKET.to_owned())
    }

    /// Delivery API key, `None` when delivery is simulated
    #[must_use]
    pub fn resend_api_key() -> Option<String> {
        env::var("RESEND_API_KEY").ok().filter(|key| !key.trim().is_empty())
    }

    /// Delivery API endpoint
    #[must_use]
    pub fn email_api_url() -> String {
        env::var("EMAIL_API_URL").unwrap_or_else(|_| email::DEFAULT_EMAIL_API_URL.to_owned())
    }

    /// Sender address
    #[must_use]
    pub fn email_from() -> String {
        env::var("EMAIL_FROM").unwrap_or_else(|_| email::DEFAULT_FROM.to_owned())
    }

    /// Reply-to address
    #[must_use]
    pub fn email_reply_to() -> String {
        env::var("EMAIL_REPLY_TO").unwrap_or_else(|_| email::DEFAULT_REPLY_TO.to_owned())
    }

    /// Administrator notified of signatures
    #[must_use]
    pub fn admin_email() -> String {
        env::var("ADMIN_EMAIL").unwrap_or_else(|_| email::DEFAULT_ADMIN_EMAIL.to_owned())
    }

    /// Agent API key, `None` when agent routes are open
    #[must_use]
    pub fn agent_api_key() -> Option<String> {
        env::var("AGENT_API_KEY").ok().filter(|key| !key.trim().is_empty())
    }

    /// Default token lifetime as a string for `env_var_or`
    #[must_use]
    pub fn default_token_expiry_days() -> String {
        tokens::DEFAULT_TOKEN_EXPIRY_DAYS.to_string()
    }

    /// Default per-file upload limit as a string for `env_var_or`
    #[must_use]
    pub fn default_max_upload_bytes() -> String {
        limits::MAX_UPLOAD_BYTES.to_string()
    }
}

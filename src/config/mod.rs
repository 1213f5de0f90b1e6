// ABOUTME: Configuration management module for centralized server settings
// ABOUTME: Loads deployment settings for HTTP, database, storage, email, and portal tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

//! Configuration module for the eSign portal
//!
//! All settings come from environment variables (optionally loaded from a
//! `.env` file). See [`environment::ServerConfig::from_env`].

/// Environment and server configuration
pub mod environment;

pub use environment::{
    DatabaseUrl, EmailConfig, Environment, LogLevel, PortalConfig, ServerConfig, StorageBackend,
    StorageConfig,
};

// ABOUTME: Tests for environment-driven server configuration
// ABOUTME: Covers variable parsing, defaults, validation failures, and secret-free summaries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use esign_portal::config::{
    DatabaseUrl, Environment, LogLevel, ServerConfig, StorageBackend,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

const VARIABLES: &[&str] = &[
    "HTTP_PORT",
    "HOST",
    "ENVIRONMENT",
    "LOG_LEVEL",
    "DATABASE_URL",
    "STORAGE_BACKEND",
    "UPLOAD_DIR",
    "OBJECT_STORAGE_URL",
    "OBJECT_STORAGE_KEY",
    "OBJECT_STORAGE_BUCKET",
    "SIGNED_URL_TTL_SECS",
    "RESEND_API_KEY",
    "EMAIL_FROM",
    "ADMIN_EMAIL",
    "APP_BASE_URL",
    "TOKEN_EXPIRY_DAYS",
    "MAX_UPLOAD_BYTES",
    "AGENT_API_KEY",
    "CORS_ALLOWED_ORIGINS",
];

fn clear_environment() {
    for name in VARIABLES {
        env::remove_var(name);
    }
}

#[test]
#[serial]
fn test_defaults_without_environment() {
    common::init_test_logging();
    clear_environment();

    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.http_port, 8080);
    assert_eq!(config.environment, Environment::Development);
    assert_eq!(config.storage.backend, StorageBackend::Local);
    assert!(config.email.api_key.is_none());
    assert!(config.portal.agent_api_key.is_none());
    assert_eq!(config.portal.token_expiry_days, 7);
    assert_eq!(config.cors_origins, vec!["*"]);
}

#[test]
#[serial]
fn test_values_from_environment() {
    common::init_test_logging();
    clear_environment();
    env::set_var("HTTP_PORT", "9191");
    env::set_var("ENVIRONMENT", "production");
    env::set_var("LOG_LEVEL", "debug");
    env::set_var("DATABASE_URL", "sqlite::memory:");
    env::set_var("APP_BASE_URL", "https://esign.example.ch");
    env::set_var("TOKEN_EXPIRY_DAYS", "14");
    env::set_var("MAX_UPLOAD_BYTES", "2048");
    env::set_var("AGENT_API_KEY", "top-secret");
    env::set_var("RESEND_API_KEY", "re_live_key");
    env::set_var("CORS_ALLOWED_ORIGINS", "https://a.example.ch, https://b.example.ch");

    let config = ServerConfig::from_env().unwrap();
    clear_environment();

    assert_eq!(config.http_port, 9191);
    assert!(config.environment.is_production());
    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(config.database_url, DatabaseUrl::Memory);
    assert_eq!(config.portal.token_expiry_days, 14);
    assert_eq!(config.portal.max_upload_bytes, 2048);
    assert_eq!(config.portal.agent_api_key.as_deref(), Some("top-secret"));
    assert_eq!(
        config.portal_url("SECURE_x_y"),
        "https://esign.example.ch/client-portal/SECURE_x_y"
    );
    assert_eq!(
        config.cors_origins,
        vec!["https://a.example.ch", "https://b.example.ch"]
    );

    let summary = config.summary();
    assert!(summary.contains("Agent Key: Required"));
    assert!(summary.contains("Email Delivery: Enabled"));
    assert!(!summary.contains("top-secret"));
    assert!(!summary.contains("re_live_key"));
}

#[test]
#[serial]
fn test_blank_secrets_are_ignored() {
    common::init_test_logging();
    clear_environment();
    env::set_var("AGENT_API_KEY", "   ");
    env::set_var("RESEND_API_KEY", "");

    let config = ServerConfig::from_env().unwrap();
    clear_environment();

    assert!(config.portal.agent_api_key.is_none());
    assert!(config.email.api_key.is_none());
}

#[test]
#[serial]
fn test_invalid_values_are_rejected() {
    common::init_test_logging();

    for (name, value) in [
        ("TOKEN_EXPIRY_DAYS", "seven"),
        ("TOKEN_EXPIRY_DAYS", "0"),
        ("TOKEN_EXPIRY_DAYS", "1000000000000"),
        ("MAX_UPLOAD_BYTES", "104857600"),
        ("MAX_UPLOAD_BYTES", "-1"),
        ("APP_BASE_URL", "not a url"),
        ("DATABASE_URL", "postgres://localhost/esign"),
        ("STORAGE_BACKEND", "object"),
    ] {
        clear_environment();
        env::set_var(name, value);
        assert!(
            ServerConfig::from_env().is_err(),
            "{name}={value} should be rejected"
        );
    }
    clear_environment();
}

#[test]
#[serial]
fn test_object_storage_with_credentials() {
    common::init_test_logging();
    clear_environment();
    env::set_var("STORAGE_BACKEND", "supabase");
    env::set_var("OBJECT_STORAGE_URL", "https://project.storage.example");
    env::set_var("OBJECT_STORAGE_KEY", "service-key");
    env::set_var("OBJECT_STORAGE_BUCKET", "dossiers");

    let config = ServerConfig::from_env().unwrap();
    clear_environment();

    assert_eq!(config.storage.backend, StorageBackend::Object);
    assert_eq!(config.storage.bucket, "dossiers");
    assert!(config.summary().contains("Storage: object (dossiers)"));
}

#[test]
fn test_parsing_helpers() {
    assert_eq!(LogLevel::from_str_or_default("TRACE"), LogLevel::Trace);
    assert_eq!(LogLevel::from_str_or_default("chatty"), LogLevel::Info);
    assert_eq!(Environment::from_str_or_default("test"), Environment::Testing);
    assert_eq!(
        StorageBackend::from_str_or_default("bucket"),
        StorageBackend::Object
    );
    assert_eq!(StorageBackend::from_str_or_default("disk"), StorageBackend::Local);

    assert_eq!(
        DatabaseUrl::parse_url("sqlite:./data/esign.db").unwrap(),
        DatabaseUrl::SQLite {
            path: PathBuf::from("./data/esign.db")
        }
    );
    assert_eq!(
        DatabaseUrl::parse_url("data/esign.db").unwrap().to_connection_string(),
        "sqlite:data/esign.db"
    );
    assert!(DatabaseUrl::parse_url("sqlite::memory:").unwrap().is_memory());
}

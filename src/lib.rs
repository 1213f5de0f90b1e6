// ABOUTME: Main library entry point for the eSign termination-case portal
// ABOUTME: Exposes configuration, persistence, storage, email, documents, and HTTP routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

#![recursion_limit = "256"]
#![deny(unsafe_code)]

//! # eSign Portal
//!
//! An HTTP service that runs the electronic-signature workflow for insurance
//! policy terminations. An agent creates a case, the client receives a portal
//! link by email, uploads identity documents, reviews the termination letter,
//! and signs. The signed document is archived and the whole case can be
//! exported as a ZIP bundle.
//!
//! ## Architecture
//!
//! - **Database**: `SQLite` through `sqlx`, one `impl Database` block per table
//! - **Storage**: local disk or a hosted object-storage bucket
//! - **Email**: Resend-compatible delivery API, simulated when no key is set
//! - **Documents**: termination letter, minimal signed PDF, ZIP export
//! - **Routes**: `axum` JSON API for agents and portal clients

/// Environment configuration
pub mod config;

/// Application constants and environment accessors
pub mod constants;

/// Persistence layer
pub mod database;

/// Termination letter, signed PDF, and case archive generation
pub mod documents;

/// Outgoing email delivery and templates
pub mod email;

/// Error types re-exported from the core crate
pub mod errors;

/// Structured logging setup
pub mod logging;

/// HTTP middleware (CORS, request ids, agent key)
pub mod middleware;

/// Domain models re-exported from the core crate
pub mod models;

/// HTTP route handlers
pub mod routes;

/// Server assembly and lifecycle
pub mod server;

/// Case orchestration services
pub mod services;

/// Document storage backends
pub mod storage;

/// Workflow helpers: tokens, case numbers, status reporting
pub mod workflow;

// ABOUTME: Core types and constants for the eSign termination-case portal
// ABOUTME: Foundation crate with error handling, domain models, and constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

#![deny(unsafe_code)]

//! # eSign Core
//!
//! Foundation crate providing shared types and constants for the eSign
//! portal. This crate is designed to change infrequently, enabling
//! incremental compilation benefits in the workspace.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **models**: Users, clients, agents, cases, documents, signatures, logs
//! - **constants**: Upload limits, token settings, document type rules

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Application constants organized by domain
pub mod constants;

/// Core data models (cases, documents, signatures, audit and email logs)
pub mod models;

// ABOUTME: Core data models for the eSign portal
// ABOUTME: Re-exports users, cases, documents, signatures, audit and email log records
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

//! # Data Models
//!
//! Row-shaped records shared by the database layer, the services and the
//! HTTP routes. Identifiers are UUIDs, timestamps are UTC.

mod case;
mod document;
mod logs;
mod signature;
mod user;

pub use case::{CaseStatus, InsuranceCase};
pub use document::{Document, DocumentType};
pub use logs::{AuditLog, EmailLog, EmailStatus, EmailType};
pub use signature::Signature;
pub use user::{Agent, Client, User, UserRole};

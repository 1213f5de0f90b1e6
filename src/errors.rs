// ABOUTME: Error handling re-exported from the esign-core foundation crate
// ABOUTME: Keeps `crate::errors::AppError` paths stable across the portal
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

//! # Unified Error Handling System
//!
//! The types live in `esign_core::errors` so the foundation crate and the
//! server share one error vocabulary.

pub use esign_core::errors::{AppError, AppResult, ErrorCode, ErrorResponse, ErrorResponseDetails};

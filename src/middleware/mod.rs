// ABOUTME: HTTP middleware for CORS, request correlation, and agent authentication
// ABOUTME: Tower layers and axum middleware functions applied by the router builder
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

/// Optional shared-key guard for agent routes
pub mod agent_key;
/// Cross-origin settings
pub mod cors;
/// Request ids and HTTP spans
pub mod tracing;

pub use agent_key::{require_agent_key, AgentKey};
pub use cors::setup_cors;
pub use tracing::{propagate_request_id_layer, request_id_layer, trace_layer};

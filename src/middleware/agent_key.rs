// ABOUTME: Shared-key guard for agent-facing routes
// ABOUTME: Compares the x-agent-key header in constant time when a key is configured
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

//! Agent routes create cases and export client documents, so deployments can
//! require a shared key on them. When no key is configured the guard lets
//! every request through and the server logs a warning at startup.

use crate::constants::headers;
use crate::errors::AppError;
use crate::logging::AppLogger;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Configured agent key, if any
#[derive(Debug, Clone, Default)]
pub struct AgentKey(Option<Arc<str>>);

impl AgentKey {
    /// Guard state from the configured key; blank keys disable the guard
    #[must_use]
    pub fn new(key: Option<&str>) -> Self {
        Self(key.map(str::trim).filter(|k| !k.is_empty()).map(Arc::from))
    }

    /// Whether requests must present a key
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    /// Check a presented key
    #[must_use]
    pub fn verify(&self, presented: &str) -> bool {
        self.0.as_deref().is_some_and(|expected| {
            expected.len() == presented.len()
                && bool::from(expected.as_bytes().ct_eq(presented.as_bytes()))
        })
    }
}

/// Reject agent requests without a valid `x-agent-key` header
pub async fn require_agent_key(
    State(key): State<AgentKey>,
    req: Request,
    next: Next,
) -> Response {
    if !key.is_enabled() {
        return next.run(req).await;
    }

    let presented = req
        .headers()
        .get(headers::AGENT_KEY)
        .and_then(|v| v.to_str().ok());

    match presented {
        None => AppError::auth_required().into_response(),
        Some(value) if key.verify(value) => next.run(req).await,
        Some(_) => {
            AppLogger::log_security_event(
                "invalid_agent_key",
                "high",
                &format!("Rejected agent request to {}", req.uri().path()),
            );
            AppError::auth_invalid("Invalid agent key").into_response()
        }
    }
}

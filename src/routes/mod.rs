// ABOUTME: Route module organization for the portal HTTP API
// ABOUTME: Groups agent, client, document utility, and health endpoints with shared extractors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

//! HTTP routes
//!
//! Each module holds route definitions and thin handlers that delegate to
//! [`crate::services::CaseService`]. Successful JSON bodies carry
//! `"success": true`; failures are rendered by `AppError`.

/// Agent dashboard routes
pub mod agent;
/// Client portal routes
pub mod client;
/// Letter generation and email preview
pub mod documents;
/// Liveness and readiness
pub mod health;

pub use agent::AgentRoutes;
pub use client::ClientRoutes;
pub use documents::DocumentRoutes;
pub use health::HealthRoutes;

use crate::errors::{AppError, AppResult};
use crate::services::RequestMeta;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Caller address and user agent taken from request headers
#[derive(Debug, Clone, Default)]
pub struct ClientMeta(pub RequestMeta);

#[async_trait]
impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(request_meta(&parts.headers)))
    }
}

/// Audit metadata from proxy and user-agent headers
#[must_use]
pub fn request_meta(headers: &HeaderMap) -> RequestMeta {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let ip_address = header_str("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .or_else(|| header_str("x-real-ip"))
        .map(ToOwned::to_owned);

    RequestMeta {
        ip_address,
        user_agent: header_str(header::USER_AGENT.as_str()).map(ToOwned::to_owned),
    }
}

/// `?token=` query parameter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenQuery {
    /// Portal token
    #[serde(default)]
    pub token: String,
}

/// Serialize a payload and mark it successful
///
/// Object payloads get a top-level `"success": true`; anything else is
/// wrapped as `{"success": true, "data": ...}`.
pub(crate) fn success<T: Serialize>(payload: &T) -> AppResult<Json<Value>> {
    match serde_json::to_value(payload)? {
        Value::Object(mut map) => {
            map.insert("success".to_owned(), Value::Bool(true));
            Ok(Json(Value::Object(map)))
        }
        other => Ok(Json(json!({ "success": true, "data": other }))),
    }
}

/// File download with a `Content-Disposition: attachment` header
pub(crate) fn attachment(content_type: &'static str, file_name: &str, body: Bytes) -> Response {
    let disposition = HeaderValue::from_str(&content_disposition(file_name))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

/// `attachment` disposition with an ASCII `filename` and, for other names,
/// the UTF-8 `filename*` form of RFC 5987
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    if fallback == file_name {
        format!("attachment; filename=\"{fallback}\"")
    } else {
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            urlencoding::encode(file_name)
        )
    }
}

// ABOUTME: Health check route handlers for load balancers and orchestrators
// ABOUTME: Liveness answers unconditionally, readiness pings the database
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

use crate::errors::AppResult;
use crate::server::ServerResources;
use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// `/health` and `/ready`
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/health", get(Self::handle_health))
            .route("/ready", get(Self::handle_ready))
            .with_state(resources)
    }

    async fn handle_health() -> Json<Value> {
        Json(json!({
            "status": "healthy",
            "service": crate::constants::service_names::ESIGN_PORTAL,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }))
    }

    async fn handle_ready(State(resources): State<Arc<ServerResources>>) -> AppResult<Json<Value>> {
        resources.database.ping().await?;
        Ok(Json(json!({
            "status": "ready",
            "database": "ok",
            "storage": resources.storage.backend_name(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })))
    }
}

// ABOUTME: Document utility routes for agents preparing a case
// ABOUTME: Termination letter generation from form data and invitation email preview
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

use super::success;
use crate::documents::ClientData;
use crate::errors::AppResult;
use crate::server::ServerResources;
use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// Query for `/api/email-preview`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewQuery {
    /// Name shown in the greeting
    #[serde(default)]
    pub client_name: String,
    /// `json` returns subject, HTML, and text instead of the HTML page
    #[serde(default)]
    pub format: Option<String>,
}

/// Document utility routes implementation
pub struct DocumentRoutes;

impl DocumentRoutes {
    /// `/api/generate-document` and `/api/email-preview`
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/generate-document", post(Self::handle_generate))
            .route("/api/email-preview", get(Self::handle_email_preview))
            .with_state(resources)
    }

    async fn handle_generate(
        State(resources): State<Arc<ServerResources>>,
        Json(data): Json<ClientData>,
    ) -> AppResult<impl IntoResponse> {
        let generated = resources.cases.generate_document(&data)?;
        success(&generated)
    }

    async fn handle_email_preview(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<PreviewQuery>,
    ) -> AppResult<Response> {
        let template = resources.cases.email_preview(&query.client_name);
        if query.format.as_deref() == Some("json") {
            return Ok(success(&template)?.into_response());
        }
        Ok(Html(template.html).into_response())
    }
}

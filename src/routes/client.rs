// ABOUTME: Client portal route handlers reached through the secure token
// ABOUTME: Portal view, multipart document upload, review, signature, completion, PDF download
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

use super::{attachment, success, ClientMeta, TokenQuery};
use crate::errors::{AppError, AppResult};
use crate::server::ServerResources;
use crate::services::{IncomingFile, SignatureRequest};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// JSON body carrying only the portal token
#[derive(Debug, Clone, Deserialize)]
pub struct TokenBody {
    /// Portal token
    #[serde(default)]
    pub token: String,
}

/// Signature listing selector
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureQuery {
    /// Portal token
    pub token: Option<String>,
    /// Case identifier
    #[serde(alias = "case_id")]
    pub case_id: Option<String>,
}

/// Parsed multipart upload form
#[derive(Debug, Default)]
struct UploadForm {
    token: String,
    document_type: String,
    files: Vec<IncomingFile>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::invalid_input(format!("Malformed multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_owned();
            match name.as_str() {
                "token" => form.token = Self::text(field).await?,
                "documentType" | "document_type" => form.document_type = Self::text(field).await?,
                "files" | "files[]" | "file" => {
                    let file_name = field.file_name().unwrap_or("document").to_owned();
                    let content_type = field.content_type().map(ToOwned::to_owned);
                    let data = field.bytes().await.map_err(|e| {
                        AppError::invalid_input(format!("Failed to read file {file_name}: {e}"))
                    })?;
                    form.files.push(IncomingFile {
                        file_name,
                        content_type,
                        data,
                    });
                }
                other => debug!(field = other, "Ignoring unknown multipart field"),
            }
        }
        Ok(form)
    }

    async fn text(field: axum::extract::multipart::Field<'_>) -> AppResult<String> {
        field
            .text()
            .await
            .map(|value| value.trim().to_owned())
            .map_err(|e| AppError::invalid_input(format!("Malformed form field: {e}")))
    }
}

/// Client routes implementation
pub struct ClientRoutes;

impl ClientRoutes {
    /// Routes under `/api/client`
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/client/portal/:token", get(Self::handle_portal))
            .route(
                "/api/client/upload-separated-documents",
                post(Self::handle_upload).get(Self::handle_list_uploads),
            )
            .route("/api/client/review", post(Self::handle_review))
            .route(
                "/api/client/save-signature",
                post(Self::handle_save_signature).get(Self::handle_list_signatures),
            )
            .route(
                "/api/client/complete-signature",
                post(Self::handle_complete),
            )
            .route("/api/client/download-document", get(Self::handle_download))
            .with_state(resources)
    }

    async fn handle_portal(
        State(resources): State<Arc<ServerResources>>,
        Path(token): Path<String>,
    ) -> AppResult<impl IntoResponse> {
        let view = resources.cases.portal_view(&token).await?;
        success(&view)
    }

    async fn handle_upload(
        State(resources): State<Arc<ServerResources>>,
        ClientMeta(meta): ClientMeta,
        multipart: Multipart,
    ) -> AppResult<impl IntoResponse> {
        let form = UploadForm::read(multipart).await?;

        let mut missing = Vec::new();
        if form.token.is_empty() {
            missing.push("token");
        }
        if form.document_type.is_empty() {
            missing.push("documentType");
        }
        if form.files.is_empty() {
            missing.push("files");
        }
        if !missing.is_empty() {
            return Err(AppError::missing_fields(&missing));
        }

        let result = resources
            .cases
            .upload_documents(&form.token, &form.document_type, form.files, &meta)
            .await?;
        Ok((StatusCode::CREATED, success(&result)?))
    }

    async fn handle_list_uploads(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<TokenQuery>,
    ) -> AppResult<impl IntoResponse> {
        let uploaded = resources.cases.list_uploaded(&query.token).await?;
        success(&uploaded)
    }

    async fn handle_review(
        State(resources): State<Arc<ServerResources>>,
        ClientMeta(meta): ClientMeta,
        Json(body): Json<TokenBody>,
    ) -> AppResult<impl IntoResponse> {
        let status = resources.cases.mark_reviewed(&body.token, &meta).await?;
        success(&json!({
            "status": status,
            "current_step": status.step_number(),
            "next_step": status.next_step(),
        }))
    }

    async fn handle_save_signature(
        State(resources): State<Arc<ServerResources>>,
        ClientMeta(meta): ClientMeta,
        Json(request): Json<SignatureRequest>,
    ) -> AppResult<impl IntoResponse> {
        if request.signature_data.trim().is_empty() {
            return Err(AppError::missing_fields(&["signatureData"]));
        }
        let result = resources.cases.save_signature(&request, &meta).await?;
        Ok((StatusCode::CREATED, success(&result)?))
    }

    async fn handle_list_signatures(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<SignatureQuery>,
    ) -> AppResult<impl IntoResponse> {
        let token = query.token.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let case_id = query.case_id.as_deref().map(str::trim).filter(|c| !c.is_empty());

        let (case_number, signatures) = match (token, case_id) {
            (Some(token), _) => resources.cases.signatures_for_token(token).await?,
            (None, Some(case_id)) => {
                let case_id = Uuid::parse_str(case_id)
                    .map_err(|_| AppError::invalid_input(format!("Invalid case id: {case_id}")))?;
                resources.cases.signatures_for_case(case_id).await?
            }
            (None, None) => return Err(AppError::missing_fields(&["token", "caseId"])),
        };

        success(&json!({
            "case_number": case_number,
            "total": signatures.len(),
            "signatures": signatures,
        }))
    }

    async fn handle_complete(
        State(resources): State<Arc<ServerResources>>,
        ClientMeta(meta): ClientMeta,
        Json(body): Json<TokenBody>,
    ) -> AppResult<impl IntoResponse> {
        let result = resources.cases.complete_case(&body.token, &meta).await?;
        success(&result)
    }

    async fn handle_download(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<TokenQuery>,
    ) -> AppResult<Response> {
        let pdf = resources.cases.signed_pdf(&query.token).await?;
        Ok(attachment("application/pdf", &pdf.file_name, pdf.bytes))
    }
}

// ABOUTME: Agent dashboard route handlers
// ABOUTME: Agent registry, case creation and listing, invitations, documents history, ZIP export
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

use super::{attachment, success, ClientMeta};
use crate::database::{CaseFilter, HistoryQuery, NewAgent};
use crate::errors::{AppError, AppResult};
use crate::middleware::{require_agent_key, AgentKey};
use crate::server::ServerResources;
use crate::services::CreateCaseRequest;
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// `caseId` carried in a query string or JSON body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseIdParam {
    /// Case identifier
    #[serde(default, alias = "case_id")]
    pub case_id: Option<String>,
}

impl CaseIdParam {
    fn parse(&self) -> AppResult<Uuid> {
        match self.case_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => parse_case_id(id),
            _ => Err(AppError::missing_fields(&["caseId"])),
        }
    }
}

fn parse_case_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::invalid_input(format!("Invalid case id: {raw}")))
}

fn query_or_invalid<T>(query: Result<Query<T>, QueryRejection>) -> AppResult<T> {
    query
        .map(|Query(value)| value)
        .map_err(|e| AppError::invalid_input(e.body_text()))
}

/// Agent routes implementation
pub struct AgentRoutes;

impl AgentRoutes {
    /// Routes under `/api/agent` plus `/api/send-email`, behind the agent key
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        let key = AgentKey::new(resources.config.portal.agent_api_key.as_deref());

        Router::new()
            .route(
                "/api/agent/agents",
                post(Self::handle_create_agent).get(Self::handle_list_agents),
            )
            .route(
                "/api/agent/cases",
                post(Self::handle_create_case).get(Self::handle_list_cases),
            )
            .route("/api/agent/cases/:case_id", get(Self::handle_case_details))
            .route("/api/send-email", post(Self::handle_send_email))
            .route(
                "/api/agent/download-documents",
                get(Self::handle_download_query).post(Self::handle_download_body),
            )
            .route(
                "/api/agent/documents-history",
                get(Self::handle_documents_history),
            )
            .layer(middleware::from_fn_with_state(key, require_agent_key))
            .with_state(resources)
    }

    async fn handle_create_agent(
        State(resources): State<Arc<ServerResources>>,
        ClientMeta(meta): ClientMeta,
        Json(request): Json<NewAgent>,
    ) -> AppResult<impl IntoResponse> {
        let agent = resources.cases.create_agent(&request, &meta).await?;
        Ok((StatusCode::CREATED, success(&json!({ "agent": agent }))?))
    }

    async fn handle_list_agents(
        State(resources): State<Arc<ServerResources>>,
    ) -> AppResult<impl IntoResponse> {
        let agents = resources.cases.list_agents().await?;
        success(&json!({ "total": agents.len(), "agents": agents }))
    }

    async fn handle_create_case(
        State(resources): State<Arc<ServerResources>>,
        ClientMeta(meta): ClientMeta,
        Json(request): Json<CreateCaseRequest>,
    ) -> AppResult<impl IntoResponse> {
        let created = resources.cases.create_case(&request, &meta).await?;
        let message = if created.email_sent {
            "Case created and invitation sent"
        } else {
            "Case created; the invitation email could not be delivered"
        };
        Ok((
            StatusCode::CREATED,
            success(&json!({
                "message": message,
                "case": created.case,
                "client_code": created.client_code,
                "portal_link": created.portal_link,
                "email_sent": created.email_sent,
            }))?,
        ))
    }

    async fn handle_list_cases(
        State(resources): State<Arc<ServerResources>>,
        query: Result<Query<CaseFilter>, QueryRejection>,
    ) -> AppResult<impl IntoResponse> {
        let filter = query_or_invalid(query)?;
        let (cases, total) = resources.cases.list_cases(&filter).await?;
        success(&json!({ "cases": cases, "total": total }))
    }

    async fn handle_case_details(
        State(resources): State<Arc<ServerResources>>,
        Path(case_id): Path<String>,
    ) -> AppResult<impl IntoResponse> {
        let overview = resources.cases.case_overview(parse_case_id(&case_id)?).await?;
        success(&overview)
    }

    async fn handle_send_email(
        State(resources): State<Arc<ServerResources>>,
        ClientMeta(meta): ClientMeta,
        Json(param): Json<CaseIdParam>,
    ) -> AppResult<impl IntoResponse> {
        let result = resources
            .cases
            .resend_invitation(param.parse()?, &meta)
            .await?;
        success(&result)
    }

    async fn handle_download_query(
        State(resources): State<Arc<ServerResources>>,
        ClientMeta(meta): ClientMeta,
        query: Result<Query<CaseIdParam>, QueryRejection>,
    ) -> AppResult<Response> {
        let param = query_or_invalid(query)?;
        Self::download(&resources, &param, &meta).await
    }

    async fn handle_download_body(
        State(resources): State<Arc<ServerResources>>,
        ClientMeta(meta): ClientMeta,
        Json(param): Json<CaseIdParam>,
    ) -> AppResult<Response> {
        Self::download(&resources, &param, &meta).await
    }

    async fn download(
        resources: &ServerResources,
        param: &CaseIdParam,
        meta: &crate::services::RequestMeta,
    ) -> AppResult<Response> {
        let archive = resources.cases.export_case_zip(param.parse()?, meta).await?;
        Ok(attachment(
            "application/zip",
            &archive.file_name,
            Bytes::from(archive.bytes),
        ))
    }

    async fn handle_documents_history(
        State(resources): State<Arc<ServerResources>>,
        query: Result<Query<HistoryQuery>, QueryRejection>,
    ) -> AppResult<impl IntoResponse> {
        let query = query_or_invalid(query)?;
        let (documents, total) = resources.cases.documents_history(&query).await?;
        success(&json!({
            "documents": documents,
            "total": total,
            "limit": query.effective_limit(),
            "offset": query.effective_offset(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    #[test]
    fn test_case_id_param_validation() {
        let missing = CaseIdParam::default().parse().unwrap_err();
        assert_eq!(missing.code, ErrorCode::MissingRequiredField);

        let bad = CaseIdParam {
            case_id: Some("not-a-uuid".to_owned()),
        };
        assert_eq!(bad.parse().unwrap_err().code, ErrorCode::InvalidInput);

        let id = Uuid::new_v4();
        let good: CaseIdParam = serde_json::from_value(json!({ "caseId": id.to_string() })).unwrap();
        assert_eq!(good.parse().unwrap(), id);
    }
}

// ABOUTME: HTTP-level tests of the assembled router
// ABOUTME: Drives the agent and client APIs through the full middleware stack
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use axum::http::StatusCode;
use axum::Router;
use chrono::Utc;
use common::{create_test_environment, sample_client_data, TestEnvironment, TINY_PNG};
use esign_portal::server::build_router;
use helpers::axum_test::{AxumTestRequest, Part};
use serde_json::{json, Value};
use std::io::Cursor;

const AGENT_KEY: &str = "agent-secret-key";

fn router(env: &TestEnvironment) -> Router {
    build_router(env.resources.clone())
}

fn case_body(email: &str) -> Value {
    json!({
        "client": serde_json::to_value(sample_client_data(email)).unwrap(),
        "phone": "+41 79 123 45 67",
    })
}

/// Create a case over HTTP and return (response body, portal token)
async fn create_case(env: &TestEnvironment) -> (Value, String) {
    let response = AxumTestRequest::post("/api/agent/cases")
        .json(&case_body("marie@example.ch"))
        .send(router(env))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response.json();
    let token = body["portal_link"]
        .as_str()
        .unwrap()
        .rsplit_once("/client-portal/")
        .unwrap()
        .1
        .to_owned();
    (body, token)
}

async fn upload(env: &TestEnvironment, token: &str, document_type: &str) -> (StatusCode, Value) {
    let response = AxumTestRequest::post("/api/client/upload-separated-documents")
        .multipart(&[
            Part::Text("token", token),
            Part::Text("documentType", document_type),
            Part::File("files", "piece.png", "image/png", TINY_PNG),
        ])
        .send(router(env))
        .await;
    (response.status(), response.json())
}

async fn post_json(env: &TestEnvironment, uri: &str, body: &Value) -> (StatusCode, Value) {
    let response = AxumTestRequest::post(uri).json(body).send(router(env)).await;
    (response.status(), response.json())
}

#[tokio::test]
async fn test_health_and_ready() {
    let env = create_test_environment().await.unwrap();

    let health = AxumTestRequest::get("/health").send(router(&env)).await;
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(health.json()["status"], "healthy");
    assert!(health.header("x-request-id").is_some());

    let ready = AxumTestRequest::get("/ready").send(router(&env)).await;
    assert_eq!(ready.status(), StatusCode::OK);
    assert_eq!(ready.json()["database"], "ok");
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let env = create_test_environment().await.unwrap();
    let response = AxumTestRequest::get("/health")
        .header("x-request-id", "req-1234")
        .send(router(&env))
        .await;
    assert_eq!(response.header("x-request-id"), Some("req-1234"));
}

#[tokio::test]
async fn test_cors_headers_on_responses() {
    let env = create_test_environment().await.unwrap();
    let response = AxumTestRequest::get("/health")
        .header("origin", "https://portal.example.ch")
        .send(router(&env))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.header("access-control-allow-origin"), Some("*"));
    assert!(response
        .header("access-control-expose-headers")
        .unwrap()
        .contains("x-request-id"));
}

#[tokio::test]
async fn test_client_workflow_over_http() {
    let env = create_test_environment().await.unwrap();
    let (created, token) = create_case(&env).await;
    assert_eq!(created["success"], true);
    assert_eq!(created["email_sent"], true);
    assert_eq!(created["case"]["status"], "email_sent");
    assert!(created["case"].get("secure_token").is_none());
    assert!(created["client_code"].as_str().unwrap().starts_with("CLI_"));

    let portal = AxumTestRequest::get(&format!("/api/client/portal/{token}"))
        .send(router(&env))
        .await;
    assert_eq!(portal.status(), StatusCode::OK);
    let portal = portal.json();
    assert_eq!(portal["success"], true);
    assert_eq!(portal["status"], "email_sent");
    assert_eq!(portal["expired"], false);

    let (status, front) = upload(&env, &token, "identity_front").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(front["status"], "documents_uploaded");
    assert!(front["documents"][0]["url"].is_null());
    assert_eq!(front["documents"][0]["document_type"], "identity_front");
    let (status, _) = upload(&env, &token, "identity_back").await;
    assert_eq!(status, StatusCode::CREATED);

    let listing = AxumTestRequest::get(&format!(
        "/api/client/upload-separated-documents?token={token}"
    ))
    .send(router(&env))
    .await;
    assert_eq!(listing.json()["total"], 2);

    let (status, review) = post_json(&env, "/api/client/review", &json!({ "token": token })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["status"], "document_reviewed");
    assert_eq!(review["current_step"], 3);
    assert_eq!(review["next_step"], "signed");

    let (status, signature) = post_json(
        &env,
        "/api/client/save-signature",
        &json!({ "token": token, "signatureData": common::signature_data_url() }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(signature["status"], "signed");

    let signatures = AxumTestRequest::get(&format!("/api/client/save-signature?token={token}"))
        .send(router(&env))
        .await
        .json();
    assert_eq!(signatures["total"], 1);
    assert_eq!(signatures["signatures"][0]["signer_name"], "Marie Dupont");

    let (status, completion) =
        post_json(&env, "/api/client/complete-signature", &json!({ "token": token })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completion["status"], "completed");

    let pdf = AxumTestRequest::get(&format!("/api/client/download-document?token={token}"))
        .send(router(&env))
        .await;
    assert_eq!(pdf.status(), StatusCode::OK);
    assert_eq!(pdf.header("content-type"), Some("application/pdf"));
    assert!(pdf
        .header("content-disposition")
        .unwrap()
        .starts_with("attachment; filename=\"document-signe-RES-"));
    assert!(pdf.bytes().starts_with(b"%PDF"));

    let case_id = created["case"]["id"].as_str().unwrap();
    let zip = AxumTestRequest::get(&format!("/api/agent/download-documents?caseId={case_id}"))
        .send(router(&env))
        .await;
    assert_eq!(zip.status(), StatusCode::OK);
    assert_eq!(zip.header("content-type"), Some("application/zip"));
    let archive = zip::ZipArchive::new(Cursor::new(zip.bytes().to_vec())).unwrap();
    assert!(archive.file_names().any(|n| n == "rapport-synthese.txt"));

    let overview = AxumTestRequest::get(&format!("/api/agent/cases/{case_id}"))
        .send(router(&env))
        .await
        .json();
    assert_eq!(overview["portal_status"], "completed");
    assert_eq!(overview["documents"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_error_responses_use_error_envelope() {
    let env = create_test_environment().await.unwrap();

    let unknown = AxumTestRequest::get("/api/client/portal/SECURE_unknown_token")
        .send(router(&env))
        .await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    let body = unknown.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "RESOURCE_NOT_FOUND");

    let mut incomplete = case_body("marie@example.ch");
    incomplete["client"]["ville"] = json!("");
    let (status, body) = post_json(&env, "/api/agent/cases", &incomplete).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MISSING_REQUIRED_FIELD");
    assert_eq!(body["error"]["details"]["missing_fields"][0], "ville");

    let bad_id = AxumTestRequest::get("/api/agent/cases/not-a-uuid")
        .send(router(&env))
        .await;
    assert_eq!(bad_id.status(), StatusCode::BAD_REQUEST);
    assert_eq!(bad_id.json()["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_upload_errors_over_http() {
    let env = create_test_environment().await.unwrap();
    let (_, token) = create_case(&env).await;

    let missing = AxumTestRequest::post("/api/client/upload-separated-documents")
        .multipart(&[Part::Text("token", &token)])
        .send(router(&env))
        .await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    let fields = &missing.json()["error"]["details"]["missing_fields"];
    assert_eq!(fields[0], "documentType");
    assert_eq!(fields[1], "files");

    let wrong_type = AxumTestRequest::post("/api/client/upload-separated-documents")
        .multipart(&[
            Part::Text("token", &token),
            Part::Text("documentType", "identity_front"),
            Part::File("files", "id.pdf", "application/pdf", b"%PDF-1.4"),
        ])
        .send(router(&env))
        .await;
    assert_eq!(wrong_type.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let (status, body) = post_json(&env, "/api/client/review", &json!({ "token": token })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_STATE");
}

#[tokio::test]
async fn test_signature_requires_data() {
    let env = create_test_environment().await.unwrap();
    let (_, token) = create_case(&env).await;

    let (status, body) = post_json(
        &env,
        "/api/client/save-signature",
        &json!({ "token": token, "signatureData": "  " }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["missing_fields"][0], "signatureData");

    let listing = AxumTestRequest::get("/api/client/save-signature")
        .send(router(&env))
        .await;
    assert_eq!(listing.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_agent_key_guard() {
    let env = common::create_environment_with(|config| {
        config.portal.agent_api_key = Some(AGENT_KEY.to_owned());
    })
    .await
    .unwrap();

    let anonymous = AxumTestRequest::get("/api/agent/cases").send(router(&env)).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.json()["error"]["code"], "AUTH_REQUIRED");

    let wrong = AxumTestRequest::get("/api/agent/cases")
        .header("x-agent-key", "not-the-key")
        .send(router(&env))
        .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.json()["error"]["code"], "AUTH_INVALID");

    let resend = AxumTestRequest::post("/api/send-email")
        .json(&json!({ "caseId": uuid::Uuid::new_v4() }))
        .send(router(&env))
        .await;
    assert_eq!(resend.status(), StatusCode::UNAUTHORIZED);

    let allowed = AxumTestRequest::get("/api/agent/cases")
        .header("x-agent-key", AGENT_KEY)
        .send(router(&env))
        .await;
    assert_eq!(allowed.status(), StatusCode::OK);
    assert_eq!(allowed.json()["total"], 0);

    // Client portal and previews stay open
    let preview = AxumTestRequest::get("/api/email-preview").send(router(&env)).await;
    assert_eq!(preview.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_agents_and_case_listing() {
    let env = create_test_environment().await.unwrap();

    let (status, agent) = post_json(
        &env,
        "/api/agent/agents",
        &json!({
            "email": "luc.martin@esignpro.ch",
            "firstName": "Luc",
            "lastName": "Martin",
            "agentCode": "AG042",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(agent["agent"]["agent"]["agent_code"], "AG042");

    let (status, _) = post_json(
        &env,
        "/api/agent/agents",
        &json!({
            "email": "other@esignpro.ch",
            "firstName": "Eva",
            "lastName": "Rossi",
            "agentCode": "AG042",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let mut body = case_body("marie@example.ch");
    body["agentCode"] = json!("AG042");
    let (status, _) = post_json(&env, "/api/agent/cases", &body).await;
    assert_eq!(status, StatusCode::CREATED);

    let listing = AxumTestRequest::get("/api/agent/cases?status=email_sent")
        .send(router(&env))
        .await
        .json();
    assert_eq!(listing["total"], 1);

    let history = AxumTestRequest::get("/api/agent/documents-history?limit=500")
        .send(router(&env))
        .await
        .json();
    assert_eq!(history["limit"], 100);
    assert_eq!(history["total"], 0);
}

#[tokio::test]
async fn test_documents_history_accepts_calendar_dates() {
    let env = create_test_environment().await.unwrap();
    let (_, token) = create_case(&env).await;
    let (status, _) = upload(&env, &token, "identity_front").await;
    assert_eq!(status, StatusCode::CREATED);

    let today = Utc::now().format("%Y-%m-%d").to_string();
    let response = AxumTestRequest::get(&format!(
        "/api/agent/documents-history?startDate={today}&endDate={today}"
    ))
    .send(router(&env))
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.json()["total"], 1);

    let response =
        AxumTestRequest::get("/api/agent/documents-history?startDate=2025-01-01&endDate=2025-01-01")
            .send(router(&env))
            .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.json()["total"], 0);

    let response = AxumTestRequest::get(&format!(
        "/api/agent/documents-history?startDate=2025-01-01&endDate={}",
        Utc::now().to_rfc3339().replace('+', "%2B")
    ))
    .send(router(&env))
    .await;
    assert_eq!(response.json()["total"], 1);

    let response = AxumTestRequest::get("/api/agent/documents-history?startDate=01/01/2025")
        .send(router(&env))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_export_name_with_accented_client() {
    let env = create_test_environment().await.unwrap();
    let mut body = case_body("helene@example.ch");
    body["client"]["prenom"] = json!("Hélène");
    body["client"]["nom"] = json!("Müller");
    let (status, created) = post_json(&env, "/api/agent/cases", &body).await;
    assert_eq!(status, StatusCode::CREATED);

    let case_id = created["case"]["id"].as_str().unwrap();
    let case_number = created["case"]["case_number"].as_str().unwrap();
    let zip = AxumTestRequest::get(&format!("/api/agent/download-documents?caseId={case_id}"))
        .send(router(&env))
        .await;
    assert_eq!(zip.status(), StatusCode::OK);

    let disposition = zip.header("content-disposition").unwrap();
    assert!(disposition.starts_with(&format!(
        "attachment; filename=\"dossier-{case_number}-H_l_ne-M_ller.zip\""
    )));
    assert!(disposition.ends_with(&format!(
        "filename*=UTF-8''dossier-{case_number}-H%C3%A9l%C3%A8ne-M%C3%BCller.zip"
    )));
}

#[tokio::test]
async fn test_resend_invitation_over_http() {
    let env = create_test_environment().await.unwrap();
    let (created, old_token) = create_case(&env).await;

    let (status, body) = post_json(
        &env,
        "/api/send-email",
        &json!({ "caseId": created["case"]["id"] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email_sent"], true);
    assert!(!body["portal_link"].as_str().unwrap().ends_with(&old_token));

    let (status, body) = post_json(&env, "/api/send-email", &json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MISSING_REQUIRED_FIELD");
}

#[tokio::test]
async fn test_document_generation_and_preview() {
    let env = create_test_environment().await.unwrap();

    let (status, generated) = post_json(
        &env,
        "/api/generate-document",
        &serde_json::to_value(sample_client_data("marie@example.ch")).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(generated["success"], true);
    assert!(generated["document_content"].as_str().unwrap().contains("POL-778899"));

    let html = AxumTestRequest::get("/api/email-preview?clientName=Marie%20Dupont")
        .send(router(&env))
        .await;
    assert_eq!(html.status(), StatusCode::OK);
    assert!(html.header("content-type").unwrap().starts_with("text/html"));
    assert!(html.text().contains("Marie Dupont"));

    let json_preview = AxumTestRequest::get("/api/email-preview?format=json")
        .send(router(&env))
        .await
        .json();
    assert_eq!(json_preview["success"], true);
    assert!(json_preview["subject"].as_str().is_some());
}

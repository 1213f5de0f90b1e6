// ABOUTME: Integration tests for the SQLite persistence layer
// ABOUTME: Covers users, clients, agents, case numbering, guarded status updates, and history queries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use chrono::{Duration, Utc};
use esign_portal::database::{
    CaseFilter, ClientProfile, Database, DateFilter, HistoryQuery, NewCase, NewUser,
};
use esign_portal::errors::ErrorCode;
use esign_portal::models::{
    AuditLog, CaseStatus, Document, DocumentType, EmailLog, EmailStatus, EmailType, InsuranceCase,
    Signature, UserRole,
};
use esign_portal::workflow::generate_secure_token;
use serde_json::json;
use uuid::Uuid;

async fn insert_case(db: &Database, email: &str) -> InsuranceCase {
    let user = db
        .find_or_create_user(&NewUser {
            email: email.to_owned(),
            first_name: "Marie".to_owned(),
            last_name: "Dupont".to_owned(),
            phone: None,
            role: UserRole::Client,
        })
        .await
        .unwrap();
    let client = db
        .upsert_client_for_user(user.id, &ClientProfile::default())
        .await
        .unwrap();

    let now = Utc::now();
    db.create_case(&NewCase {
        case_number: db.next_case_number(2025).await.unwrap(),
        client_id: client.id,
        agent_id: None,
        insurance_type: "resiliation".to_owned(),
        insurance_company: Some("Helvetia".to_owned()),
        policy_number: Some("POL-1".to_owned()),
        title: "Résiliation - Marie Dupont".to_owned(),
        description: None,
        secure_token: generate_secure_token(now),
        token_expires_at: now + Duration::days(7),
        form_data: json!({ "nom": "Dupont" }),
    })
    .await
    .unwrap()
}

async fn reviewed_case(db: &Database, email: &str) -> InsuranceCase {
    let case = insert_case(db, email).await;
    for (from, to) in [
        (CaseStatus::EmailSent, CaseStatus::DocumentsUploaded),
        (CaseStatus::DocumentsUploaded, CaseStatus::DocumentReviewed),
    ] {
        assert!(db.update_case_status(case.id, from, to).await.unwrap());
    }
    db.get_case(case.id).await.unwrap().unwrap()
}

fn signature(case_id: Uuid) -> Signature {
    Signature {
        id: Uuid::new_v4(),
        case_id,
        signature_data: common::signature_data_url(),
        signer_name: "Marie Dupont".to_owned(),
        ip_address: None,
        user_agent: None,
        signed_at: Utc::now(),
        is_valid: true,
    }
}

fn document(case_id: Uuid, document_type: DocumentType, file_name: &str) -> Document {
    Document {
        id: Uuid::new_v4(),
        case_id,
        document_type,
        file_name: file_name.to_owned(),
        file_path: format!("CLI_TEST/{}/{file_name}", document_type.as_str()),
        file_size: 1024,
        mime_type: "image/jpeg".to_owned(),
        sha256: "00".repeat(32),
        is_verified: false,
        uploaded_by: None,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_find_or_create_user_is_case_insensitive() {
    let db = common::create_test_database().await.unwrap();
    let new_user = NewUser {
        email: "Marie.Dupont@Example.ch".to_owned(),
        first_name: "Marie".to_owned(),
        last_name: "Dupont".to_owned(),
        phone: None,
        role: UserRole::Client,
    };

    let first = db.find_or_create_user(&new_user).await.unwrap();
    assert_eq!(first.email, "marie.dupont@example.ch");

    let again = db
        .find_or_create_user(&NewUser {
            email: "marie.dupont@example.ch".to_owned(),
            first_name: "Other".to_owned(),
            ..new_user
        })
        .await
        .unwrap();
    assert_eq!(again.id, first.id);
    assert_eq!(again.first_name, "Marie");
}

#[tokio::test]
async fn test_client_upsert_keeps_code_and_merges_profile() {
    let db = common::create_test_database().await.unwrap();
    let user = db
        .find_or_create_user(&NewUser {
            email: "client@example.ch".to_owned(),
            first_name: "Jean".to_owned(),
            last_name: "Muller".to_owned(),
            phone: None,
            role: UserRole::Client,
        })
        .await
        .unwrap();

    let created = db
        .upsert_client_for_user(
            user.id,
            &ClientProfile {
                city: Some("Lausanne".to_owned()),
                ..ClientProfile::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(created.country, "CH");

    let updated = db
        .upsert_client_for_user(
            user.id,
            &ClientProfile {
                postal_code: Some("1003".to_owned()),
                ..ClientProfile::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.client_code, created.client_code);
    assert_eq!(updated.city.as_deref(), Some("Lausanne"));
    assert_eq!(updated.postal_code.as_deref(), Some("1003"));
}

#[tokio::test]
async fn test_agent_code_is_unique() {
    let db = common::create_test_database().await.unwrap();
    let agent = db.create_agent(&common::sample_agent("AG001")).await.unwrap();
    assert_eq!(agent.user.role, UserRole::Agent);

    let found = db.get_agent_by_code("AG001").await.unwrap().unwrap();
    assert_eq!(found.agent.id, agent.agent.id);

    let duplicate = db.create_agent(&common::sample_agent("AG001")).await;
    assert_eq!(
        duplicate.unwrap_err().code,
        ErrorCode::ResourceAlreadyExists
    );
    assert_eq!(db.list_agents().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_case_numbers_increase_per_year() {
    let db = common::create_test_database().await.unwrap();
    assert_eq!(db.next_case_number(2025).await.unwrap(), "RES-2025-001");

    let first = insert_case(&db, "a@example.ch").await;
    let second = insert_case(&db, "b@example.ch").await;
    assert_eq!(first.case_number, "RES-2025-001");
    assert_eq!(second.case_number, "RES-2025-002");
    assert_eq!(db.next_case_number(2026).await.unwrap(), "RES-2026-001");
}

#[tokio::test]
async fn test_duplicate_case_number_is_rejected() {
    let db = common::create_test_database().await.unwrap();
    let existing = insert_case(&db, "a@example.ch").await;

    let now = Utc::now();
    let duplicate = db
        .create_case(&NewCase {
            case_number: existing.case_number.clone(),
            client_id: existing.client_id,
            agent_id: None,
            insurance_type: "resiliation".to_owned(),
            insurance_company: None,
            policy_number: None,
            title: "Duplicate".to_owned(),
            description: None,
            secure_token: generate_secure_token(now),
            token_expires_at: now + Duration::days(7),
            form_data: json!({}),
        })
        .await;
    assert_eq!(
        duplicate.unwrap_err().code,
        ErrorCode::ResourceAlreadyExists
    );
}

#[tokio::test]
async fn test_case_lookup_by_token_and_details() {
    let db = common::create_test_database().await.unwrap();
    let case = insert_case(&db, "client@example.ch").await;
    assert_eq!(case.status, CaseStatus::EmailSent);

    let by_token = db
        .get_case_by_token(&case.secure_token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_token.id, case.id);
    assert_eq!(by_token.form_data["nom"], "Dupont");
    assert!(db.get_case_by_token("SECURE_unknown").await.unwrap().is_none());

    let details = db.get_case_details(case.id).await.unwrap().unwrap();
    assert_eq!(details.client_user.email, "client@example.ch");
    assert!(details.agent.is_none());
}

#[tokio::test]
async fn test_status_update_is_compare_and_set() {
    let db = common::create_test_database().await.unwrap();
    let case = insert_case(&db, "client@example.ch").await;

    assert!(db
        .update_case_status(case.id, CaseStatus::EmailSent, CaseStatus::DocumentsUploaded)
        .await
        .unwrap());
    // A second writer still expecting the old status loses
    assert!(!db
        .update_case_status(case.id, CaseStatus::EmailSent, CaseStatus::DocumentsUploaded)
        .await
        .unwrap());

    db.update_case_status(case.id, CaseStatus::DocumentsUploaded, CaseStatus::DocumentReviewed)
        .await
        .unwrap();
    db.update_case_status(case.id, CaseStatus::DocumentReviewed, CaseStatus::Signed)
        .await
        .unwrap();
    db.update_case_status(case.id, CaseStatus::Signed, CaseStatus::Completed)
        .await
        .unwrap();

    let completed = db.get_case(case.id).await.unwrap().unwrap();
    assert_eq!(completed.status, CaseStatus::Completed);
    assert!(completed.completed_at.is_some());
}

#[tokio::test]
async fn test_record_signature_moves_status_with_the_row() {
    let db = common::create_test_database().await.unwrap();
    let case = reviewed_case(&db, "client@example.ch").await;

    let first = signature(case.id);
    assert!(db
        .record_signature(&first, CaseStatus::DocumentReviewed)
        .await
        .unwrap());
    assert_eq!(db.get_case(case.id).await.unwrap().unwrap().status, CaseStatus::Signed);

    // A second writer still expecting `document_reviewed` stores nothing
    assert!(!db
        .record_signature(&signature(case.id), CaseStatus::DocumentReviewed)
        .await
        .unwrap());
    let signatures = db.list_signatures(case.id).await.unwrap();
    assert_eq!(signatures.len(), 1);
    assert_eq!(signatures[0].id, first.id);
}

#[tokio::test]
async fn test_failed_signature_insert_keeps_status() {
    let db = common::create_test_database().await.unwrap();
    let case = reviewed_case(&db, "client@example.ch").await;
    let other = reviewed_case(&db, "other@example.ch").await;

    let existing = signature(other.id);
    db.insert_signature(&existing).await.unwrap();

    // Same primary key: the insert fails after the status update ran
    let clash = Signature {
        case_id: case.id,
        ..existing
    };
    assert!(db
        .record_signature(&clash, CaseStatus::DocumentReviewed)
        .await
        .is_err());

    let reloaded = db.get_case(case.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, CaseStatus::DocumentReviewed);
    assert!(db.list_signatures(case.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_record_completion_is_atomic() {
    let db = common::create_test_database().await.unwrap();
    let case = reviewed_case(&db, "client@example.ch").await;
    assert!(db
        .record_signature(&signature(case.id), CaseStatus::DocumentReviewed)
        .await
        .unwrap());

    let existing = document(case.id, DocumentType::IdentityFront, "front.jpg");
    db.insert_document(&existing).await.unwrap();
    let clash = Document {
        document_type: DocumentType::SignedDocument,
        ..existing.clone()
    };
    assert!(db
        .record_completion(&clash, CaseStatus::Signed)
        .await
        .is_err());
    let reloaded = db.get_case(case.id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, CaseStatus::Signed);
    assert!(reloaded.completed_at.is_none());

    let pdf = document(case.id, DocumentType::SignedDocument, "document-signe.pdf");
    assert!(db.record_completion(&pdf, CaseStatus::Signed).await.unwrap());
    let completed = db.get_case(case.id).await.unwrap().unwrap();
    assert_eq!(completed.status, CaseStatus::Completed);
    assert!(completed.completed_at.is_some());

    assert!(!db
        .record_completion(
            &document(case.id, DocumentType::SignedDocument, "again.pdf"),
            CaseStatus::Signed,
        )
        .await
        .unwrap());
    assert_eq!(
        db.list_documents(case.id, Some(DocumentType::SignedDocument))
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_rotate_token_replaces_lookup_key() {
    let db = common::create_test_database().await.unwrap();
    let case = insert_case(&db, "client@example.ch").await;

    let token = generate_secure_token(Utc::now());
    let expires = Utc::now() + Duration::days(3);
    db.rotate_case_token(case.id, &token, expires).await.unwrap();

    assert!(db.get_case_by_token(&case.secure_token).await.unwrap().is_none());
    let rotated = db.get_case_by_token(&token).await.unwrap().unwrap();
    assert_eq!(rotated.id, case.id);

    let missing = db.rotate_case_token(Uuid::new_v4(), "SECURE_x", expires).await;
    assert_eq!(missing.unwrap_err().code, ErrorCode::ResourceNotFound);
}

#[tokio::test]
async fn test_list_cases_filters_and_counts() {
    let db = common::create_test_database().await.unwrap();
    let first = insert_case(&db, "first@example.ch").await;
    insert_case(&db, "second@example.ch").await;
    db.update_case_status(first.id, CaseStatus::EmailSent, CaseStatus::DocumentsUploaded)
        .await
        .unwrap();

    let (all, total) = db.list_cases(&CaseFilter::default()).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(all.len(), 2);

    let (uploaded, total) = db
        .list_cases(&CaseFilter {
            status: Some(CaseStatus::DocumentsUploaded),
            ..CaseFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(uploaded[0].client_email, "first@example.ch");

    let (page, total) = db
        .list_cases(&CaseFilter {
            limit: Some(1),
            offset: Some(1),
            ..CaseFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn test_documents_signatures_and_history() {
    let db = common::create_test_database().await.unwrap();
    let case = insert_case(&db, "client@example.ch").await;

    let front = document(case.id, DocumentType::IdentityFront, "front.jpg");
    db.insert_document(&front).await.unwrap();
    db.insert_document(&document(case.id, DocumentType::IdentityBack, "back.jpg"))
        .await
        .unwrap();

    let fronts = db
        .list_documents(case.id, Some(DocumentType::IdentityFront))
        .await
        .unwrap();
    assert_eq!(fronts.len(), 1);
    assert_eq!(fronts[0].id, front.id);
    assert_eq!(
        db.get_document(front.id).await.unwrap().unwrap().file_name,
        "front.jpg"
    );

    db.insert_signature(&Signature {
        id: Uuid::new_v4(),
        case_id: case.id,
        signature_data: common::signature_data_url(),
        signer_name: "Marie Dupont".to_owned(),
        ip_address: None,
        user_agent: None,
        signed_at: Utc::now(),
        is_valid: true,
    })
    .await
    .unwrap();
    assert_eq!(db.list_signatures(case.id).await.unwrap().len(), 1);

    let (entries, total) = db
        .documents_history(&HistoryQuery {
            case_id: Some(case.id),
            ..HistoryQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(entries[0].case_number, case.case_number);
    assert_eq!(entries[0].client_email, "client@example.ch");

    let (_, backs) = db
        .documents_history(&HistoryQuery {
            document_type: Some(DocumentType::IdentityBack),
            ..HistoryQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(backs, 1);

    let (future, none) = db
        .documents_history(&HistoryQuery {
            start_date: Some((Utc::now() + Duration::days(1)).into()),
            ..HistoryQuery::default()
        })
        .await
        .unwrap();
    assert!(future.is_empty());
    assert_eq!(none, 0);
}

#[tokio::test]
async fn test_history_day_filters_cover_whole_days() {
    let db = common::create_test_database().await.unwrap();
    let case = insert_case(&db, "client@example.ch").await;

    for (name, at) in [
        ("before.jpg", "2024-12-31T23:59:59Z"),
        ("morning.jpg", "2025-01-01T00:00:00Z"),
        ("evening.jpg", "2025-01-01T23:59:59.500Z"),
        ("after.jpg", "2025-01-02T00:00:00Z"),
    ] {
        db.insert_document(&Document {
            created_at: at.parse().unwrap(),
            ..document(case.id, DocumentType::IdentityFront, name)
        })
        .await
        .unwrap();
    }

    let new_year: DateFilter = "2025-01-01".parse().unwrap();
    let (entries, total) = db
        .documents_history(&HistoryQuery {
            start_date: Some(new_year),
            end_date: Some(new_year),
            ..HistoryQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 2);
    let mut names: Vec<&str> = entries.iter().map(|e| e.document.file_name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, ["evening.jpg", "morning.jpg"]);

    let (_, from_new_year) = db
        .documents_history(&HistoryQuery {
            start_date: Some(new_year),
            ..HistoryQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(from_new_year, 3);

    let (_, until_noon) = db
        .documents_history(&HistoryQuery {
            end_date: Some("2025-01-01T12:00:00Z".parse().unwrap()),
            ..HistoryQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(until_noon, 2);
}

#[test]
fn test_history_limit_is_clamped() {
    let query = HistoryQuery {
        limit: Some(1000),
        ..HistoryQuery::default()
    };
    assert_eq!(query.effective_limit(), 100);
    assert_eq!(HistoryQuery::default().effective_limit(), 50);
    assert_eq!(HistoryQuery::default().effective_offset(), 0);
}

#[tokio::test]
async fn test_audit_and_email_logs() {
    let db = common::create_test_database().await.unwrap();
    let case = insert_case(&db, "client@example.ch").await;

    db.insert_audit_log(&AuditLog {
        id: Uuid::new_v4(),
        case_id: Some(case.id),
        action: "case_created".to_owned(),
        entity_type: "insurance_case".to_owned(),
        entity_id: Some(case.id.to_string()),
        new_values: Some(json!({ "email_sent": true })),
        ip_address: Some("203.0.113.10".to_owned()),
        user_agent: None,
        created_at: Utc::now(),
    })
    .await
    .unwrap();
    let audit = db.list_audit_logs(case.id).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].new_values.as_ref().unwrap()["email_sent"], true);

    let log = EmailLog {
        id: Uuid::new_v4(),
        case_id: Some(case.id),
        recipient_email: "client@example.ch".to_owned(),
        sender_email: "noreply@esignpro.ch".to_owned(),
        subject: "Résiliation de contrat".to_owned(),
        body_html: "<p>Bonjour</p>".to_owned(),
        body_text: None,
        email_type: EmailType::ClientInvitation,
        status: EmailStatus::Pending,
        external_id: None,
        error_message: None,
        sent_at: None,
        created_at: Utc::now(),
    };
    db.insert_email_log(&log).await.unwrap();
    db.update_email_log_status(log.id, EmailStatus::Sent, Some("msg_123"), None)
        .await
        .unwrap();

    let logs = db.list_email_logs(case.id).await.unwrap();
    assert_eq!(logs[0].status, EmailStatus::Sent);
    assert_eq!(logs[0].external_id.as_deref(), Some("msg_123"));
    assert!(logs[0].sent_at.is_some());
}

#[tokio::test]
async fn test_ping() {
    let db = common::create_test_database().await.unwrap();
    db.ping().await.unwrap();
}

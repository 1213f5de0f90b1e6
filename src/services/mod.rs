// ABOUTME: Case orchestration service shared by the agent and client HTTP routes
// ABOUTME: Combines database, document storage, and email delivery into workflow operations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

//! Domain service layer
//!
//! Route handlers stay thin: they extract request data and call into
//! [`CaseService`], which enforces the case workflow, writes the audit trail
//! and email log, and talks to storage and the delivery API.

/// Agent-side operations: case creation, invitations, listings, exports
pub mod cases;

/// Client portal operations: uploads, review, signature, completion
pub mod portal;

/// Letter generation and email previews
pub mod preview;

pub use cases::{CaseOverview, CreateCaseRequest, CreatedCase, ExportedArchive, InvitationResult};
pub use portal::{
    CompletionResult, IncomingFile, PortalView, SignatureRequest, SignatureResult, SignedPdf,
    UploadResult, UploadedDocuments,
};
pub use preview::GeneratedDocument;

use crate::config::ServerConfig;
use crate::database::Database;
use crate::email::templates::EmailTemplate;
use crate::email::{EmailSender, OutgoingEmail};
use crate::errors::{AppError, AppResult};
use crate::logging::AppLogger;
use crate::models::{AuditLog, Document, EmailLog, EmailStatus, EmailType, InsuranceCase};
use crate::storage::FileStorage;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};
use uuid::Uuid;

/// Caller information recorded in the audit trail
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    /// Client IP address, when known
    pub ip_address: Option<String>,
    /// Client user agent, when known
    pub user_agent: Option<String>,
}

/// A stored document with its download link
#[derive(Debug, Clone, Serialize)]
pub struct DocumentLink {
    /// Document metadata
    #[serde(flatten)]
    pub document: Document,
    /// Time-limited download URL, when the storage backend issues one
    pub url: Option<String>,
}

/// Workflow operations over a case
#[derive(Clone)]
pub struct CaseService {
    database: Arc<Database>,
    storage: Arc<dyn FileStorage>,
    email: Arc<dyn EmailSender>,
    config: Arc<ServerConfig>,
}

impl CaseService {
    /// Service over the given backends
    #[must_use]
    pub fn new(
        database: Arc<Database>,
        storage: Arc<dyn FileStorage>,
        email: Arc<dyn EmailSender>,
        config: Arc<ServerConfig>,
    ) -> Self {
        Self {
            database,
            storage,
            email,
            config,
        }
    }

    /// Database handle
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Document storage
    #[must_use]
    pub fn storage(&self) -> &dyn FileStorage {
        self.storage.as_ref()
    }

    /// Server configuration
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Case behind a portal token
    ///
    /// Unknown tokens are logged as a security event and reported as a
    /// missing case.
    async fn case_for_token(&self, token: &str) -> AppResult<InsuranceCase> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::missing_fields(&["token"]));
        }
        if let Some(case) = self.database.get_case_by_token(token).await? {
            return Ok(case);
        }

        let prefix: String = token.chars().take(16).collect();
        AppLogger::log_security_event(
            "unknown_portal_token",
            "medium",
            &format!("No case for token {prefix}..."),
        );
        Err(AppError::not_found("Case"))
    }

    /// Attach a signed download URL; signing failures leave the link empty
    async fn link(&self, document: Document) -> DocumentLink {
        let ttl = Duration::from_secs(self.config.storage.signed_url_ttl_secs);
        let url = match self.storage.signed_url(&document.file_path, ttl).await {
            Ok(url) => url,
            Err(e) => {
                warn!(document_id = %document.id, error = %e, "Failed to sign download URL");
                None
            }
        };
        DocumentLink { document, url }
    }

    async fn links(&self, documents: Vec<Document>) -> Vec<DocumentLink> {
        let mut linked = Vec::with_capacity(documents.len());
        for document in documents {
            linked.push(self.link(document).await);
        }
        linked
    }

    async fn case_by_id(&self, case_id: Uuid) -> AppResult<InsuranceCase> {
        self.database
            .get_case(case_id)
            .await?
            .ok_or_else(|| AppError::not_found("Case"))
    }

    /// Append an audit entry; failures are logged and do not abort the request
    async fn audit(
        &self,
        case_id: Option<Uuid>,
        action: &str,
        entity_type: &str,
        entity_id: Option<String>,
        new_values: serde_json::Value,
        meta: &RequestMeta,
    ) {
        let entry = AuditLog {
            id: Uuid::new_v4(),
            case_id,
            action: action.to_owned(),
            entity_type: entity_type.to_owned(),
            entity_id,
            new_values: Some(new_values),
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.database.insert_audit_log(&entry).await {
            error!(action, error = %e, "Failed to write audit log");
        }
    }

    fn email_log(
        &self,
        case_id: Option<Uuid>,
        email_type: EmailType,
        recipient: &str,
        template: &EmailTemplate,
        status: EmailStatus,
    ) -> EmailLog {
        EmailLog {
            id: Uuid::new_v4(),
            case_id,
            recipient_email: recipient.to_owned(),
            sender_email: self.email.sender_address().to_owned(),
            subject: template.subject.clone(),
            body_html: template.html.clone(),
            body_text: Some(template.text.clone()),
            email_type,
            status,
            external_id: None,
            error_message: None,
            sent_at: None,
            created_at: Utc::now(),
        }
    }

    /// Record a message as `pending` without sending it
    async fn queue_email(
        &self,
        case_id: Option<Uuid>,
        email_type: EmailType,
        recipient: &str,
        template: &EmailTemplate,
    ) -> AppResult<()> {
        let log = self.email_log(case_id, email_type, recipient, template, EmailStatus::Pending);
        self.database.insert_email_log(&log).await
    }

    /// Send a message and log the outcome
    ///
    /// Returns whether the delivery API accepted the message. Delivery
    /// failures are recorded in the email log, not returned as errors.
    async fn deliver(
        &self,
        case_id: Option<Uuid>,
        email_type: EmailType,
        recipient: &str,
        template: EmailTemplate,
    ) -> AppResult<bool> {
        let log = self.email_log(case_id, email_type, recipient, &template, EmailStatus::Pending);
        self.database.insert_email_log(&log).await?;

        let outgoing = OutgoingEmail {
            to: recipient.to_owned(),
            subject: template.subject,
            html: template.html,
            text: template.text,
        };

        match self.email.send(&outgoing).await {
            Ok(receipt) => {
                AppLogger::log_email(recipient, email_type.as_str(), true, Some(&receipt.id));
                self.database
                    .update_email_log_status(log.id, EmailStatus::Sent, Some(&receipt.id), None)
                    .await?;
                Ok(true)
            }
            Err(e) => {
                AppLogger::log_email(recipient, email_type.as_str(), false, None);
                warn!(recipient, email_type = %email_type, error = %e, "Email delivery failed");
                self.database
                    .update_email_log_status(log.id, EmailStatus::Failed, None, Some(&e.message))
                    .await?;
                Ok(false)
            }
        }
    }
}

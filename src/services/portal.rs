// ABOUTME: Client portal operations reached through the secure token
// ABOUTME: Uploads, review, signature capture, completion, and signed PDF download
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

use super::{CaseService, DocumentLink, RequestMeta};
use crate::constants::{email as email_constants, limits};
use crate::database::CaseDetails;
use crate::documents::{SignatureImage, SignedDocumentPdf};
use crate::email::templates::{self, CompletionContext, SignatureContext};
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::logging::AppLogger;
use crate::models::{CaseStatus, Document, DocumentType, EmailType, InsuranceCase, Signature};
use crate::workflow::{
    ensure_token_active, ensure_transition, extension_for, mime_from_file_name,
    missing_required_documents, portal_status, storage_file_name, storage_key,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

/// What the client sees when opening the portal link
#[derive(Debug, Clone, Serialize)]
pub struct PortalView {
    /// Case ID
    pub case_id: Uuid,
    /// Case number
    pub case_number: String,
    /// Case title
    pub title: String,
    /// Insurer
    pub insurance_company: Option<String>,
    /// Policy number
    pub policy_number: Option<String>,
    /// Workflow status, or `expired` once the link lapsed
    pub status: &'static str,
    /// Portal step (1-4)
    pub current_step: u8,
    /// Whether the link has lapsed
    pub expired: bool,
    /// Link expiry
    pub token_expires_at: DateTime<Utc>,
    /// Client display name
    pub client_name: String,
    /// Client email
    pub client_email: String,
    /// Managing agent display name
    pub agent_name: Option<String>,
    /// Managing agent email
    pub agent_email: Option<String>,
    /// Letter data entered by the agent
    pub form_data: serde_json::Value,
    /// Documents on file
    pub documents: Vec<Document>,
    /// Required documents not yet uploaded
    pub missing_documents: Vec<DocumentType>,
    /// Completion time, once completed
    pub completed_at: Option<DateTime<Utc>>,
}

/// One file received from the upload form
#[derive(Debug, Clone)]
pub struct IncomingFile {
    /// Original file name
    pub file_name: String,
    /// Declared content type
    pub content_type: Option<String>,
    /// File contents
    pub data: Bytes,
}

/// Outcome of an upload
#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    /// Case number
    pub case_number: String,
    /// Type of the uploaded files
    pub document_type: DocumentType,
    /// Rows created
    pub documents: Vec<DocumentLink>,
    /// Case status after the upload
    pub status: CaseStatus,
    /// Required documents still missing
    pub missing_documents: Vec<DocumentType>,
}

/// Client uploads grouped by type
#[derive(Debug, Clone, Serialize)]
pub struct UploadedDocuments {
    /// Case number
    pub case_number: String,
    /// Documents per type
    pub documents: BTreeMap<DocumentType, Vec<DocumentLink>>,
    /// Number of documents
    pub total: usize,
    /// Required documents still missing
    pub missing_documents: Vec<DocumentType>,
}

/// Signature submitted from the portal
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRequest {
    /// Portal token
    pub token: String,
    /// `data:image/png;base64,...` or JPEG equivalent
    pub signature_data: String,
    /// Name typed by the signer (defaults to the client name)
    pub signer_name: Option<String>,
}

/// Outcome of a signature
#[derive(Debug, Clone, Serialize)]
pub struct SignatureResult {
    /// Stored signature
    pub signature_id: Uuid,
    /// Case number
    pub case_number: String,
    /// Case status after signing
    pub status: CaseStatus,
    /// Signature time
    pub signed_at: DateTime<Utc>,
    /// Whether the agent notification was accepted for delivery
    pub agent_notified: bool,
}

/// Outcome of finalization
#[derive(Debug, Clone, Serialize)]
pub struct CompletionResult {
    /// Case number
    pub case_number: String,
    /// Case status after completion
    pub status: CaseStatus,
    /// Stored signed document
    pub document: Document,
    /// Relative download path for the signed PDF
    pub download_path: String,
    /// Whether the confirmation email was accepted for delivery
    pub email_sent: bool,
}

/// Signed PDF ready for download
#[derive(Debug, Clone)]
pub struct SignedPdf {
    /// Download file name
    pub file_name: String,
    /// PDF bytes
    pub bytes: Bytes,
}

fn concurrent_update() -> AppError {
    AppError::invalid_state("Case was modified by another request, reload the portal")
}

fn download_path(token: &str) -> String {
    format!("/api/client/download-document?token={token}")
}

fn effective_mime(file: &IncomingFile) -> String {
    let declared = file
        .content_type
        .as_deref()
        .map(|value| value.split(';').next().unwrap_or(value).trim().to_ascii_lowercase())
        .unwrap_or_default();
    if declared.is_empty() || declared == "application/octet-stream" {
        mime_from_file_name(&file.file_name)
            .map(str::to_owned)
            .unwrap_or(declared)
    } else {
        declared
    }
}

impl CaseService {
    fn agent_contact(&self, details: &CaseDetails) -> (String, String) {
        details.agent.as_ref().map_or_else(
            || {
                (
                    format!("Service clientèle {}", email_constants::PRODUCT_NAME),
                    self.config.email.reply_to.clone(),
                )
            },
            |agent| (agent.user.full_name(), agent.user.email.clone()),
        )
    }

    /// Remove a stored file whose database row was never written
    async fn discard_stored(&self, key: &str) {
        if let Err(e) = self.storage.delete(key).await {
            warn!(key = %key, error = %e, "Failed to remove orphaned stored file");
        }
    }

    async fn advance(&self, case: &InsuranceCase, target: CaseStatus) -> AppResult<()> {
        ensure_transition(case.status, target)?;
        if !self
            .database
            .update_case_status(case.id, case.status, target)
            .await?
        {
            return Err(concurrent_update());
        }
        AppLogger::log_case_event(&case.case_number, "status_changed", target.as_str());
        Ok(())
    }

    /// Portal summary for a token; lapsed links are reported as `expired`
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown token, or a database error
    pub async fn portal_view(&self, token: &str) -> AppResult<PortalView> {
        let case = self.case_for_token(token).await?;
        let details = self.database.load_case_details(case).await?;
        let documents = self.database.list_documents(details.case.id, None).await?;
        let uploaded: Vec<DocumentType> = documents.iter().map(|d| d.document_type).collect();

        let now = Utc::now();
        let (agent_name, agent_email) = details
            .agent
            .as_ref()
            .map(|agent| (agent.user.full_name(), agent.user.email.clone()))
            .unzip();
        let case = &details.case;

        Ok(PortalView {
            case_id: case.id,
            case_number: case.case_number.clone(),
            title: case.title.clone(),
            insurance_company: case.insurance_company.clone(),
            policy_number: case.policy_number.clone(),
            status: portal_status(case, now),
            current_step: case.status.step_number(),
            expired: case.is_token_expired(now),
            token_expires_at: case.token_expires_at,
            client_name: details.client_user.full_name(),
            client_email: details.client_user.email.clone(),
            agent_name,
            agent_email,
            form_data: case.form_data.clone(),
            missing_documents: missing_required_documents(&uploaded),
            documents,
            completed_at: case.completed_at,
        })
    }

    /// Store uploaded files of one document type
    ///
    /// All files are validated before any is stored. The first upload moves
    /// the case from `email_sent` to `documents_uploaded`.
    ///
    /// # Errors
    ///
    /// Returns `AuthExpired` for a lapsed link, `InvalidInput` for an unknown
    /// type, `PayloadTooLarge` or `UnsupportedMediaType` for a rejected file,
    /// `InvalidState` once uploads are closed, or a storage/database error
    pub async fn upload_documents(
        &self,
        token: &str,
        document_type: &str,
        files: Vec<IncomingFile>,
        meta: &RequestMeta,
    ) -> AppResult<UploadResult> {
        let case = self.case_for_token(token).await?;
        let now = Utc::now();
        ensure_token_active(&case, now)?;

        let document_type = DocumentType::from_str(document_type.trim())
            .ok()
            .filter(DocumentType::is_client_uploadable)
            .ok_or_else(|| {
                AppError::invalid_input(format!("Unsupported document type: {document_type}"))
                    .with_details(json!({ "accepted_types": DocumentType::UPLOADABLE }))
            })?;

        if !case.status.accepts_uploads() {
            return Err(AppError::invalid_state(
                "Documents can no longer be uploaded for this case",
            ));
        }

        if files.is_empty() {
            return Err(AppError::missing_fields(&["files"]));
        }
        if files.len() > limits::MAX_FILES_PER_UPLOAD {
            return Err(AppError::invalid_input(format!(
                "At most {} files per upload",
                limits::MAX_FILES_PER_UPLOAD
            )));
        }

        let max_bytes = self.config.portal.max_upload_bytes;
        let mut checked = Vec::with_capacity(files.len());
        for file in files {
            if file.data.is_empty() {
                return Err(AppError::invalid_input(format!("File {} is empty", file.file_name)));
            }
            if file.data.len() > max_bytes {
                return Err(AppError::new(
                    ErrorCode::PayloadTooLarge,
                    format!("File {} exceeds {max_bytes} bytes", file.file_name),
                ));
            }
            let mime_type = effective_mime(&file);
            if !document_type.accepts(&mime_type) {
                return Err(AppError::new(
                    ErrorCode::UnsupportedMediaType,
                    format!("File type {mime_type} is not accepted for {document_type}"),
                )
                .with_details(json!({ "allowed_types": document_type.allowed_mime_types() })));
            }
            checked.push((file, mime_type));
        }

        let client = self
            .database
            .get_client(case.client_id)
            .await?
            .ok_or_else(|| AppError::not_found("Client"))?;

        let mut stored = Vec::with_capacity(checked.len());
        for (file, mime_type) in checked {
            let name = storage_file_name(
                document_type,
                &extension_for(&mime_type, &file.file_name),
                now,
            );
            let key = storage_key(&client.client_code, document_type, &name);
            let sha256 = hex::encode(Sha256::digest(&file.data));
            let size = file.data.len();
            self.storage.put(&key, file.data, &mime_type).await?;

            let document = Document {
                id: Uuid::new_v4(),
                case_id: case.id,
                document_type,
                file_name: file.file_name,
                file_path: key,
                file_size: i64::try_from(size).unwrap_or(i64::MAX),
                mime_type,
                sha256,
                is_verified: false,
                uploaded_by: Some(client.user_id),
                created_at: Utc::now(),
            };
            if let Err(e) = self.database.insert_document(&document).await {
                self.discard_stored(&document.file_path).await;
                return Err(e);
            }
            AppLogger::log_upload(&case.case_number, document_type.as_str(), &document.file_name, size);
            stored.push(document);
        }

        if case.status == CaseStatus::EmailSent {
            // A concurrent upload may already have advanced the case
            self.database
                .update_case_status(case.id, CaseStatus::EmailSent, CaseStatus::DocumentsUploaded)
                .await?;
        }

        self.audit(
            Some(case.id),
            "documents_uploaded",
            "document",
            None,
            json!({
                "document_type": document_type,
                "files": stored.iter().map(|d| json!({
                    "id": d.id,
                    "file_name": d.file_name,
                    "size": d.file_size,
                })).collect::<Vec<_>>(),
            }),
            meta,
        )
        .await;

        let uploaded: Vec<DocumentType> = self
            .database
            .list_documents(case.id, None)
            .await?
            .iter()
            .map(|d| d.document_type)
            .collect();
        let status = self.case_by_id(case.id).await?.status;

        Ok(UploadResult {
            case_number: case.case_number,
            document_type,
            documents: self.links(stored).await,
            status,
            missing_documents: missing_required_documents(&uploaded),
        })
    }

    /// Client uploads of a case, grouped by type
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown token, or a database error
    pub async fn list_uploaded(&self, token: &str) -> AppResult<UploadedDocuments> {
        let case = self.case_for_token(token).await?;
        let documents = self.database.list_documents(case.id, None).await?;

        let mut grouped: BTreeMap<DocumentType, Vec<DocumentLink>> = BTreeMap::new();
        for document in documents
            .into_iter()
            .filter(|d| d.document_type.is_client_uploadable())
        {
            let document_type = document.document_type;
            grouped
                .entry(document_type)
                .or_default()
                .push(self.link(document).await);
        }
        let uploaded: Vec<DocumentType> = grouped.keys().copied().collect();

        Ok(UploadedDocuments {
            case_number: case.case_number,
            total: grouped.values().map(Vec::len).sum(),
            missing_documents: missing_required_documents(&uploaded),
            documents: grouped,
        })
    }

    /// Client confirms the letter and documents; both identity sides required
    ///
    /// # Errors
    ///
    /// Returns `AuthExpired` for a lapsed link, `InvalidState` when the case
    /// is not in `documents_uploaded` or identity documents are missing
    pub async fn mark_reviewed(&self, token: &str, meta: &RequestMeta) -> AppResult<CaseStatus> {
        let case = self.case_for_token(token).await?;
        ensure_token_active(&case, Utc::now())?;
        ensure_transition(case.status, CaseStatus::DocumentReviewed)?;

        let uploaded: Vec<DocumentType> = self
            .database
            .list_documents(case.id, None)
            .await?
            .iter()
            .map(|d| d.document_type)
            .collect();
        let missing = missing_required_documents(&uploaded);
        if !missing.is_empty() {
            return Err(AppError::invalid_state("Required identity documents are missing")
                .with_details(json!({ "missing_documents": missing })));
        }

        self.advance(&case, CaseStatus::DocumentReviewed).await?;
        self.audit(
            Some(case.id),
            "document_reviewed",
            "insurance_case",
            Some(case.id.to_string()),
            json!({ "status": CaseStatus::DocumentReviewed }),
            meta,
        )
        .await;
        Ok(CaseStatus::DocumentReviewed)
    }

    /// Record the client's signature
    ///
    /// The office is notified through a `pending` email log entry; the
    /// managing agent, if any, is emailed directly.
    ///
    /// # Errors
    ///
    /// Returns `AuthExpired` for a lapsed link, `InvalidFormat` for a bad
    /// data URL, `InvalidState` unless the case is `document_reviewed`, or a
    /// database error
    pub async fn save_signature(
        &self,
        request: &SignatureRequest,
        meta: &RequestMeta,
    ) -> AppResult<SignatureResult> {
        let case = self.case_for_token(&request.token).await?;
        let now = Utc::now();
        ensure_token_active(&case, now)?;
        SignatureImage::from_data_url(&request.signature_data)?;
        ensure_transition(case.status, CaseStatus::Signed)?;

        let details = self.database.load_case_details(case).await?;
        let client_name = details.client_user.full_name();
        let signer_name = request
            .signer_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map_or_else(|| client_name.clone(), str::to_owned);

        let signature = Signature {
            id: Uuid::new_v4(),
            case_id: details.case.id,
            signature_data: request.signature_data.trim().to_owned(),
            signer_name,
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
            signed_at: now,
            is_valid: true,
        };
        if !self
            .database
            .record_signature(&signature, details.case.status)
            .await?
        {
            return Err(concurrent_update());
        }
        AppLogger::log_case_event(
            &details.case.case_number,
            "status_changed",
            CaseStatus::Signed.as_str(),
        );

        self.audit(
            Some(details.case.id),
            "document_signed",
            "signature",
            Some(signature.id.to_string()),
            json!({ "signer_name": signature.signer_name, "signed_at": now.to_rfc3339() }),
            meta,
        )
        .await;

        let admin_email = self.config.email.admin_email.clone();
        self.queue_email(
            Some(details.case.id),
            EmailType::SignatureNotification,
            &admin_email,
            &templates::signature_notification(&SignatureContext {
                recipient_name: email_constants::PRODUCT_NAME,
                client_name: &client_name,
                client_email: &details.client_user.email,
                case_number: &details.case.case_number,
                signed_at: now,
            }),
        )
        .await?;

        let agent_notified = match details.agent.as_ref() {
            Some(agent) => {
                self.deliver(
                    Some(details.case.id),
                    EmailType::AgentNotification,
                    &agent.user.email,
                    templates::signature_notification(&SignatureContext {
                        recipient_name: &agent.user.full_name(),
                        client_name: &client_name,
                        client_email: &details.client_user.email,
                        case_number: &details.case.case_number,
                        signed_at: now,
                    }),
                )
                .await?
            }
            None => false,
        };

        Ok(SignatureResult {
            signature_id: signature.id,
            case_number: details.case.case_number,
            status: CaseStatus::Signed,
            signed_at: now,
            agent_notified,
        })
    }

    /// Signatures of the case behind a token
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown token, or a database error
    pub async fn signatures_for_token(&self, token: &str) -> AppResult<(String, Vec<Signature>)> {
        let case = self.case_for_token(token).await?;
        let signatures = self.database.list_signatures(case.id).await?;
        Ok((case.case_number, signatures))
    }

    /// Signatures of a case
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown case, or a database error
    pub async fn signatures_for_case(&self, case_id: Uuid) -> AppResult<(String, Vec<Signature>)> {
        let case = self.case_by_id(case_id).await?;
        let signatures = self.database.list_signatures(case.id).await?;
        Ok((case.case_number, signatures))
    }

    fn render_signed_pdf(
        &self,
        details: &CaseDetails,
        signature: Option<&Signature>,
        now: DateTime<Utc>,
    ) -> Vec<u8> {
        let case = &details.case;
        let client_name = details.client_user.full_name();
        let (agent_name, agent_email) = self.agent_contact(details);

        SignedDocumentPdf {
            case_number: case.case_number.clone(),
            client_email: details.client_user.email.clone(),
            case_label: case
                .insurance_company
                .clone()
                .unwrap_or_else(|| "Résiliation Assurance".to_owned()),
            policy_number: case.policy_number.clone(),
            signer_name: signature.map_or_else(|| client_name.clone(), |s| s.signer_name.clone()),
            signed_at: signature.map_or(now, |s| s.signed_at),
            client_name,
            agent_name,
            agent_email,
            token: case.secure_token.clone(),
            finalized_at: case.completed_at.unwrap_or(now),
        }
        .render()
    }

    /// Finalize a signed case: store the signed PDF and confirm by email
    ///
    /// # Errors
    ///
    /// Returns `AuthExpired` for a lapsed link, `InvalidState` unless the case
    /// is `signed`, or a storage/database error
    pub async fn complete_case(&self, token: &str, meta: &RequestMeta) -> AppResult<CompletionResult> {
        let case = self.case_for_token(token).await?;
        let now = Utc::now();
        ensure_token_active(&case, now)?;
        ensure_transition(case.status, CaseStatus::Completed)?;

        let details = self.database.load_case_details(case).await?;
        let signatures = self.database.list_signatures(details.case.id).await?;
        let pdf = self.render_signed_pdf(&details, signatures.last(), now);

        let name = storage_file_name(DocumentType::SignedDocument, "pdf", now);
        let key = storage_key(&details.client.client_code, DocumentType::SignedDocument, &name);
        let size = pdf.len();
        let sha256 = hex::encode(Sha256::digest(&pdf));
        self.storage
            .put(&key, Bytes::from(pdf), "application/pdf")
            .await?;

        let document = Document {
            id: Uuid::new_v4(),
            case_id: details.case.id,
            document_type: DocumentType::SignedDocument,
            file_name: format!("document-signe-{}.pdf", details.case.case_number),
            file_path: key,
            file_size: i64::try_from(size).unwrap_or(i64::MAX),
            mime_type: "application/pdf".to_owned(),
            sha256,
            is_verified: true,
            uploaded_by: None,
            created_at: now,
        };
        let recorded = match self
            .database
            .record_completion(&document, details.case.status)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => Err(concurrent_update()),
            Err(e) => Err(e),
        };
        if let Err(e) = recorded {
            self.discard_stored(&document.file_path).await;
            return Err(e);
        }
        AppLogger::log_case_event(
            &details.case.case_number,
            "status_changed",
            CaseStatus::Completed.as_str(),
        );

        let download_path = download_path(&details.case.secure_token);
        let download_link = format!("{}{download_path}", self.config.portal.app_base_url);
        let email_sent = self
            .deliver(
                Some(details.case.id),
                EmailType::CompletionConfirmation,
                &details.client_user.email,
                templates::completion_confirmation(&CompletionContext {
                    client_name: &details.client_user.full_name(),
                    case_number: &details.case.case_number,
                    download_link: &download_link,
                }),
            )
            .await?;

        self.audit(
            Some(details.case.id),
            "signature_completed",
            "insurance_case",
            Some(details.case.id.to_string()),
            json!({
                "document_id": document.id,
                "completed_at": now.to_rfc3339(),
                "email_sent": email_sent,
            }),
            meta,
        )
        .await;

        Ok(CompletionResult {
            case_number: details.case.case_number,
            status: CaseStatus::Completed,
            document,
            download_path,
            email_sent,
        })
    }

    /// Signed PDF of the case behind a token
    ///
    /// Completed cases serve the stored copy, also after the link lapsed.
    /// Signed cases not yet completed get a freshly rendered copy.
    ///
    /// # Errors
    ///
    /// Returns `AuthExpired` for a lapsed link on an unfinished case,
    /// `InvalidState` before the client signed, or a storage/database error
    pub async fn signed_pdf(&self, token: &str) -> AppResult<SignedPdf> {
        let case = self.case_for_token(token).await?;
        let now = Utc::now();
        if case.status != CaseStatus::Completed {
            ensure_token_active(&case, now)?;
        }
        if !matches!(case.status, CaseStatus::Signed | CaseStatus::Completed) {
            return Err(AppError::invalid_state("The document has not been signed yet"));
        }

        let file_name = format!("document-signe-{}.pdf", case.case_number);
        let stored = self
            .database
            .list_documents(case.id, Some(DocumentType::SignedDocument))
            .await?
            .pop();
        if let Some(document) = stored {
            let bytes = self.storage.get(&document.file_path).await?;
            return Ok(SignedPdf { file_name, bytes });
        }

        let details = self.database.load_case_details(case).await?;
        let signatures = self.database.list_signatures(details.case.id).await?;
        let pdf = self.render_signed_pdf(&details, signatures.last(), now);
        Ok(SignedPdf {
            file_name,
            bytes: Bytes::from(pdf),
        })
    }
}

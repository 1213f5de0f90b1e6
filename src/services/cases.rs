// ABOUTME: Agent-side case operations: creation, invitations, details, listings, and ZIP export
// ABOUTME: Allocates case numbers and portal tokens and records every step in the audit trail
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

use super::{CaseService, DocumentLink, RequestMeta};
use crate::constants::cases as case_constants;
use crate::database::{
    AgentWithUser, CaseDetails, CaseFilter, CaseListItem, ClientProfile, HistoryEntry,
    HistoryQuery, NewAgent, NewCase, NewUser,
};
use crate::documents::{ArchivedFile, CaseArchive, ClientData};
use crate::email::templates::{self, InvitationContext};
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::logging::AppLogger;
use crate::models::{
    AuditLog, Document, DocumentType, EmailLog, EmailType, InsuranceCase, Signature, UserRole,
};
use crate::workflow::{
    case_year, generate_secure_token, normalize_birth_date, portal_status, token_expiry,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

/// Attempts at allocating a case number before giving up
const CASE_NUMBER_ATTEMPTS: usize = 5;

/// Agent request to open a case
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCaseRequest {
    /// Client data from the agent form
    pub client: ClientData,
    /// Client phone number
    pub phone: Option<String>,
    /// Managing agent by ID
    pub agent_id: Option<Uuid>,
    /// Managing agent by code, used when `agent_id` is absent
    pub agent_code: Option<String>,
    /// Insurance type (defaults to `resiliation`)
    pub insurance_type: Option<String>,
    /// Insurer name (defaults to the first line of the recipient block)
    pub insurance_company: Option<String>,
    /// Case title
    pub title: Option<String>,
    /// Free-form description
    pub description: Option<String>,
}

/// Outcome of case creation
#[derive(Debug, Clone, Serialize)]
pub struct CreatedCase {
    /// The new case
    pub case: InsuranceCase,
    /// Client code of the case owner
    pub client_code: String,
    /// Link emailed to the client
    pub portal_link: String,
    /// Whether the delivery API accepted the invitation
    pub email_sent: bool,
}

/// Outcome of sending an invitation
#[derive(Debug, Clone, Serialize)]
pub struct InvitationResult {
    /// Case number
    pub case_number: String,
    /// Link emailed to the client
    pub portal_link: String,
    /// New token expiry
    pub token_expires_at: DateTime<Utc>,
    /// Whether the delivery API accepted the invitation
    pub email_sent: bool,
}

/// Everything an agent sees about one case
#[derive(Debug, Clone, Serialize)]
pub struct CaseOverview {
    /// Case, client, and agent
    #[serde(flatten)]
    pub details: CaseDetails,
    /// Status as shown on the portal (`expired` once the link lapsed)
    pub portal_status: &'static str,
    /// Portal step (1-4)
    pub current_step: u8,
    /// Current portal link
    pub portal_link: String,
    /// Uploaded and generated documents
    pub documents: Vec<DocumentLink>,
    /// Captured signatures
    pub signatures: Vec<Signature>,
    /// Audit trail
    pub audit_logs: Vec<AuditLog>,
    /// Email log
    pub email_logs: Vec<EmailLog>,
}

/// ZIP export ready for download
#[derive(Debug, Clone)]
pub struct ExportedArchive {
    /// Download file name
    pub file_name: String,
    /// Archive bytes
    pub bytes: Vec<u8>,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

impl CaseService {
    /// Register an agent
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are blank, the agent already
    /// exists, or the database operation fails
    pub async fn create_agent(
        &self,
        new_agent: &NewAgent,
        meta: &RequestMeta,
    ) -> AppResult<AgentWithUser> {
        let mut missing = Vec::new();
        for (name, value) in [
            ("email", &new_agent.email),
            ("firstName", &new_agent.first_name),
            ("lastName", &new_agent.last_name),
            ("agentCode", &new_agent.agent_code),
        ] {
            if value.trim().is_empty() {
                missing.push(name);
            }
        }
        if !missing.is_empty() {
            return Err(AppError::missing_fields(&missing));
        }

        let agent = self.database.create_agent(new_agent).await?;
        self.audit(
            None,
            "agent_created",
            "agent",
            Some(agent.agent.id.to_string()),
            json!({ "agent_code": agent.agent.agent_code, "email": agent.user.email }),
            meta,
        )
        .await;
        info!(agent_code = %agent.agent.agent_code, "Agent registered");
        Ok(agent)
    }

    /// All agents
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_agents(&self) -> AppResult<Vec<AgentWithUser>> {
        self.database.list_agents().await
    }

    async fn resolve_agent(&self, request: &CreateCaseRequest) -> AppResult<Option<AgentWithUser>> {
        if let Some(agent_id) = request.agent_id {
            return self
                .database
                .get_agent(agent_id)
                .await?
                .map(Some)
                .ok_or_else(|| AppError::not_found("Agent"));
        }
        match request.agent_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => self
                .database
                .get_agent_by_code(code)
                .await?
                .map(Some)
                .ok_or_else(|| AppError::not_found("Agent")),
            _ => Ok(None),
        }
    }

    /// Open a case and email the portal link to the client
    ///
    /// A failed email does not undo the case; the result reports
    /// `email_sent: false` and the failure is kept in the email log.
    ///
    /// # Errors
    ///
    /// Returns `MissingRequiredField` when client data is incomplete,
    /// `ResourceNotFound` for an unknown agent, or a database error
    pub async fn create_case(
        &self,
        request: &CreateCaseRequest,
        meta: &RequestMeta,
    ) -> AppResult<CreatedCase> {
        let client_data = &request.client;
        let missing = client_data.validate();
        if !missing.is_empty() {
            return Err(AppError::missing_fields(&missing));
        }

        let agent = self.resolve_agent(request).await?;

        let user = self
            .database
            .find_or_create_user(&NewUser {
                email: client_data.email.trim().to_owned(),
                first_name: client_data.prenom.trim().to_owned(),
                last_name: client_data.nom.trim().to_owned(),
                phone: request.phone.as_deref().and_then(non_empty),
                role: UserRole::Client,
            })
            .await?;
        if user.role != UserRole::Client {
            return Err(AppError::invalid_input(
                "This email belongs to a staff account and cannot own a case",
            ));
        }

        let client = self
            .database
            .upsert_client_for_user(
                user.id,
                &ClientProfile {
                    date_of_birth: normalize_birth_date(&client_data.date_naissance),
                    address_line1: non_empty(&client_data.adresse),
                    postal_code: non_empty(&client_data.npa),
                    city: non_empty(&client_data.ville),
                },
            )
            .await?;

        let insurance_company = request
            .insurance_company
            .as_deref()
            .and_then(non_empty)
            .or_else(|| client_data.destinataire.lines().next().and_then(non_empty));
        let form_data = serde_json::to_value(client_data)
            .map_err(|e| AppError::internal(format!("Failed to serialize client data: {e}")))?;

        let now = Utc::now();
        let token_expires_at = token_expiry(now, self.config.portal.token_expiry_days);
        let mut attempt = 0;
        let case = loop {
            attempt += 1;
            let new_case = NewCase {
                case_number: self.database.next_case_number(case_year(now)).await?,
                client_id: client.id,
                agent_id: agent.as_ref().map(|a| a.agent.id),
                insurance_type: request
                    .insurance_type
                    .as_deref()
                    .and_then(non_empty)
                    .unwrap_or_else(|| case_constants::DEFAULT_INSURANCE_TYPE.to_owned()),
                insurance_company: insurance_company.clone(),
                policy_number: non_empty(&client_data.numero_police),
                title: request
                    .title
                    .as_deref()
                    .and_then(non_empty)
                    .unwrap_or_else(|| format!("Résiliation - {}", client_data.full_name())),
                description: request.description.as_deref().and_then(non_empty),
                secure_token: generate_secure_token(now),
                token_expires_at,
                form_data: form_data.clone(),
            };

            match self.database.create_case(&new_case).await {
                Ok(case) => break case,
                Err(e) if e.code == ErrorCode::ResourceAlreadyExists && attempt < CASE_NUMBER_ATTEMPTS => {
                    warn!(case_number = %new_case.case_number, attempt, "Case number taken, retrying");
                }
                Err(e) => return Err(e),
            }
        };

        AppLogger::log_case_event(&case.case_number, "case_created", case.status.as_str());

        let agent_name = agent.as_ref().map(|a| a.user.full_name());
        let portal_link = self.config.portal_url(&case.secure_token);
        let email_sent = self
            .deliver(
                Some(case.id),
                EmailType::ClientInvitation,
                &user.email,
                templates::client_invitation(&InvitationContext {
                    client_name: &user.full_name(),
                    agent_name: agent_name.as_deref(),
                    case_number: &case.case_number,
                    portal_link: &portal_link,
                    expires_at: case.token_expires_at,
                }),
            )
            .await?;

        self.audit(
            Some(case.id),
            "case_created",
            "insurance_case",
            Some(case.id.to_string()),
            json!({
                "case_number": case.case_number,
                "client_email": user.email,
                "agent_id": case.agent_id,
                "email_sent": email_sent,
            }),
            meta,
        )
        .await;

        Ok(CreatedCase {
            case,
            client_code: client.client_code,
            portal_link,
            email_sent,
        })
    }

    /// Issue a fresh portal token and email it again
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown case, `InvalidState` for a
    /// completed case, or a database error
    pub async fn resend_invitation(
        &self,
        case_id: Uuid,
        meta: &RequestMeta,
    ) -> AppResult<InvitationResult> {
        let case = self.case_by_id(case_id).await?;
        if case.status.is_terminal() {
            return Err(AppError::invalid_state("Case is already completed"));
        }

        let now = Utc::now();
        let token = generate_secure_token(now);
        let token_expires_at = token_expiry(now, self.config.portal.token_expiry_days);
        self.database
            .rotate_case_token(case.id, &token, token_expires_at)
            .await?;

        let details = self.database.load_case_details(case).await?;
        let agent_name = details.agent.as_ref().map(|a| a.user.full_name());
        let portal_link = self.config.portal_url(&token);
        let email_sent = self
            .deliver(
                Some(details.case.id),
                EmailType::ClientInvitation,
                &details.client_user.email,
                templates::client_invitation(&InvitationContext {
                    client_name: &details.client_user.full_name(),
                    agent_name: agent_name.as_deref(),
                    case_number: &details.case.case_number,
                    portal_link: &portal_link,
                    expires_at: token_expires_at,
                }),
            )
            .await?;

        self.audit(
            Some(details.case.id),
            "invitation_resent",
            "insurance_case",
            Some(details.case.id.to_string()),
            json!({ "email_sent": email_sent, "token_expires_at": token_expires_at.to_rfc3339() }),
            meta,
        )
        .await;
        AppLogger::log_case_event(
            &details.case.case_number,
            "invitation_resent",
            details.case.status.as_str(),
        );

        Ok(InvitationResult {
            case_number: details.case.case_number,
            portal_link,
            token_expires_at,
            email_sent,
        })
    }

    /// Case with its documents, signatures, audit trail, and email log
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown case, or a database error
    pub async fn case_overview(&self, case_id: Uuid) -> AppResult<CaseOverview> {
        let details = self
            .database
            .get_case_details(case_id)
            .await?
            .ok_or_else(|| AppError::not_found("Case"))?;

        let documents = self.database.list_documents(case_id, None).await?;
        let signatures = self.database.list_signatures(case_id).await?;
        let audit_logs = self.database.list_audit_logs(case_id).await?;
        let email_logs = self.database.list_email_logs(case_id).await?;

        Ok(CaseOverview {
            portal_status: portal_status(&details.case, Utc::now()),
            current_step: details.case.status.step_number(),
            portal_link: self.config.portal_url(&details.case.secure_token),
            details,
            documents: self.links(documents).await,
            signatures,
            audit_logs,
            email_logs,
        })
    }

    /// Paginated case listing with the total matching count
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails
    pub async fn list_cases(&self, filter: &CaseFilter) -> AppResult<(Vec<CaseListItem>, i64)> {
        self.database.list_cases(filter).await
    }

    /// Paginated document history with the total matching count
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an inverted date range, or a database error
    pub async fn documents_history(
        &self,
        query: &HistoryQuery,
    ) -> AppResult<(Vec<HistoryEntry>, i64)> {
        if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
            if start.is_after(end) {
                return Err(AppError::invalid_input("startDate must not be after endDate"));
            }
        }
        self.database.documents_history(query).await
    }

    async fn read_stored(&self, document: Document) -> AppResult<Option<ArchivedFile>> {
        match self.storage.get(&document.file_path).await {
            Ok(data) => Ok(Some(ArchivedFile { document, data })),
            Err(e) if e.code == ErrorCode::ResourceNotFound => {
                warn!(document_id = %document.id, key = %document.file_path, "Stored file missing, left out of export");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// ZIP export of a case for agents
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for an unknown case, or a storage,
    /// database, or archive error
    pub async fn export_case_zip(
        &self,
        case_id: Uuid,
        meta: &RequestMeta,
    ) -> AppResult<ExportedArchive> {
        let details = self
            .database
            .get_case_details(case_id)
            .await?
            .ok_or_else(|| AppError::not_found("Case"))?;
        let signatures = self.database.list_signatures(case_id).await?;

        let mut client_documents = Vec::new();
        let mut signed_pdf = None;
        for document in self.database.list_documents(case_id, None).await? {
            let is_signed = document.document_type == DocumentType::SignedDocument;
            if let Some(file) = self.read_stored(document).await? {
                if is_signed {
                    signed_pdf = Some(file);
                } else {
                    client_documents.push(file);
                }
            }
        }

        let portal_link = self.config.portal_url(&details.case.secure_token);
        let archive = CaseArchive {
            details: &details,
            signatures: &signatures,
            client_documents: &client_documents,
            signed_pdf: signed_pdf.as_ref(),
            portal_link: &portal_link,
            generated_at: Utc::now(),
        };
        let bytes = archive.build()?;
        let file_name = archive.file_name();

        self.audit(
            Some(case_id),
            "case_exported",
            "insurance_case",
            Some(case_id.to_string()),
            json!({
                "file_name": file_name,
                "documents": client_documents.len(),
                "signatures": signatures.len(),
                "signed_document": signed_pdf.is_some(),
            }),
            meta,
        )
        .await;
        AppLogger::log_case_event(
            &details.case.case_number,
            "case_exported",
            details.case.status.as_str(),
        );

        Ok(ExportedArchive { file_name, bytes })
    }
}

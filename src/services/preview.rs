// ABOUTME: Termination letter generation and invitation email preview
// ABOUTME: Stateless helpers exposed to agents before a case is created
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

use super::CaseService;
use crate::constants::cases;
use crate::documents::termination::render_html;
use crate::documents::ClientData;
use crate::email::templates::{self, EmailTemplate, InvitationContext};
use crate::errors::{AppError, AppResult};
use crate::workflow::{case_year, generate_client_code, generate_secure_token, token_expiry};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

/// Letter generated from agent form data
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedDocument {
    /// Plain-text letter
    pub document_content: String,
    /// HTML preview
    pub html_content: String,
    /// Provisional client code
    pub client_id: String,
    /// Number of additional insured persons
    pub person_count: usize,
    /// Generation time
    pub generated_at: DateTime<Utc>,
}

impl CaseService {
    /// Fill the termination letter from form data
    ///
    /// # Errors
    ///
    /// Returns `MissingRequiredField` listing every blank required field
    pub fn generate_document(&self, data: &ClientData) -> AppResult<GeneratedDocument> {
        let missing = data.validate();
        if !missing.is_empty() {
            return Err(AppError::missing_fields(&missing));
        }

        let now = Utc::now();
        let document_content = data.fill_termination_letter(now.date_naive());
        let html_content = render_html(&document_content);
        let client_id = generate_client_code();
        info!(
            client_id = %client_id,
            persons = data.personnes.len(),
            length = document_content.len(),
            "Termination letter generated"
        );

        Ok(GeneratedDocument {
            document_content,
            html_content,
            client_id,
            person_count: data.personnes.len(),
            generated_at: now,
        })
    }

    /// Invitation email as the client would receive it, with a throwaway token
    #[must_use]
    pub fn email_preview(&self, client_name: &str) -> EmailTemplate {
        let now = Utc::now();
        let client_name = match client_name.trim() {
            "" => "Client",
            name => name,
        };
        let portal_link = self.config.portal_url(&generate_secure_token(now));
        let case_number = format!("{}-{}-XXX", cases::CASE_NUMBER_PREFIX, case_year(now));

        templates::client_invitation(&InvitationContext {
            client_name,
            agent_name: None,
            case_number: &case_number,
            portal_link: &portal_link,
            expires_at: token_expiry(now, self.config.portal.token_expiry_days),
        })
    }
}

// ABOUTME: Insurance case model and the termination workflow status machine
// ABOUTME: Tracks one client's termination request from invitation to signed completion
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Workflow status of a case
///
/// The workflow is linear:
/// `email_sent → documents_uploaded → document_reviewed → signed → completed`.
/// Repeated uploads keep a case in `documents_uploaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// Invitation sent, waiting for documents
    EmailSent,
    /// At least one document uploaded
    DocumentsUploaded,
    /// Client confirmed the termination letter
    DocumentReviewed,
    /// Signature recorded
    Signed,
    /// Signed document generated and archived
    Completed,
}

impl CaseStatus {
    /// All statuses in workflow order
    pub const ALL: [Self; 5] = [
        Self::EmailSent,
        Self::DocumentsUploaded,
        Self::DocumentReviewed,
        Self::Signed,
        Self::Completed,
    ];

    /// Database representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EmailSent => "email_sent",
            Self::DocumentsUploaded => "documents_uploaded",
            Self::DocumentReviewed => "document_reviewed",
            Self::Signed => "signed",
            Self::Completed => "completed",
        }
    }

    /// Portal step shown to the client (1 = documents ... 4 = done)
    #[must_use]
    pub const fn step_number(&self) -> u8 {
        match self {
            Self::EmailSent => 1,
            Self::DocumentsUploaded => 2,
            Self::DocumentReviewed => 3,
            Self::Signed | Self::Completed => 4,
        }
    }

    /// Status reached by the next forward action, if any
    #[must_use]
    pub const fn next_step(&self) -> Option<Self> {
        match self {
            Self::EmailSent => Some(Self::DocumentsUploaded),
            Self::DocumentsUploaded => Some(Self::DocumentReviewed),
            Self::DocumentReviewed => Some(Self::Signed),
            Self::Signed => Some(Self::Completed),
            Self::Completed => None,
        }
    }

    /// Whether moving from `self` to `target` is a legal workflow step
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        if *self == Self::DocumentsUploaded && target == Self::DocumentsUploaded {
            return true;
        }
        self.next_step() == Some(target)
    }

    /// Whether the client may still upload documents
    #[must_use]
    pub const fn accepts_uploads(&self) -> bool {
        matches!(self, Self::EmailSent | Self::DocumentsUploaded)
    }

    /// Whether the workflow has finished
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown case status: {s}"))
    }
}

/// One termination request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceCase {
    /// Unique identifier
    pub id: Uuid,
    /// Human-facing number (`RES-2025-001`)
    pub case_number: String,
    /// Client owning the case
    pub client_id: Uuid,
    /// Managing agent
    pub agent_id: Option<Uuid>,
    /// Insurance type (`resiliation`, ...)
    pub insurance_type: String,
    /// Insurer receiving the termination
    pub insurance_company: Option<String>,
    /// Policy number being terminated
    pub policy_number: Option<String>,
    /// Workflow status
    pub status: CaseStatus,
    /// Short title
    pub title: String,
    /// Free-form description
    pub description: Option<String>,
    /// Portal access token
    #[serde(skip_serializing)]
    pub secure_token: String,
    /// Token expiry
    pub token_expires_at: DateTime<Utc>,
    /// Form data captured at creation (client data JSON)
    pub form_data: serde_json::Value,
    /// When the case reached `completed`
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl InsuranceCase {
    /// Whether the portal token is past its expiry at `now`
    #[must_use]
    pub fn is_token_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.token_expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_follow_workflow_order() {
        for pair in CaseStatus::ALL.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
            assert!(!pair[1].can_transition_to(pair[0]));
        }
    }

    #[test]
    fn skipping_steps_is_rejected() {
        assert!(!CaseStatus::EmailSent.can_transition_to(CaseStatus::Signed));
        assert!(!CaseStatus::DocumentsUploaded.can_transition_to(CaseStatus::Signed));
        assert!(!CaseStatus::Completed.can_transition_to(CaseStatus::Completed));
    }

    #[test]
    fn repeated_uploads_are_allowed() {
        assert!(CaseStatus::DocumentsUploaded.can_transition_to(CaseStatus::DocumentsUploaded));
        assert!(CaseStatus::DocumentsUploaded.accepts_uploads());
        assert!(!CaseStatus::DocumentReviewed.accepts_uploads());
    }

    #[test]
    fn status_parses_from_database_value() {
        assert_eq!(
            "document_reviewed".parse::<CaseStatus>(),
            Ok(CaseStatus::DocumentReviewed)
        );
        assert!("expired".parse::<CaseStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&CaseStatus::EmailSent).unwrap(),
            "\"email_sent\""
        );
    }
}

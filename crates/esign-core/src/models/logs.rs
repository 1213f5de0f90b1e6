// ABOUTME: Audit trail and email delivery log records
// ABOUTME: AuditLog captures case actions, EmailLog captures every outgoing message
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// An entry of the case audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    /// Unique identifier
    pub id: Uuid,
    /// Related case
    pub case_id: Option<Uuid>,
    /// Action name (`case_created`, `document_signed`, ...)
    pub action: String,
    /// Entity kind touched by the action
    pub entity_type: String,
    /// Entity identifier
    pub entity_id: Option<String>,
    /// New values as JSON
    pub new_values: Option<serde_json::Value>,
    /// Caller address
    pub ip_address: Option<String>,
    /// Caller user agent
    pub user_agent: Option<String>,
    /// Timestamp
    pub created_at: DateTime<Utc>,
}

/// Delivery status of an email log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    /// Queued, not attempted
    Pending,
    /// Accepted by the delivery API
    Sent,
    /// Delivery API rejected the message
    Failed,
}

impl EmailStatus {
    /// Database representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown email status: {other}")),
        }
    }
}

/// Purpose of an email
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    /// Portal invitation to the client
    ClientInvitation,
    /// Notice to the agent that the client signed
    AgentNotification,
    /// Notice to the administrator that a case was signed
    SignatureNotification,
    /// Confirmation to the client after completion
    CompletionConfirmation,
}

impl EmailType {
    /// Database representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ClientInvitation => "client_invitation",
            Self::AgentNotification => "agent_notification",
            Self::SignatureNotification => "signature_notification",
            Self::CompletionConfirmation => "completion_confirmation",
        }
    }
}

impl fmt::Display for EmailType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client_invitation" => Ok(Self::ClientInvitation),
            "agent_notification" => Ok(Self::AgentNotification),
            "signature_notification" => Ok(Self::SignatureNotification),
            "completion_confirmation" => Ok(Self::CompletionConfirmation),
            other => Err(format!("unknown email type: {other}")),
        }
    }
}

/// A record of an outgoing email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailLog {
    /// Unique identifier
    pub id: Uuid,
    /// Related case
    pub case_id: Option<Uuid>,
    /// Recipient address
    pub recipient_email: String,
    /// Sender address
    pub sender_email: String,
    /// Subject line
    pub subject: String,
    /// HTML body
    pub body_html: String,
    /// Plain-text body
    pub body_text: Option<String>,
    /// Purpose
    pub email_type: EmailType,
    /// Delivery status
    pub status: EmailStatus,
    /// Identifier returned by the delivery API
    pub external_id: Option<String>,
    /// Error reported by the delivery API
    pub error_message: Option<String>,
    /// When the message was accepted
    pub sent_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

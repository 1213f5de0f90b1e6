// ABOUTME: Uploaded and generated document models with per-type upload rules
// ABOUTME: DocumentType carries accepted MIME types, required flag, and display names
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png"];
const DOCUMENT_TYPES: &[&str] = &["application/pdf", "image/jpeg", "image/jpg", "image/png"];

/// Kind of document attached to a case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Identity card, front side
    IdentityFront,
    /// Identity card, back side
    IdentityBack,
    /// Insurance contract being terminated
    InsuranceContract,
    /// Proof of address
    ProofAddress,
    /// Bank statement
    BankStatement,
    /// Anything else the client wants to attach
    Additional,
    /// Final signed PDF produced by the system
    SignedDocument,
}

impl DocumentType {
    /// Types a client may upload through the portal
    pub const UPLOADABLE: [Self; 6] = [
        Self::IdentityFront,
        Self::IdentityBack,
        Self::InsuranceContract,
        Self::ProofAddress,
        Self::BankStatement,
        Self::Additional,
    ];

    /// Types that must be present before the letter can be reviewed
    pub const REQUIRED: [Self; 2] = [Self::IdentityFront, Self::IdentityBack];

    /// Database representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::IdentityFront => "identity_front",
            Self::IdentityBack => "identity_back",
            Self::InsuranceContract => "insurance_contract",
            Self::ProofAddress => "proof_address",
            Self::BankStatement => "bank_statement",
            Self::Additional => "additional",
            Self::SignedDocument => "signed_document",
        }
    }

    /// Label shown to clients
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::IdentityFront => "Carte d'Identité - RECTO",
            Self::IdentityBack => "Carte d'Identité - VERSO",
            Self::InsuranceContract => "Contrat d'Assurance",
            Self::ProofAddress => "Justificatif de Domicile",
            Self::BankStatement => "Relevé Bancaire",
            Self::Additional => "Documents Supplémentaires",
            Self::SignedDocument => "Document Signé",
        }
    }

    /// MIME types accepted for this document type
    #[must_use]
    pub const fn allowed_mime_types(&self) -> &'static [&'static str] {
        match self {
            Self::IdentityFront | Self::IdentityBack => IMAGE_TYPES,
            Self::SignedDocument => &["application/pdf"],
            Self::InsuranceContract | Self::ProofAddress | Self::BankStatement | Self::Additional => {
                DOCUMENT_TYPES
            }
        }
    }

    /// Whether `mime_type` is accepted
    #[must_use]
    pub fn accepts(&self, mime_type: &str) -> bool {
        let normalized = mime_type.trim().to_ascii_lowercase();
        self.allowed_mime_types().contains(&normalized.as_str())
    }

    /// Whether the document is required before review
    #[must_use]
    pub const fn is_required(&self) -> bool {
        matches!(self, Self::IdentityFront | Self::IdentityBack)
    }

    /// Whether clients may upload this type
    #[must_use]
    pub const fn is_client_uploadable(&self) -> bool {
        !matches!(self, Self::SignedDocument)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identity_front" | "id_front" => Ok(Self::IdentityFront),
            "identity_back" | "id_back" => Ok(Self::IdentityBack),
            "insurance_contract" | "insurance_document" => Ok(Self::InsuranceContract),
            "proof_address" => Ok(Self::ProofAddress),
            "bank_statement" => Ok(Self::BankStatement),
            "additional" => Ok(Self::Additional),
            "signed_document" => Ok(Self::SignedDocument),
            other => Err(format!("unsupported document type: {other}")),
        }
    }
}

/// A stored file attached to a case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier
    pub id: Uuid,
    /// Owning case
    pub case_id: Uuid,
    /// Kind of document
    pub document_type: DocumentType,
    /// Original file name
    pub file_name: String,
    /// Storage key
    pub file_path: String,
    /// Size in bytes
    pub file_size: i64,
    /// MIME type
    pub mime_type: String,
    /// Hex SHA-256 of the stored bytes
    pub sha256: String,
    /// Whether an agent verified the document
    pub is_verified: bool,
    /// Uploader (client user) if known
    pub uploaded_by: Option<Uuid>,
    /// Upload timestamp
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_sides_accept_images_only() {
        assert!(DocumentType::IdentityFront.accepts("image/png"));
        assert!(DocumentType::IdentityBack.accepts("IMAGE/JPEG"));
        assert!(!DocumentType::IdentityFront.accepts("application/pdf"));
    }

    #[test]
    fn supporting_documents_accept_pdf() {
        assert!(DocumentType::InsuranceContract.accepts("application/pdf"));
        assert!(DocumentType::Additional.accepts("image/jpg"));
        assert!(!DocumentType::BankStatement.accepts("text/plain"));
    }

    #[test]
    fn legacy_aliases_parse() {
        assert_eq!("id_front".parse(), Ok(DocumentType::IdentityFront));
        assert_eq!("insurance_document".parse(), Ok(DocumentType::InsuranceContract));
        assert!("passport".parse::<DocumentType>().is_err());
    }

    #[test]
    fn signed_document_is_system_only() {
        assert!(!DocumentType::SignedDocument.is_client_uploadable());
        assert!(DocumentType::UPLOADABLE
            .iter()
            .all(DocumentType::is_client_uploadable));
        assert!(DocumentType::REQUIRED.iter().all(DocumentType::is_required));
    }
}

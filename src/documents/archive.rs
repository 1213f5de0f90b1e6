// ABOUTME: ZIP export of a case for agents: metadata, signatures, uploads, and signed PDF
// ABOUTME: Builds the archive in memory with the zip crate
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

//! Archive layout:
//!
//! ```text
//! informations-dossier.json
//! rapport-synthese.txt
//! signatures/signature-{n}-{YYYY-MM-DD}.{png|jpg}
//! documents-client/{type}-{n}-{file name}
//! documents-client/{type}-{n}-info.json
//! documents-generes/{case number}-signe.pdf
//! aucun-document.txt              (only when nothing was uploaded or generated)
//! ```

use super::SignatureImage;
use crate::database::CaseDetails;
use crate::errors::{AppError, AppResult};
use crate::models::{Document, Signature};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::fmt::Write as _;
use std::io::{Cursor, Write};
use tracing::warn;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// A stored document together with its bytes
#[derive(Debug, Clone)]
pub struct ArchivedFile {
    /// Document row
    pub document: Document,
    /// File contents read from storage
    pub data: Bytes,
}

/// Everything that goes into a case export
#[derive(Debug)]
pub struct CaseArchive<'a> {
    /// Case with client and agent
    pub details: &'a CaseDetails,
    /// Captured signatures
    pub signatures: &'a [Signature],
    /// Files uploaded by the client
    pub client_documents: &'a [ArchivedFile],
    /// Signed PDF, when the case has been finalized
    pub signed_pdf: Option<&'a ArchivedFile>,
    /// Portal link for the case
    pub portal_link: &'a str,
    /// Export timestamp
    pub generated_at: DateTime<Utc>,
}

/// Keep only characters that are safe in an archive entry name
fn sanitize_entry_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "fichier".to_owned()
    } else {
        cleaned.to_owned()
    }
}

impl CaseArchive<'_> {
    /// Download name: `dossier-{case number}-{first}-{last}.zip`
    #[must_use]
    pub fn file_name(&self) -> String {
        let user = &self.details.client_user;
        format!(
            "dossier-{}-{}-{}.zip",
            self.details.case.case_number,
            sanitize_entry_name(&user.first_name),
            sanitize_entry_name(&user.last_name)
        )
    }

    fn case_information(&self) -> serde_json::Value {
        let case = &self.details.case;
        let user = &self.details.client_user;
        json!({
            "dossier": {
                "numero": case.case_number,
                "statut": case.status,
                "titre": case.title,
                "type_assurance": case.insurance_type,
                "compagnie_assurance": case.insurance_company,
                "numero_police": case.policy_number,
                "date_creation": case.created_at.to_rfc3339(),
                "derniere_modification": case.updated_at.to_rfc3339(),
                "date_finalisation": case.completed_at.map(|at| at.to_rfc3339()),
            },
            "client": {
                "code": self.details.client.client_code,
                "nom": user.full_name(),
                "email": user.email,
                "telephone": user.phone,
            },
            "conseiller": self.details.agent.as_ref().map(|agent| json!({
                "code": agent.agent.agent_code,
                "nom": agent.user.full_name(),
                "email": agent.user.email,
            })),
            "signatures": self.signatures.iter().map(|sig| json!({
                "id": sig.id,
                "signataire": sig.signer_name,
                "date_signature": sig.signed_at.to_rfc3339(),
                "valide": sig.is_valid,
                "adresse_ip": sig.ip_address,
                "navigateur": sig.user_agent,
            })).collect::<Vec<_>>(),
            "documents_client": self.client_documents.iter().map(|file| json!({
                "id": file.document.id,
                "nom": file.document.file_name,
                "type": file.document.document_type,
                "taille": file.document.file_size,
                "sha256": file.document.sha256,
                "date_upload": file.document.created_at.to_rfc3339(),
            })).collect::<Vec<_>>(),
            "documents_generes": self.signed_pdf.map(|file| vec![json!({
                "id": file.document.id,
                "nom": file.document.file_name,
                "signe": true,
                "date_creation": file.document.created_at.to_rfc3339(),
            })]).unwrap_or_default(),
        })
    }

    fn summary_report(&self) -> String {
        let case = &self.details.case;
        let user = &self.details.client_user;
        let or_dash = |value: Option<&str>| value.unwrap_or("-").to_owned();
        let mut report = String::new();

        let _ = writeln!(report, "RAPPORT DE SYNTHÈSE - DOSSIER {}", case.case_number);
        report.push_str("=====================================\n\n");
        let _ = writeln!(report, "Client: {}", user.full_name());
        let _ = writeln!(report, "Email: {}", user.email);
        let _ = writeln!(report, "Téléphone: {}", or_dash(user.phone.as_deref()));
        report.push('\n');
        report.push_str("Assurance:\n");
        let _ = writeln!(report, "- Compagnie: {}", or_dash(case.insurance_company.as_deref()));
        let _ = writeln!(report, "- Type: {}", case.insurance_type);
        let _ = writeln!(report, "- Numéro de police: {}", or_dash(case.policy_number.as_deref()));
        report.push('\n');
        report.push_str("Dossier:\n");
        let _ = writeln!(report, "- Numéro: {}", case.case_number);
        let _ = writeln!(report, "- Statut: {}", case.status);
        let _ = writeln!(report, "- Créé le: {}", case.created_at.format("%d.%m.%Y %H:%M"));
        let _ = writeln!(report, "- Modifié le: {}", case.updated_at.format("%d.%m.%Y %H:%M"));
        report.push('\n');

        let _ = writeln!(report, "Signatures: {}", self.signatures.len());
        if self.signatures.is_empty() {
            report.push_str("  Aucune signature\n");
        }
        for (index, sig) in self.signatures.iter().enumerate() {
            let _ = writeln!(
                report,
                "  {}. Signée le {} - {}",
                index + 1,
                sig.signed_at.format("%d.%m.%Y %H:%M"),
                if sig.is_valid { "Valide" } else { "En attente" }
            );
        }
        report.push('\n');

        let _ = writeln!(report, "Documents: {}", self.client_documents.len());
        if self.client_documents.is_empty() {
            report.push_str("  Aucun document\n");
        }
        for (index, file) in self.client_documents.iter().enumerate() {
            let _ = writeln!(
                report,
                "  {}. {} ({}) - {} bytes",
                index + 1,
                file.document.file_name,
                file.document.document_type.display_name(),
                file.document.file_size
            );
        }
        report.push('\n');

        let _ = writeln!(report, "Lien portail client: {}", self.portal_link);
        report.push('\n');
        let _ = writeln!(report, "Généré le: {}", self.generated_at.format("%d.%m.%Y %H:%M UTC"));
        report
    }

    /// Build the archive bytes
    ///
    /// # Errors
    ///
    /// Returns an internal error if the archive cannot be written
    pub fn build(&self) -> AppResult<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        let information = serde_json::to_vec_pretty(&self.case_information())
            .map_err(|e| AppError::internal(format!("Failed to serialize case information: {e}")))?;
        add_entry(&mut zip, "informations-dossier.json", &information, options)?;

        for (index, signature) in self.signatures.iter().enumerate() {
            match SignatureImage::from_data_url(&signature.signature_data) {
                Ok(image) => {
                    let name = format!(
                        "signatures/signature-{}-{}.{}",
                        index + 1,
                        signature.signed_at.format("%Y-%m-%d"),
                        image.format.extension()
                    );
                    add_entry(&mut zip, &name, &image.bytes, stored)?;
                }
                Err(e) => {
                    warn!(signature_id = %signature.id, error = %e, "Skipping undecodable signature in export");
                }
            }
        }

        for (index, file) in self.client_documents.iter().enumerate() {
            let doc = &file.document;
            let prefix = format!("documents-client/{}-{}", doc.document_type, index + 1);
            add_entry(
                &mut zip,
                &format!("{prefix}-{}", sanitize_entry_name(&doc.file_name)),
                &file.data,
                options,
            )?;

            let info = json!({
                "nom": doc.file_name,
                "type": doc.document_type,
                "chemin": doc.file_path,
                "mime_type": doc.mime_type,
                "taille": doc.file_size,
                "sha256": doc.sha256,
                "verifie": doc.is_verified,
                "date_upload": doc.created_at.to_rfc3339(),
            });
            let info = serde_json::to_vec_pretty(&info)
                .map_err(|e| AppError::internal(format!("Failed to serialize document info: {e}")))?;
            add_entry(&mut zip, &format!("{prefix}-info.json"), &info, options)?;
        }

        if let Some(pdf) = self.signed_pdf {
            let name = format!(
                "documents-generes/{}-signe.pdf",
                self.details.case.case_number
            );
            add_entry(&mut zip, &name, &pdf.data, options)?;
        }

        if self.client_documents.is_empty() && self.signed_pdf.is_none() {
            add_entry(
                &mut zip,
                "aucun-document.txt",
                "Aucun document n'a été uploadé ou généré pour ce dossier.\n".as_bytes(),
                options,
            )?;
        }

        add_entry(
            &mut zip,
            "rapport-synthese.txt",
            self.summary_report().as_bytes(),
            options,
        )?;

        let cursor = zip
            .finish()
            .map_err(|e| AppError::internal(format!("Failed to finish archive: {e}")))?;
        Ok(cursor.into_inner())
    }
}

fn add_entry(
    zip: &mut ZipWriter<Cursor<Vec<u8>>>,
    name: &str,
    data: &[u8],
    options: SimpleFileOptions,
) -> AppResult<()> {
    zip.start_file(name, options)
        .map_err(|e| AppError::internal(format!("Failed to add {name} to archive: {e}")))?;
    zip.write_all(data)
        .map_err(|e| AppError::internal(format!("Failed to write {name} to archive: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CaseStatus, Client, DocumentType, InsuranceCase, User, UserRole};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use chrono::TimeZone;
    use std::io::Read;
    use uuid::Uuid;
    use zip::ZipArchive;

    fn details() -> CaseDetails {
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();
        let user = User {
            id: Uuid::new_v4(),
            email: "marie@example.ch".to_owned(),
            first_name: "Marie".to_owned(),
            last_name: "Dupont".to_owned(),
            phone: None,
            role: UserRole::Client,
            is_active: true,
            created_at: at,
            updated_at: at,
        };
        let client = Client {
            id: Uuid::new_v4(),
            user_id: user.id,
            client_code: "CLI_ABCDEFGHIJ".to_owned(),
            date_of_birth: None,
            address_line1: None,
            postal_code: None,
            city: None,
            country: "CH".to_owned(),
            created_at: at,
            updated_at: at,
        };
        let case = InsuranceCase {
            id: Uuid::new_v4(),
            case_number: "RES-2025-007".to_owned(),
            client_id: client.id,
            agent_id: None,
            insurance_type: "resiliation".to_owned(),
            insurance_company: Some("Helvetia".to_owned()),
            policy_number: None,
            status: CaseStatus::Signed,
            title: "Résiliation".to_owned(),
            description: None,
            secure_token: "SECURE_x_y".to_owned(),
            token_expires_at: at,
            form_data: serde_json::Value::Null,
            completed_at: None,
            created_at: at,
            updated_at: at,
        };
        CaseDetails {
            case,
            client,
            client_user: user,
            agent: None,
        }
    }

    fn entries(bytes: Vec<u8>) -> ZipArchive<Cursor<Vec<u8>>> {
        ZipArchive::new(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn test_empty_case_has_placeholder() {
        let details = details();
        let archive = CaseArchive {
            details: &details,
            signatures: &[],
            client_documents: &[],
            signed_pdf: None,
            portal_link: "http://localhost:8080/client-portal/SECURE_x_y",
            generated_at: Utc::now(),
        };
        assert_eq!(archive.file_name(), "dossier-RES-2025-007-Marie-Dupont.zip");

        let mut zip = entries(archive.build().unwrap());
        let mut names: Vec<String> = zip.file_names().map(str::to_owned).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["aucun-document.txt", "informations-dossier.json", "rapport-synthese.txt"]
        );

        let mut report = String::new();
        zip.by_name("rapport-synthese.txt")
            .unwrap()
            .read_to_string(&mut report)
            .unwrap();
        assert!(report.contains("RAPPORT DE SYNTHÈSE - DOSSIER RES-2025-007"));
        assert!(report.contains("Aucune signature"));
        assert!(report.contains("client-portal/SECURE_x_y"));
    }

    #[test]
    fn test_full_case_layout() {
        let details = details();
        let signed_at = Utc.with_ymd_and_hms(2025, 3, 15, 10, 0, 0).unwrap();
        let signature = Signature {
            id: Uuid::new_v4(),
            case_id: details.case.id,
            signature_data: format!("data:image/png;base64,{}", STANDARD.encode(b"png-bytes")),
            signer_name: "Marie Dupont".to_owned(),
            ip_address: None,
            user_agent: None,
            signed_at,
            is_valid: true,
        };
        let document = |document_type, name: &str| Document {
            id: Uuid::new_v4(),
            case_id: details.case.id,
            document_type,
            file_name: name.to_owned(),
            file_path: format!("CLI_ABCDEFGHIJ/{document_type}/{name}"),
            file_size: 3,
            mime_type: "image/jpeg".to_owned(),
            sha256: "00".to_owned(),
            is_verified: false,
            uploaded_by: None,
            created_at: signed_at,
        };
        let uploads = vec![ArchivedFile {
            document: document(DocumentType::IdentityFront, "carte recto.jpg"),
            data: Bytes::from_static(b"jpg"),
        }];
        let pdf = ArchivedFile {
            document: document(DocumentType::SignedDocument, "signed.pdf"),
            data: Bytes::from_static(b"%PDF"),
        };

        let archive = CaseArchive {
            details: &details,
            signatures: std::slice::from_ref(&signature),
            client_documents: &uploads,
            signed_pdf: Some(&pdf),
            portal_link: "http://localhost/client-portal/SECURE_x_y",
            generated_at: Utc::now(),
        };
        let mut zip = entries(archive.build().unwrap());

        let mut image = Vec::new();
        zip.by_name("signatures/signature-1-2025-03-15.png")
            .unwrap()
            .read_to_end(&mut image)
            .unwrap();
        assert_eq!(image, b"png-bytes");

        assert!(zip.by_name("documents-client/identity_front-1-carte_recto.jpg").is_ok());
        assert!(zip.by_name("documents-client/identity_front-1-info.json").is_ok());
        assert!(zip.by_name("documents-generes/RES-2025-007-signe.pdf").is_ok());
        assert!(zip.by_name("aucun-document.txt").is_err());

        let mut info = String::new();
        zip.by_name("informations-dossier.json")
            .unwrap()
            .read_to_string(&mut info)
            .unwrap();
        let info: serde_json::Value = serde_json::from_str(&info).unwrap();
        assert_eq!(info["dossier"]["numero"], "RES-2025-007");
        assert_eq!(info["dossier"]["statut"], "signed");
        assert_eq!(info["signatures"].as_array().unwrap().len(), 1);
    }
}

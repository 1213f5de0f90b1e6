// ABOUTME: Minimal single-page PDF writer for the finalized termination document
// ABOUTME: Emits catalog, page tree, content stream, and Helvetica font with exact xref offsets
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

//! The document is fixed markup: a handful of text lines drawn with the
//! built-in Helvetica font. Text is encoded as `WinAnsiEncoding` bytes, so
//! characters outside Latin-1 are transliterated first.

use chrono::{DateTime, Utc};
use std::fmt::Write as _;

const TOP_MARGIN: i32 = 750;
const LEFT_MARGIN: i32 = 50;

/// Values printed on the signed document
#[derive(Debug, Clone)]
pub struct SignedDocumentPdf {
    /// Case number
    pub case_number: String,
    /// Client display name
    pub client_name: String,
    /// Client email
    pub client_email: String,
    /// Insurer or insurance type shown as the case type
    pub case_label: String,
    /// Policy number, if known
    pub policy_number: Option<String>,
    /// Name typed by the signer
    pub signer_name: String,
    /// When the client signed
    pub signed_at: DateTime<Utc>,
    /// Managing agent name
    pub agent_name: String,
    /// Managing agent email
    pub agent_email: String,
    /// Portal token (only a prefix is printed)
    pub token: String,
    /// When the document was finalized
    pub finalized_at: DateTime<Utc>,
}

enum Line {
    Heading(String),
    Text(String),
    Gap,
}

impl SignedDocumentPdf {
    fn lines(&self) -> Vec<Line> {
        let finalized = self.finalized_at.format("%d.%m.%Y à %H:%M UTC").to_string();
        let signed = self.signed_at.format("%d.%m.%Y à %H:%M UTC").to_string();
        let token_prefix: String = self.token.chars().take(16).collect();

        let mut lines = vec![
            Line::Heading("DOCUMENT DE RÉSILIATION FINALISÉ".to_owned()),
            Line::Gap,
            Line::Text(format!("Dossier: {}", self.case_number)),
            Line::Text(format!("Client: {}", self.client_name)),
            Line::Text(format!("Email: {}", self.client_email)),
            Line::Text(format!("Type de dossier: {}", self.case_label)),
        ];
        if let Some(policy) = self.policy_number.as_deref().filter(|p| !p.is_empty()) {
            lines.push(Line::Text(format!("Numéro de police: {policy}")));
        }
        lines.extend([
            Line::Text(format!("Date de finalisation: {finalized}")),
            Line::Gap,
            Line::Heading("SIGNATURE ÉLECTRONIQUE VALIDÉE".to_owned()),
            Line::Text(format!("✓ Signé par {} le {signed}", self.signer_name)),
            Line::Text(format!(
                "✓ Horodatage sécurisé: {}",
                self.signed_at.to_rfc3339()
            )),
            Line::Text(
                "✓ Valeur juridique: équivalente à une signature manuscrite (SCSE)".to_owned(),
            ),
            Line::Text(format!("✓ Token de sécurité: {token_prefix}...")),
            Line::Gap,
            Line::Heading("VALIDATION CONSEILLER".to_owned()),
            Line::Text("Dossier traité et validé par:".to_owned()),
            Line::Text(self.agent_name.clone()),
            Line::Text("Conseiller eSignPro".to_owned()),
            Line::Text(format!("Email: {}", self.agent_email)),
            Line::Gap,
            Line::Heading("PROCHAINES ÉTAPES".to_owned()),
            Line::Text("1. Transmission à l'assureur dans les 24h".to_owned()),
            Line::Text("2. Confirmation par email au client".to_owned()),
            Line::Text("3. Certificat de résiliation envoyé".to_owned()),
            Line::Text("4. Traitement du remboursement éventuel".to_owned()),
            Line::Gap,
            Line::Text("Document généré automatiquement par eSignPro".to_owned()),
            Line::Text("Conforme à la législation suisse (SCSE)".to_owned()),
        ]);
        lines
    }

    fn content_stream(&self) -> Vec<u8> {
        let mut stream = Vec::new();
        let mut current_size = 0;
        let mut first = true;
        stream.extend_from_slice(format!("BT\n{LEFT_MARGIN} {TOP_MARGIN} Td\n").as_bytes());

        for line in self.lines() {
            let (size, advance, text) = match line {
                Line::Heading(text) => (14, 24, text),
                Line::Text(text) => (11, 16, text),
                Line::Gap => {
                    stream.extend_from_slice(b"0 -12 Td\n");
                    continue;
                }
            };
            if size != current_size {
                stream.extend_from_slice(format!("/F1 {size} Tf\n").as_bytes());
                current_size = size;
            }
            if !first {
                stream.extend_from_slice(format!("0 -{advance} Td\n").as_bytes());
            }
            first = false;
            stream.push(b'(');
            stream.extend_from_slice(&encode_text(&text));
            stream.extend_from_slice(b") Tj\n");
        }

        stream.extend_from_slice(b"ET");
        stream
    }

    /// Serialize the document
    #[must_use]
    pub fn render(&self) -> Vec<u8> {
        let content = self.content_stream();

        let mut stream_object = format!("<< /Length {} >>\nstream\n", content.len()).into_bytes();
        stream_object.extend_from_slice(&content);
        stream_object.extend_from_slice(b"\nendstream");

        let objects: [Vec<u8>; 5] = [
            b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec(),
            b"<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>".to_vec(),
            stream_object,
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_vec(),
        ];

        let mut pdf = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (index, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n", index + 1).as_bytes());
            pdf.extend_from_slice(body);
            pdf.extend_from_slice(b"\nendobj\n");
        }

        let xref_offset = pdf.len();
        let mut trailer = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            let _ = writeln!(trailer, "{offset:010} 00000 n ");
        }
        let _ = write!(
            trailer,
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
            objects.len() + 1
        );
        pdf.extend_from_slice(trailer.as_bytes());
        pdf
    }
}

/// Map a character to its Latin-1 replacement when it has no single-byte form
fn transliterate(c: char) -> Option<&'static str> {
    Some(match c {
        '✓' | '✔' => "-",
        '€' => "EUR",
        '‘' | '’' | '‚' | '′' => "'",
        '“' | '”' | '„' | '″' => "\"",
        '–' | '—' | '−' => "-",
        '…' => "...",
        '•' => "*",
        '\u{a0}' | '\u{202f}' => " ",
        'œ' => "oe",
        'Œ' => "OE",
        _ => return None,
    })
}

/// Encode text as an escaped PDF literal string body
#[must_use]
pub fn encode_text(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut push = |c: char| match c {
        '(' | ')' | '\\' => {
            out.push(b'\\');
            out.push(c as u8);
        }
        '\n' | '\r' | '\t' => out.push(b' '),
        c if (c as u32) < 0x20 || (0x7f..0xa0).contains(&(c as u32)) => {}
        c if (c as u32) <= 0xff => out.push(c as u32 as u8),
        _ => out.push(b'?'),
    };

    for c in text.chars() {
        if let Some(replacement) = transliterate(c) {
            replacement.chars().for_each(&mut push);
        } else {
            push(c);
        }
    }
    out
}

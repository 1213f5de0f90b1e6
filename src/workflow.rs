// ABOUTME: Workflow helpers for portal tokens, case numbers, storage keys, and status checks
// ABOUTME: Pure functions shared by the database layer and the case service
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

//! Case workflow helpers
//!
//! The status machine itself lives on [`CaseStatus`]. This module adds the
//! pieces around it: token and identifier generation, expiry handling, and
//! the error raised for an illegal transition.

use crate::constants::{cases, tokens};
use crate::errors::{AppError, AppResult};
use crate::models::{CaseStatus, DocumentType, InsuranceCase};
use chrono::{DateTime, Datelike, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Status label shown on the portal for a case whose link has expired
pub const EXPIRED_STATUS: &str = "expired";

fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Render `value` in lowercase base 36
#[must_use]
pub fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_owned();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Generate a portal token: `SECURE_<base36 millis>_<24 alphanumerics>`
#[must_use]
pub fn generate_secure_token(now: DateTime<Utc>) -> String {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or_default();
    format!(
        "{}{}_{}",
        tokens::SECURE_TOKEN_PREFIX,
        to_base36(millis),
        random_alphanumeric(tokens::SECURE_TOKEN_RANDOM_LEN)
    )
}

/// Whether `token` has the shape of a portal token
#[must_use]
pub fn is_well_formed_token(token: &str) -> bool {
    token
        .strip_prefix(tokens::SECURE_TOKEN_PREFIX)
        .and_then(|rest| rest.split_once('_'))
        .is_some_and(|(stamp, random)| {
            !stamp.is_empty()
                && stamp.chars().all(|c| c.is_ascii_alphanumeric())
                && random.len() == tokens::SECURE_TOKEN_RANDOM_LEN
                && random.chars().all(|c| c.is_ascii_alphanumeric())
        })
}

/// Expiry instant for a token issued at `now`, saturating at the latest representable instant
#[must_use]
pub fn token_expiry(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Public client code used as the storage folder of a client
#[must_use]
pub fn generate_client_code() -> String {
    format!("CLI_{}", random_alphanumeric(10).to_uppercase())
}

/// Format a case number (`RES-2025-007`)
#[must_use]
pub fn format_case_number(year: i32, sequence: u32) -> String {
    format!("{}-{year}-{sequence:03}", cases::CASE_NUMBER_PREFIX)
}

/// Sequence following the highest existing case number of a year
#[must_use]
pub fn next_case_sequence(last_case_number: Option<&str>) -> u32 {
    last_case_number
        .and_then(|number| number.rsplit('-').next())
        .and_then(|seq| seq.parse::<u32>().ok())
        .map_or(1, |seq| seq.saturating_add(1))
}

/// Year used for case numbering at `now`
#[must_use]
pub fn case_year(now: DateTime<Utc>) -> i32 {
    now.year()
}

/// Status reported to the portal: the case status, or `expired`
#[must_use]
pub fn portal_status(case: &InsuranceCase, now: DateTime<Utc>) -> &'static str {
    if case.is_token_expired(now) && !case.status.is_terminal() {
        EXPIRED_STATUS
    } else {
        case.status.as_str()
    }
}

/// Reject a client action on an expired link
///
/// # Errors
///
/// Returns `AuthExpired` when the token is past its expiry
pub fn ensure_token_active(case: &InsuranceCase, now: DateTime<Utc>) -> AppResult<()> {
    if case.is_token_expired(now) {
        return Err(AppError::token_expired());
    }
    Ok(())
}

/// Reject an illegal status change
///
/// # Errors
///
/// Returns `InvalidState` naming both statuses
pub fn ensure_transition(current: CaseStatus, target: CaseStatus) -> AppResult<()> {
    if current.can_transition_to(target) {
        Ok(())
    } else {
        Err(AppError::invalid_state(format!(
            "Cannot move case from {current} to {target}"
        ))
        .with_details(serde_json::json!({
            "current_status": current.as_str(),
            "requested_status": target.as_str(),
        })))
    }
}

/// Required document types not yet present in `uploaded`
#[must_use]
pub fn missing_required_documents(uploaded: &[DocumentType]) -> Vec<DocumentType> {
    DocumentType::REQUIRED
        .into_iter()
        .filter(|required| !uploaded.contains(required))
        .collect()
}

/// Stored file name: `{type}_{millis}_{random}.{ext}`
#[must_use]
pub fn storage_file_name(document_type: DocumentType, extension: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}_{}_{}.{}",
        document_type.as_str(),
        now.timestamp_millis(),
        random_alphanumeric(8).to_lowercase(),
        extension
    )
}

/// Storage key: `{client_code}/{type}/{file_name}`
#[must_use]
pub fn storage_key(client_code: &str, document_type: DocumentType, file_name: &str) -> String {
    format!("{client_code}/{}/{file_name}", document_type.as_str())
}

/// File extension for an accepted MIME type, falling back to the original name
#[must_use]
pub fn extension_for(mime_type: &str, original_name: &str) -> String {
    match mime_type.trim().to_ascii_lowercase().as_str() {
        "application/pdf" => "pdf".to_owned(),
        "image/png" => "png".to_owned(),
        "image/jpeg" | "image/jpg" => "jpg".to_owned(),
        _ => original_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.len() <= 5)
            .unwrap_or_else(|| "bin".to_owned()),
    }
}

/// Guess a MIME type from a file name when the upload carries none
#[must_use]
pub fn mime_from_file_name(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

/// Convert `DD.MM.YYYY` birth dates to `YYYY-MM-DD`; other shapes pass through
#[must_use]
pub fn normalize_birth_date(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parts: Vec<&str> = trimmed.split('.').collect();
    if let [day, month, year] = parts.as_slice() {
        return Some(format!("{year}-{month:0>2}-{day:0>2}"));
    }
    Some(trimmed.to_owned())
}

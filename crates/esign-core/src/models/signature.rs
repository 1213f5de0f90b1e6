// ABOUTME: Electronic signature record captured from the portal signature pad
// ABOUTME: Stores the image data URL with signer name, network origin, and timestamp
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A signature attached to a case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    /// Unique identifier
    pub id: Uuid,
    /// Signed case
    pub case_id: Uuid,
    /// `data:image/png;base64,...` as captured by the signature pad
    pub signature_data: String,
    /// Name of the signer at signing time
    pub signer_name: String,
    /// Forwarded client address
    pub ip_address: Option<String>,
    /// Browser user agent
    pub user_agent: Option<String>,
    /// When the signature was recorded
    pub signed_at: DateTime<Utc>,
    /// Validity flag
    pub is_valid: bool,
}

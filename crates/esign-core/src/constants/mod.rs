// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Pure data constants for uploads, portal tokens, storage, and email defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

//! Constants module
//!
//! Constants are grouped into logical domains rather than being in a single
//! flat list.

/// Upload limits
pub mod limits {
    /// Maximum size of a single uploaded file (10 MiB)
    pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
    /// Hard cap on a whole multipart request body (50 MiB, the bucket limit)
    pub const MAX_REQUEST_BODY_BYTES: usize = 50 * 1024 * 1024;
    /// Maximum number of files accepted in one upload request
    pub const MAX_FILES_PER_UPLOAD: usize = 10;
    /// Default page size for listings
    pub const DEFAULT_PAGE_SIZE: u32 = 50;
    /// Largest page size a caller may request
    pub const MAX_PAGE_SIZE: u32 = 100;
}

/// Portal token settings
pub mod tokens {
    /// Prefix of every portal token
    pub const SECURE_TOKEN_PREFIX: &str = "SECURE_";
    /// Number of random alphanumeric characters in a token
    pub const SECURE_TOKEN_RANDOM_LEN: usize = 24;
    /// Default token lifetime in days
    pub const DEFAULT_TOKEN_EXPIRY_DAYS: i64 = 7;
    /// Longest token lifetime accepted from configuration
    pub const MAX_TOKEN_EXPIRY_DAYS: i64 = 365;
    /// Number of token characters shown on generated documents
    pub const TOKEN_DISPLAY_PREFIX_LEN: usize = 16;
}

/// Case numbering
pub mod cases {
    /// Prefix of termination case numbers (`RES-2025-001`)
    pub const CASE_NUMBER_PREFIX: &str = "RES";
    /// Default insurance type for termination cases
    pub const DEFAULT_INSURANCE_TYPE: &str = "resiliation";
    /// Default country of clients
    pub const DEFAULT_COUNTRY: &str = "CH";
}

/// Storage defaults
pub mod storage {
    /// Default bucket used by hosted object storage
    pub const DEFAULT_BUCKET: &str = "client-documents";
    /// Default local upload directory
    pub const DEFAULT_UPLOAD_DIR: &str = "./data/uploads";
    /// Default signed URL lifetime in seconds
    pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 3600;
}

/// Email defaults
pub mod email {
    /// Resend-compatible delivery endpoint
    pub const DEFAULT_EMAIL_API_URL: &str = "https://api.resend.com/emails";
    /// Default sender address
    pub const DEFAULT_FROM: &str = "noreply@esignpro.ch";
    /// Default reply-to address
    pub const DEFAULT_REPLY_TO: &str = "support@esignpro.ch";
    /// Default administrator address notified on signature
    pub const DEFAULT_ADMIN_EMAIL: &str = "admin@esignpro.ch";
    /// Product name shown in emails and documents
    pub const PRODUCT_NAME: &str = "eSignPro";
}

/// Service identity
pub mod service_names {
    /// Service name for structured logging
    pub const ESIGN_PORTAL: &str = "esign-portal";
}

/// Agent API key header
pub mod headers {
    /// Header carrying the agent API key
    pub const AGENT_KEY: &str = "x-agent-key";
    /// Header carrying the request id
    pub const REQUEST_ID: &str = "x-request-id";
}

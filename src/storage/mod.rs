// ABOUTME: Document storage abstraction with local-disk and hosted bucket backends
// ABOUTME: FileStorage trait, key validation, and backend selection from configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

//! # Document Storage
//!
//! Uploaded identity documents and generated PDFs are stored under keys of
//! the form `{client_code}/{document_type}/{file_name}`. Two backends exist:
//!
//! - [`LocalFileStorage`]: files under `UPLOAD_DIR`
//! - [`ObjectStorage`]: a hosted object-storage bucket reached over HTTP

mod local;
mod object;

pub use local::LocalFileStorage;
pub use object::ObjectStorage;

use crate::config::{StorageBackend, StorageConfig};
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Result of a successful `put`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Key the bytes were stored under
    pub key: String,
    /// Number of bytes written
    pub size: usize,
}

/// Storage backend for case documents
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store `data` under `key`; fails if the key already exists
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> AppResult<StoredObject>;

    /// Read the bytes stored under `key`
    async fn get(&self, key: &str) -> AppResult<Bytes>;

    /// Remove the object stored under `key`
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Time-limited download URL, `None` when the backend serves files itself
    async fn signed_url(&self, key: &str, ttl: Duration) -> AppResult<Option<String>>;

    /// Short backend name for logs and health output
    fn backend_name(&self) -> &'static str;
}

/// Reject keys that could escape the storage root or need URL encoding
///
/// # Errors
///
/// Returns `InvalidInput` for empty keys, absolute keys, `..` or `.`
/// segments, and characters outside `[A-Za-z0-9._/-]`
pub fn validate_key(key: &str) -> AppResult<()> {
    if key.is_empty() || key.starts_with('/') || key.ends_with('/') {
        return Err(AppError::invalid_input(format!("Invalid storage key: {key:?}")));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(AppError::invalid_input(format!("Invalid storage key: {key:?}")));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'))
    {
        return Err(AppError::invalid_input(format!(
            "Storage key contains unsupported characters: {key:?}"
        )));
    }
    Ok(())
}

/// Build the storage backend selected by configuration
///
/// # Errors
///
/// Returns a configuration error if the object backend lacks its URL or key
pub fn create_storage(config: &StorageConfig) -> AppResult<Arc<dyn FileStorage>> {
    match config.backend {
        StorageBackend::Local => {
            info!(root = %config.upload_dir.display(), "Using local document storage");
            Ok(Arc::new(LocalFileStorage::new(config.upload_dir.clone())))
        }
        StorageBackend::Object => {
            let base_url = config
                .object_storage_url
                .clone()
                .ok_or_else(|| AppError::config("OBJECT_STORAGE_URL is required"))?;
            let service_key = config
                .object_storage_key
                .clone()
                .ok_or_else(|| AppError::config("OBJECT_STORAGE_KEY is required"))?;
            info!(bucket = %config.bucket, "Using object document storage");
            Ok(Arc::new(ObjectStorage::new(
                base_url,
                service_key,
                config.bucket.clone(),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key_accepts_generated_keys() {
        assert!(validate_key("CLI_ABC123/identity_front/identity_front_1700000000000_ab12cd34.jpg").is_ok());
    }

    #[test]
    fn test_validate_key_rejects_traversal() {
        for key in ["", "/etc/passwd", "a/../b", "./a", "a//b", "a/", "a b", "a\\b"] {
            assert!(validate_key(key).is_err(), "{key:?} should be rejected");
        }
    }

    #[test]
    fn test_object_backend_requires_credentials() {
        let config = StorageConfig {
            backend: StorageBackend::Object,
            ..StorageConfig::default()
        };
        assert!(create_storage(&config).is_err());
    }
}

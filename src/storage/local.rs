// ABOUTME: Local filesystem storage backend rooted at the configured upload directory
// ABOUTME: Writes are create-only so a key is never silently overwritten
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

use super::{validate_key, FileStorage, StoredObject};
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Files stored under a root directory
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    /// Storage rooted at `root` (created lazily on first write)
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> AppResult<PathBuf> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> AppResult<StoredObject> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::storage(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => {
                    AppError::already_exists(format!("Storage key already exists: {key}"))
                }
                _ => AppError::storage(format!("Failed to create {key}: {e}")),
            })?;
        file.write_all(&data)
            .await
            .map_err(|e| AppError::storage(format!("Failed to write {key}: {e}")))?;
        file.flush()
            .await
            .map_err(|e| AppError::storage(format!("Failed to flush {key}: {e}")))?;

        debug!(key, size = data.len(), "Stored file on local disk");
        Ok(StoredObject {
            key: key.to_owned(),
            size: data.len(),
        })
    }

    async fn get(&self, key: &str) -> AppResult<Bytes> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(AppError::not_found(format!("Stored file {key}")))
            }
            Err(e) => Err(AppError::storage(format!("Failed to read {key}: {e}"))),
        }
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(AppError::not_found(format!("Stored file {key}")))
            }
            Err(e) => Err(AppError::storage(format!("Failed to delete {key}: {e}"))),
        }
    }

    async fn signed_url(&self, key: &str, _ttl: Duration) -> AppResult<Option<String>> {
        self.resolve(key)?;
        Ok(None)
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

// ABOUTME: Hosted object-storage backend speaking the bucket REST API over reqwest
// ABOUTME: Uploads without upsert, downloads, deletes, and signs time-limited URLs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

//! Object storage client
//!
//! Endpoints (relative to the configured base URL):
//!
//! - `POST   /storage/v1/object/{bucket}/{key}` upload (`x-upsert: false`)
//! - `GET    /storage/v1/object/{bucket}/{key}` download
//! - `DELETE /storage/v1/object/{bucket}` with `{"prefixes": [key]}`
//! - `POST   /storage/v1/object/sign/{bucket}/{key}` with `{"expiresIn": secs}`

use super::{validate_key, FileStorage, StoredObject};
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const SERVICE: &str = "Object storage";

/// Bucket in a hosted object-storage service
#[derive(Debug, Clone)]
pub struct ObjectStorage {
    base_url: String,
    service_key: String,
    bucket: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

impl ObjectStorage {
    /// Client for `bucket` at `base_url`, authenticated with `service_key`
    #[must_use]
    pub fn new(base_url: String, service_key: String, bucket: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            service_key,
            bucket,
            http_client: reqwest::Client::new(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{key}", self.base_url, self.bucket)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }

    async fn check(response: reqwest::Response, key: &str) -> AppResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => Err(AppError::not_found(format!("Stored file {key}"))),
            StatusCode::CONFLICT => Err(AppError::already_exists(format!(
                "Storage key already exists: {key}"
            ))),
            // The bucket API reports a duplicate upload as a 400 with a 409 status body
            StatusCode::BAD_REQUEST if body.contains("\"409\"") || body.contains("Duplicate") => {
                Err(AppError::already_exists(format!(
                    "Storage key already exists: {key}"
                )))
            }
            _ => Err(AppError::external_service(
                SERVICE,
                format!("HTTP {status}: {body}"),
            )),
        }
    }
}

#[async_trait]
impl FileStorage for ObjectStorage {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> AppResult<StoredObject> {
        validate_key(key)?;
        let size = data.len();
        let response = self
            .authorized(self.http_client.post(self.object_url(key)))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .header(reqwest::header::CACHE_CONTROL, "max-age=3600")
            .body(data)
            .send()
            .await
            .map_err(|e| AppError::external_service(SERVICE, e.to_string()))?;
        Self::check(response, key).await?;

        debug!(key, size, bucket = %self.bucket, "Stored file in bucket");
        Ok(StoredObject {
            key: key.to_owned(),
            size,
        })
    }

    async fn get(&self, key: &str) -> AppResult<Bytes> {
        validate_key(key)?;
        let response = self
            .authorized(self.http_client.get(self.object_url(key)))
            .send()
            .await
            .map_err(|e| AppError::external_service(SERVICE, e.to_string()))?;
        Self::check(response, key)
            .await?
            .bytes()
            .await
            .map_err(|e| AppError::external_service(SERVICE, format!("Read error: {e}")))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        validate_key(key)?;
        let url = format!("{}/storage/v1/object/{}", self.base_url, self.bucket);
        let response = self
            .authorized(self.http_client.delete(url))
            .json(&json!({ "prefixes": [key] }))
            .send()
            .await
            .map_err(|e| AppError::external_service(SERVICE, e.to_string()))?;
        Self::check(response, key).await?;
        Ok(())
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> AppResult<Option<String>> {
        validate_key(key)?;
        let url = format!(
            "{}/storage/v1/object/sign/{}/{key}",
            self.base_url, self.bucket
        );
        let response = self
            .authorized(self.http_client.post(url))
            .json(&json!({ "expiresIn": ttl.as_secs() }))
            .send()
            .await
            .map_err(|e| AppError::external_service(SERVICE, e.to_string()))?;
        let signed: SignResponse = Self::check(response, key)
            .await?
            .json()
            .await
            .map_err(|e| AppError::external_service(SERVICE, format!("JSON parse error: {e}")))?;

        let path = signed.signed_url;
        if path.starts_with("http://") || path.starts_with("https://") {
            Ok(Some(path))
        } else {
            Ok(Some(format!("{}/storage/v1{path}", self.base_url)))
        }
    }

    fn backend_name(&self) -> &'static str {
        "object"
    }
}

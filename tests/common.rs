// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: In-memory database, temporary local storage, recording email senders, and sample data
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `esign_portal`

use anyhow::Result;
use async_trait::async_trait;
use base64::Engine as _;
use esign_portal::{
    config::ServerConfig,
    database::{Database, NewAgent},
    documents::ClientData,
    email::{DeliveryReceipt, EmailSender, OutgoingEmail, SimulatedEmailSender},
    errors::{AppError, AppResult},
    server::ServerResources,
    services::{CaseService, CreateCaseRequest, RequestMeta},
    storage::{FileStorage, LocalFileStorage, StoredObject},
};
use bytes::Bytes;
use std::sync::{Arc, Once};
use std::time::Duration;
use tempfile::TempDir;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Standard test database setup
pub async fn create_test_database() -> Result<Arc<Database>> {
    init_test_logging();
    Ok(Arc::new(Database::new("sqlite::memory:").await?))
}

/// Email sender whose delivery API always rejects
pub struct FailingEmailSender;

#[async_trait]
impl EmailSender for FailingEmailSender {
    async fn send(&self, _email: &OutgoingEmail) -> AppResult<DeliveryReceipt> {
        Err(AppError::external_service(
            "Email API",
            "HTTP 503: service unavailable",
        ))
    }

    fn sender_address(&self) -> &str {
        "noreply@esignpro.ch"
    }
}

/// Everything a workflow test needs; the temp dir lives as long as this value
pub struct TestEnvironment {
    pub resources: Arc<ServerResources>,
    pub outbox: Arc<SimulatedEmailSender>,
    pub upload_dir: TempDir,
}

impl TestEnvironment {
    pub fn service(&self) -> &CaseService {
        &self.resources.cases
    }

    pub fn database(&self) -> &Database {
        &self.resources.database
    }
}

/// Configuration pointing at the given upload directory
pub fn test_config(upload_dir: &TempDir) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.database_url = esign_portal::config::DatabaseUrl::Memory;
    config.storage.upload_dir = upload_dir.path().to_path_buf();
    config.portal.app_base_url = "https://portal.test".to_owned();
    config
}

/// Environment with simulated email delivery
pub async fn create_test_environment() -> Result<TestEnvironment> {
    create_environment_with(|_| {}).await
}

/// Environment with a customized configuration
pub async fn create_environment_with(
    configure: impl FnOnce(&mut ServerConfig),
) -> Result<TestEnvironment> {
    build_environment(configure, |root| Arc::new(LocalFileStorage::new(root))).await
}

/// Environment whose storage issues signed download URLs
pub async fn create_signing_environment() -> Result<TestEnvironment> {
    build_environment(
        |config| config.storage.signed_url_ttl_secs = 600,
        |root| {
            Arc::new(SigningStorage {
                inner: LocalFileStorage::new(root),
            })
        },
    )
    .await
}

async fn build_environment(
    configure: impl FnOnce(&mut ServerConfig),
    storage: impl FnOnce(std::path::PathBuf) -> Arc<dyn FileStorage>,
) -> Result<TestEnvironment> {
    let upload_dir = TempDir::new()?;
    let mut config = test_config(&upload_dir);
    configure(&mut config);

    let database = create_test_database().await?;
    let storage = storage(upload_dir.path().to_path_buf());
    let outbox = Arc::new(SimulatedEmailSender::new("noreply@esignpro.ch"));

    let resources = Arc::new(ServerResources::new(
        Arc::new(config),
        database,
        storage,
        outbox.clone(),
    ));

    Ok(TestEnvironment {
        resources,
        outbox,
        upload_dir,
    })
}

/// Local storage that hands out `https://files.test` links carrying the TTL
pub struct SigningStorage {
    inner: LocalFileStorage,
}

#[async_trait]
impl FileStorage for SigningStorage {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> AppResult<StoredObject> {
        self.inner.put(key, data, content_type).await
    }

    async fn get(&self, key: &str) -> AppResult<Bytes> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.inner.delete(key).await
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> AppResult<Option<String>> {
        Ok(Some(format!(
            "https://files.test/{key}?expires_in={}",
            ttl.as_secs()
        )))
    }

    fn backend_name(&self) -> &'static str {
        "signing"
    }
}

/// Files currently stored under the upload directory, as storage keys
pub fn stored_keys(env: &TestEnvironment) -> Vec<String> {
    let root = env.upload_dir.path();
    let mut keys = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let relative = path.strip_prefix(root).unwrap();
                keys.push(
                    relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/"),
                );
            }
        }
    }
    keys.sort();
    keys
}

/// Service whose email delivery always fails
pub async fn create_failing_email_service() -> Result<(CaseService, TempDir)> {
    let upload_dir = TempDir::new()?;
    let config = test_config(&upload_dir);
    let database = create_test_database().await?;
    let storage: Arc<dyn FileStorage> =
        Arc::new(LocalFileStorage::new(upload_dir.path().to_path_buf()));

    let service = CaseService::new(
        database,
        storage,
        Arc::new(FailingEmailSender),
        Arc::new(config),
    );
    Ok((service, upload_dir))
}

/// Audit metadata used by tests
pub fn test_meta() -> RequestMeta {
    RequestMeta {
        ip_address: Some("203.0.113.10".to_owned()),
        user_agent: Some("integration-test".to_owned()),
    }
}

/// Complete client form
pub fn sample_client_data(email: &str) -> ClientData {
    ClientData {
        nom: "Dupont".to_owned(),
        prenom: "Marie".to_owned(),
        date_naissance: "15.03.1985".to_owned(),
        numero_police: "POL-778899".to_owned(),
        email: email.to_owned(),
        adresse: "Rue du Lac 12".to_owned(),
        npa: "1200".to_owned(),
        ville: "Genève".to_owned(),
        destinataire: "Helvetia Assurances\nCase postale\n1001 Lausanne".to_owned(),
        lieu_date: "Genève, le 14.03.2025".to_owned(),
        ..ClientData::default()
    }
}

/// Case creation request for a client
pub fn sample_case_request(email: &str) -> CreateCaseRequest {
    CreateCaseRequest {
        client: sample_client_data(email),
        phone: Some("+41 79 123 45 67".to_owned()),
        agent_id: None,
        agent_code: None,
        insurance_type: None,
        insurance_company: None,
        title: None,
        description: None,
    }
}

/// Agent registration
pub fn sample_agent(code: &str) -> NewAgent {
    NewAgent {
        email: format!("{}@esignpro.ch", code.to_lowercase()),
        first_name: "Luc".to_owned(),
        last_name: "Martin".to_owned(),
        phone: None,
        agent_code: code.to_owned(),
        department: Some("Résiliations".to_owned()),
        is_supervisor: false,
    }
}

/// Smallest valid PNG (1x1 transparent pixel)
pub const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Signature pad output as a PNG data URL
pub fn signature_data_url() -> String {
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(TINY_PNG)
    )
}

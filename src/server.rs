// ABOUTME: Server assembly: shared resources, router with middleware stack, and lifecycle
// ABOUTME: Binds the HTTP listener and shuts down gracefully on Ctrl-C or SIGTERM
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

//! Resources are created once at startup and shared by every route group
//! through an `Arc`; nothing else is held in process memory between requests.

use crate::config::ServerConfig;
use crate::constants::limits;
use crate::database::Database;
use crate::email::{create_email_sender, EmailSender};
use crate::middleware::{propagate_request_id_layer, request_id_layer, setup_cors, trace_layer};
use crate::routes::{AgentRoutes, ClientRoutes, DocumentRoutes, HealthRoutes};
use crate::services::CaseService;
use crate::storage::{create_storage, FileStorage};
use anyhow::{Context, Result};
use axum::{extract::DefaultBodyLimit, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tracing::{info, warn};

/// Backends shared by all route handlers
pub struct ServerResources {
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Database pool
    pub database: Arc<Database>,
    /// Document storage
    pub storage: Arc<dyn FileStorage>,
    /// Email delivery
    pub email: Arc<dyn EmailSender>,
    /// Workflow operations over the backends above
    pub cases: CaseService,
}

impl ServerResources {
    /// Assemble resources from already-built backends
    #[must_use]
    pub fn new(
        config: Arc<ServerConfig>,
        database: Arc<Database>,
        storage: Arc<dyn FileStorage>,
        email: Arc<dyn EmailSender>,
    ) -> Self {
        let cases = CaseService::new(
            database.clone(),
            storage.clone(),
            email.clone(),
            config.clone(),
        );
        Self {
            config,
            database,
            storage,
            email,
            cases,
        }
    }

    /// Connect the database and build storage and email backends from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated, or the
    /// storage backend is misconfigured
    pub async fn from_config(config: ServerConfig) -> Result<Self> {
        let database = Database::new(&config.database_url.to_connection_string())
            .await
            .context("Failed to initialize database")?;
        info!(url = %config.database_url, "Database initialized");

        let storage = create_storage(&config.storage).context("Failed to initialize storage")?;
        let email = create_email_sender(&config.email);

        Ok(Self::new(
            Arc::new(config),
            Arc::new(database),
            storage,
            email,
        ))
    }
}

/// Complete application router with the middleware stack
pub fn build_router(resources: Arc<ServerResources>) -> Router {
    let cors = setup_cors(&resources.config);

    Router::new()
        .merge(HealthRoutes::routes(resources.clone()))
        .merge(AgentRoutes::routes(resources.clone()))
        .merge(ClientRoutes::routes(resources.clone()))
        .merge(DocumentRoutes::routes(resources))
        .layer(DefaultBodyLimit::max(limits::MAX_REQUEST_BODY_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(request_id_layer())
                .layer(trace_layer())
                .layer(propagate_request_id_layer())
                .layer(cors),
        )
}

/// Serve the API until a shutdown signal arrives
///
/// # Errors
///
/// Returns an error if resources fail to initialize or the listener cannot bind
pub async fn run(config: ServerConfig) -> Result<()> {
    let address = format!("{}:{}", config.host, config.http_port);

    let resources = Arc::new(ServerResources::from_config(config).await?);
    let app = build_router(resources);

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!(%address, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

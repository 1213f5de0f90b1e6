// ABOUTME: HTTP server binary for the eSign termination-case portal
// ABOUTME: Loads environment configuration, initializes logging, and serves the JSON API
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

//! # eSign Portal Server Binary
//!
//! Starts the agent and client JSON API backed by `SQLite`, document
//! storage, and the email delivery API.

use anyhow::Result;
use clap::Parser;
use esign_portal::{config::ServerConfig, logging, server};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "esign-portal-server")]
#[command(about = "eSign Portal - electronic signature workflow for policy terminations")]
struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override bind address
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(host) = args.host {
        config.host = host;
    }

    info!("Starting eSign Portal");
    info!("{}", config.summary());
    display_available_endpoints(&config);

    if let Err(e) = server::run(config).await {
        error!("Server error: {e:#}");
        return Err(e);
    }
    Ok(())
}

/// Log the API surface at startup
#[allow(clippy::cognitive_complexity)]
fn display_available_endpoints(config: &ServerConfig) {
    let base = format!("http://{}:{}", config.host, config.http_port);

    info!("=== Available API Endpoints ===");
    info!("Health:");
    info!("   Liveness:          GET  {base}/health");
    info!("   Readiness:         GET  {base}/ready");
    info!("Agent:");
    info!("   Agents:            GET|POST {base}/api/agent/agents");
    info!("   Cases:             GET|POST {base}/api/agent/cases");
    info!("   Case Details:      GET  {base}/api/agent/cases/{{case_id}}");
    info!("   Resend Invitation: POST {base}/api/send-email");
    info!("   ZIP Export:        GET|POST {base}/api/agent/download-documents");
    info!("   Documents History: GET  {base}/api/agent/documents-history");
    info!("Client Portal:");
    info!("   Portal View:       GET  {base}/api/client/portal/{{token}}");
    info!("   Upload Documents:  GET|POST {base}/api/client/upload-separated-documents");
    info!("   Review:            POST {base}/api/client/review");
    info!("   Signature:         GET|POST {base}/api/client/save-signature");
    info!("   Complete:          POST {base}/api/client/complete-signature");
    info!("   Signed PDF:        GET  {base}/api/client/download-document");
    info!("Documents:");
    info!("   Generate Letter:   POST {base}/api/generate-document");
    info!("   Email Preview:     GET  {base}/api/email-preview");
    info!("=== End of Endpoint List ===");
}

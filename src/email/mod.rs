// ABOUTME: Outgoing email delivery through a Resend-compatible API or a local simulation
// ABOUTME: EmailSender trait, message types, and sender selection from configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

//! # Email Delivery
//!
//! Messages are rendered by [`templates`] and handed to an [`EmailSender`].
//! With `RESEND_API_KEY` set, [`ResendEmailSender`] posts them to the
//! delivery API; otherwise [`SimulatedEmailSender`] logs them and keeps a
//! copy in memory.

mod resend;
pub mod templates;

pub use resend::ResendEmailSender;

use crate::config::EmailConfig;
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::info;
use uuid::Uuid;

/// A rendered message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// HTML body
    pub html: String,
    /// Plain-text body
    pub text: String,
}

/// Acknowledgement from the sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    /// Message id assigned by the delivery API (synthetic when simulated)
    pub id: String,
    /// Whether delivery was simulated
    pub simulated: bool,
}

/// Delivers rendered emails
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver one message
    async fn send(&self, email: &OutgoingEmail) -> AppResult<DeliveryReceipt>;

    /// Sender address used in the `from` field
    fn sender_address(&self) -> &str;
}

/// Sender that logs messages instead of delivering them
#[derive(Debug, Default)]
pub struct SimulatedEmailSender {
    from: String,
    outbox: Mutex<Vec<OutgoingEmail>>,
}

impl SimulatedEmailSender {
    /// Simulated sender using `from` as its address
    #[must_use]
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            outbox: Mutex::new(Vec::new()),
        }
    }

    /// Messages "sent" so far
    #[must_use]
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EmailSender for SimulatedEmailSender {
    async fn send(&self, email: &OutgoingEmail) -> AppResult<DeliveryReceipt> {
        info!(
            to = %email.to,
            subject = %email.subject,
            "No delivery API key configured, simulating email send"
        );
        self.outbox
            .lock()
            .map_err(|_| AppError::internal("Simulated outbox lock poisoned"))?
            .push(email.clone());

        Ok(DeliveryReceipt {
            id: format!("simulated-{}", Uuid::new_v4()),
            simulated: true,
        })
    }

    fn sender_address(&self) -> &str {
        &self.from
    }
}

/// Build the sender selected by configuration
#[must_use]
pub fn create_email_sender(config: &EmailConfig) -> Arc<dyn EmailSender> {
    match &config.api_key {
        Some(api_key) => {
            info!(api = %config.api_url, "Email delivery through API");
            Arc::new(ResendEmailSender::new(
                config.api_url.clone(),
                api_key.clone(),
                config.from.clone(),
                config.reply_to.clone(),
            ))
        }
        None => {
            info!("Email delivery simulated");
            Arc::new(SimulatedEmailSender::new(config.from.clone()))
        }
    }
}

// ABOUTME: Resend-compatible email delivery client
// ABOUTME: Posts JSON messages with bearer authentication and maps failures to AppError
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

use super::{DeliveryReceipt, EmailSender, OutgoingEmail};
use crate::errors::{AppError, AppResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const SERVICE: &str = "Email API";

/// Client for a Resend-compatible `POST /emails` endpoint
#[derive(Debug, Clone)]
pub struct ResendEmailSender {
    api_url: String,
    api_key: String,
    from: String,
    reply_to: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
    reply_to: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

impl ResendEmailSender {
    /// Client posting to `api_url` with `api_key`
    #[must_use]
    pub fn new(api_url: String, api_key: String, from: String, reply_to: String) -> Self {
        Self {
            api_url,
            api_key,
            from,
            reply_to,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EmailSender for ResendEmailSender {
    async fn send(&self, email: &OutgoingEmail) -> AppResult<DeliveryReceipt> {
        let request = SendRequest {
            from: &self.from,
            to: [&email.to],
            subject: &email.subject,
            html: &email.html,
            text: &email.text,
            reply_to: &self.reply_to,
        };

        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::external_service(SERVICE, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::external_service(
                SERVICE,
                format!("HTTP {status}: {}", response.text().await.unwrap_or_default()),
            ));
        }

        let sent: SendResponse = response
            .json()
            .await
            .map_err(|e| AppError::external_service(SERVICE, format!("JSON parse error: {e}")))?;

        debug!(id = %sent.id, to = %email.to, "Email accepted by delivery API");
        Ok(DeliveryReceipt {
            id: sent.id,
            simulated: false,
        })
    }

    fn sender_address(&self) -> &str {
        &self.from
    }
}

// Email transport client
//
// The transport is an external collaborator; this client only queues
// messages. Delivery outcomes never reach the engines.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::http::{request_err, status_err};
use super::{BaseEmailService, EmailMessage};
use crate::common::EngineError;

pub struct HttpEmailService {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct QueueResponse {
    ok: bool,
}

impl HttpEmailService {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create email HTTP client")?;
        Ok(Self { base_url, client })
    }
}

#[async_trait]
impl BaseEmailService for HttpEmailService {
    async fn queue(&self, message: EmailMessage) -> Result<(), EngineError> {
        let response = self
            .client
            .post(format!("{}/queue", self.base_url))
            .json(&message)
            .send()
            .await
            .map_err(|e| request_err("email service", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_err("email service", status, &body));
        }

        let queued: QueueResponse = response
            .json()
            .await
            .map_err(|e| request_err("email service", e))?;
        if !queued.ok {
            return Err(EngineError::External(
                "email service declined the message".to_string(),
            ));
        }
        Ok(())
    }
}

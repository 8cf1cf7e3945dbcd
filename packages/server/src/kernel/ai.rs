// LLM collaborator client
//
// Availability extraction and reply drafting for the negotiation bot. Both
// endpoints may answer null; the negotiation engine always falls back to its
// rule-based parser and templates, so nothing here is load-bearing.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::http::{request_err, status_err};
use super::{BaseLlmService, ResponseKind};
use crate::common::EngineError;
use crate::domains::negotiation::Availability;

pub struct HttpLlmService {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    availability: Option<Availability>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

impl HttpLlmService {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create LLM HTTP client")?;
        Ok(Self { base_url, client })
    }
}

#[async_trait]
impl BaseLlmService for HttpLlmService {
    async fn extract_availability(
        &self,
        text: &str,
    ) -> Result<Option<Availability>, EngineError> {
        let response = self
            .client
            .post(format!("{}/extract-availability", self.base_url))
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(|e| request_err("llm service", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_err("llm service", status, &body));
        }

        let extracted: ExtractResponse = response
            .json()
            .await
            .map_err(|e| request_err("llm service", e))?;
        Ok(extracted.availability)
    }

    async fn generate_response(
        &self,
        kind: ResponseKind,
        context: serde_json::Value,
    ) -> Result<Option<String>, EngineError> {
        let response = self
            .client
            .post(format!("{}/generate-response", self.base_url))
            .json(&json!({ "kind": kind, "context": context }))
            .send()
            .await
            .map_err(|e| request_err("llm service", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_err("llm service", status, &body));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| request_err("llm service", e))?;
        Ok(generated.response)
    }
}

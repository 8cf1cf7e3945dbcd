// No-show risk model client

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

use super::http::{request_err, status_err};
use super::{BaseRiskService, RiskAssessment};
use crate::common::EngineError;

pub struct HttpRiskService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRiskService {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create risk HTTP client")?;
        Ok(Self { base_url, client })
    }
}

#[async_trait]
impl BaseRiskService for HttpRiskService {
    async fn analyze(
        &self,
        interview_id: Uuid,
        candidate_id: Uuid,
    ) -> Result<RiskAssessment, EngineError> {
        let response = self
            .client
            .post(format!("{}/analyze-risk", self.base_url))
            .json(&json!({
                "interview_id": interview_id,
                "candidate_id": candidate_id,
            }))
            .send()
            .await
            .map_err(|e| request_err("risk service", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_err("risk service", status, &body));
        }

        let assessment: RiskAssessment = response
            .json()
            .await
            .map_err(|e| request_err("risk service", e))?;
        if !(0.0..=1.0).contains(&assessment.no_show_risk) {
            return Err(EngineError::External(format!(
                "risk service returned out-of-range score {}",
                assessment.no_show_risk
            )));
        }
        Ok(assessment)
    }
}

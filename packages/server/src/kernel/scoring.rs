// Resume scoring service client
//
// Invoked asynchronously after application submission; the application row
// is marked processed whether scoring succeeds or fails.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

use super::http::{request_err, status_err};
use super::{BaseScoringService, FitAssessment};
use crate::common::EngineError;

pub struct HttpScoringService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpScoringService {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create scoring HTTP client")?;
        Ok(Self { base_url, client })
    }
}

#[async_trait]
impl BaseScoringService for HttpScoringService {
    async fn process_resume(
        &self,
        application_id: Uuid,
        resume_url: Option<&str>,
        job_description: &str,
    ) -> Result<FitAssessment, EngineError> {
        let response = self
            .client
            .post(format!("{}/process-resume", self.base_url))
            .json(&json!({
                "application_id": application_id,
                "resume_url": resume_url,
                "job_description": job_description,
            }))
            .send()
            .await
            .map_err(|e| request_err("scoring service", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_err("scoring service", status, &body));
        }

        let assessment: FitAssessment = response
            .json()
            .await
            .map_err(|e| request_err("scoring service", e))?;
        if !(0.0..=100.0).contains(&assessment.fit_score) {
            return Err(EngineError::External(format!(
                "scoring service returned out-of-range score {}",
                assessment.fit_score
            )));
        }
        Ok(assessment)
    }
}

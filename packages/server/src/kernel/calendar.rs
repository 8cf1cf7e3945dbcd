// Calendar provider client
//
// Free/busy and event creation against the external calendar. The business
// hours policy lives with the interview domain, not here.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

use super::http::{request_err, status_err};
use super::{BaseCalendarProvider, CalendarEventRequest};
use crate::common::EngineError;
use crate::domains::interviews::Slot;

pub struct HttpCalendarProvider {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct FreeSlotsResponse {
    slots: Vec<Slot>,
}

#[derive(Debug, Deserialize)]
struct CreateEventResponse {
    event_ref: String,
}

impl HttpCalendarProvider {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create calendar HTTP client")?;
        Ok(Self { base_url, client })
    }
}

#[async_trait]
impl BaseCalendarProvider for HttpCalendarProvider {
    async fn get_free_slots(
        &self,
        recruiter_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Slot>, EngineError> {
        let response = self
            .client
            .get(format!("{}/free-slots", self.base_url))
            .query(&[
                ("recruiter", recruiter_id.to_string()),
                ("from", from.to_rfc3339()),
                ("to", to.to_rfc3339()),
            ])
            .send()
            .await
            .map_err(|e| request_err("calendar provider", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_err("calendar provider", status, &body));
        }

        let free: FreeSlotsResponse = response
            .json()
            .await
            .map_err(|e| request_err("calendar provider", e))?;
        Ok(free.slots)
    }

    async fn create_event(&self, request: CalendarEventRequest) -> Result<String, EngineError> {
        let response = self
            .client
            .post(format!("{}/events", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| request_err("calendar provider", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_err("calendar provider", status, &body));
        }

        let created: CreateEventResponse = response
            .json()
            .await
            .map_err(|e| request_err("calendar provider", e))?;
        Ok(created.event_ref)
    }
}

//! Shared error mapping for the outbound HTTP clients.
//!
//! Timeouts and connection failures are `Transient` (retryable); 5xx answers
//! likewise. A 4xx is a permanent external failure and surfaces as-is.

use reqwest::StatusCode;

use crate::common::EngineError;

pub(crate) fn request_err(service: &str, err: reqwest::Error) -> EngineError {
    if err.is_timeout() || err.is_connect() {
        EngineError::Transient(anyhow::anyhow!("{} unreachable: {}", service, err))
    } else {
        EngineError::External(format!("{} request failed: {}", service, err))
    }
}

pub(crate) fn status_err(service: &str, status: StatusCode, body: &str) -> EngineError {
    if status.is_server_error() {
        EngineError::Transient(anyhow::anyhow!("{} returned {}: {}", service, status, body))
    } else {
        EngineError::External(format!("{} returned {}: {}", service, status, body))
    }
}

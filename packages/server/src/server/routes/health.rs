use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::domains::automation::{HealthStatus, SystemHealth};
use crate::server::app::AppState;
use crate::storage::Storage;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    storage: StorageHealth,
    system: SystemHealth,
}

#[derive(Serialize)]
pub struct StorageHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Health check endpoint
///
/// Checks storage reachability and folds in the metrics store's threshold
/// evaluation. Returns 200 when healthy or degraded, 503 when storage is
/// down or an alert is critical.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let storage_health = match tokio::time::timeout(
        std::time::Duration::from_secs(5),
        state.deps.storage.get_flag("global_automation"),
    )
    .await
    {
        Ok(Ok(_)) => StorageHealth {
            status: "ok".to_string(),
            error: None,
        },
        Ok(Err(e)) => StorageHealth {
            status: "error".to_string(),
            error: Some(format!("query failed: {}", e)),
        },
        Err(_) => StorageHealth {
            status: "error".to_string(),
            error: Some("query timeout (>5s)".to_string()),
        },
    };

    let system = state.deps.metrics.system_health();
    let storage_ok = storage_health.status == "ok";
    let critical = system.status == HealthStatus::Critical;

    let overall = if !storage_ok || critical {
        "unhealthy"
    } else if system.status == HealthStatus::Degraded {
        "degraded"
    } else {
        "healthy"
    };
    let status_code = if !storage_ok || critical {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        status_code,
        Json(HealthResponse {
            status: overall.to_string(),
            storage: storage_health,
            system,
        }),
    )
}

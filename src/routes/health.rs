use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::services::registry::JobCounts;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
    pub jobs: JobCounts,
    pub active_workers: usize,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub video_decoder: ComponentHealth,
    pub background_removal: ComponentHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// GET /health: decoder availability and job counts.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let decoder_check = match state.runner.source().health_check() {
        Ok(()) => ComponentHealth {
            status: "ok".to_string(),
            detail: None,
        },
        Err(e) => ComponentHealth {
            status: "error".to_string(),
            detail: Some(e.to_string()),
        },
    };

    // Removal is optional; a missing service only matters to jobs that ask for it.
    let removal_check = ComponentHealth {
        status: if state.runner.background_removal_enabled() {
            "ok".to_string()
        } else {
            "disabled".to_string()
        },
        detail: None,
    };

    let healthy = decoder_check.status == "ok";
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if healthy {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            video_decoder: decoder_check,
            background_removal: removal_check,
        },
        jobs: state.registry.counts().await,
        active_workers: state.runner.active_jobs().await,
    };

    (status_code, Json(response))
}

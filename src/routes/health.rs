//! Health check endpoint

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::config::BackendKind;
use crate::ocr::BackendHealth;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(untagged)]
pub enum HealthResponse {
    Service {
        status: &'static str,
        service: &'static str,
        version: &'static str,
    },
    Model {
        status: &'static str,
        model: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        message: String,
    },
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let service = state.service();
    let health = service.health_check().await;
    let status = health.status();

    if let BackendHealth::Unhealthy { error } = &health {
        tracing::warn!("Health check failed: {}", error);
    }

    let response = match (service.backend().kind(), health) {
        (BackendKind::Paddle, BackendHealth::Healthy { .. }) => HealthResponse::Service {
            status,
            service: "PaddleOCR Server",
            version: env!("CARGO_PKG_VERSION"),
        },
        (_, BackendHealth::Healthy { message }) | (_, BackendHealth::Degraded { message }) => {
            HealthResponse::Model {
                status,
                model: service.backend().model_name().to_string(),
                error: None,
                message,
            }
        }
        (_, BackendHealth::Unhealthy { error }) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse::Model {
                    status,
                    model: service.backend().model_name().to_string(),
                    error: Some(error),
                    message: "Ollama is not running or model not available".to_string(),
                }),
            );
        }
    };

    (StatusCode::OK, Json(response))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

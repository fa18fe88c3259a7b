use crate::{
    common::{HealthResponse, HealthServices},
    server::{AppState, cascade::ImageProducer},
};
use axum::{Json, extract::State};
use serde_json::{Value, json};

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Packsmith API is running!",
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/docs",
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let ai_service = match &state.gemini {
        Some(gemini) if gemini.is_configured() => gemini.check_health().await,
        _ => state.cascade.has_remote(),
    };
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        services: HealthServices {
            ai_service,
            storage: state.storage.check_health().await,
        },
    })
}

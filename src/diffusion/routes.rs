use super::{
    DiffusionRequest,
    loader::{LoadStatus, ModelLoader, ModelState},
};
use crate::{
    config::Device,
    server::{
        error::{ApiError, ApiResult},
        prompt::self_hosted_prompt,
        providers::data_url,
    },
};
use axum::{
    Form, Json, Router,
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub const SERVICE_NAME: &str = "Packsmith Image Generator";
pub const GENERATOR_NAME: &str = "Self-hosted Stable Diffusion";

#[derive(Clone)]
pub struct DiffusionState {
    pub loader: Arc<ModelLoader>,
    pub device: Device,
}

#[derive(Deserialize)]
pub struct PackagingForm {
    #[serde(default)]
    product_name: String,
    #[serde(default = "default_colors")]
    colors: String,
    #[serde(default = "default_emotion")]
    emotion: String,
    #[serde(default = "default_platform")]
    platform: String,
}

fn default_colors() -> String {
    "green,yellow".to_string()
}

fn default_emotion() -> String {
    "trust".to_string()
}

fn default_platform() -> String {
    "farmers-market".to_string()
}

#[derive(Deserialize)]
pub struct PromptForm {
    #[serde(default)]
    prompt: String,
    #[serde(default = "default_size")]
    width: u32,
    #[serde(default = "default_size")]
    height: u32,
    #[serde(default = "default_steps")]
    num_inference_steps: u32,
    #[serde(default = "default_guidance")]
    guidance_scale: f32,
}

const fn default_size() -> u32 {
    512
}

const fn default_steps() -> u32 {
    4
}

const fn default_guidance() -> f32 {
    1.0
}

/// Generates with the model, or explains why it cannot yet.
async fn run(state: &DiffusionState, request: &DiffusionRequest) -> ApiResult<Vec<u8>> {
    let pipeline = match state.loader.ensure_loaded().await {
        LoadStatus::Ready(pipeline) => pipeline,
        LoadStatus::Loading => {
            return Err(ApiError::Unavailable("Model is loading, please wait...".to_string()));
        }
        LoadStatus::Failed(_) => {
            return Err(ApiError::Unavailable(
                "Model failed to load. Please check logs.".to_string(),
            ));
        }
    };
    log::info!("Generating image for prompt: {}", request.prompt);
    pipeline
        .generate(request)
        .await
        .map_err(|e| ApiError::internal("Generation failed", e))
}

fn required(value: &str, name: &str) -> ApiResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::bad_request(format!("{name} is required")));
    }
    Ok(value.to_string())
}

pub async fn status(State(state): State<DiffusionState>) -> Json<Value> {
    let model_state = state.loader.state();
    Json(json!({
        "status": "alive",
        "service": SERVICE_NAME,
        "model_loaded": model_state == ModelState::Loaded,
        "model_loading": model_state == ModelState::Loading,
        "model_status": model_state.as_str(),
        "device": state.device.as_str(),
        "precision": state.device.precision(),
        "ready_for_requests": model_state == ModelState::Loaded,
        "last_error": state.loader.last_error(),
    }))
}

pub async fn generate_packaging(
    State(state): State<DiffusionState>,
    Form(form): Form<PackagingForm>,
) -> ApiResult<Json<Value>> {
    let product_name = required(&form.product_name, "product_name")?;
    let prompt = self_hosted_prompt(&product_name, &form.colors, &form.emotion, &form.platform);
    log::info!("Generating packaging for: {product_name}");

    let png = run(
        &state,
        &DiffusionRequest {
            prompt: prompt.clone(),
            width: 768,
            height: 768,
            steps: 6,
            guidance_scale: 1.5,
        },
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "image_data": data_url("image/png", &png),
        "prompt_used": prompt,
        "product_name": product_name,
        "generator": GENERATOR_NAME,
        "cost": "FREE",
    })))
}

pub async fn generate_json(
    State(state): State<DiffusionState>,
    Form(form): Form<PromptForm>,
) -> ApiResult<Json<Value>> {
    let prompt = required(&form.prompt, "prompt")?;
    let png = run(
        &state,
        &DiffusionRequest {
            prompt: prompt.clone(),
            width: form.width,
            height: form.height,
            steps: form.num_inference_steps,
            guidance_scale: form.guidance_scale,
        },
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "image_data": data_url("image/png", &png),
        "prompt_used": prompt,
        "dimensions": { "width": form.width, "height": form.height },
        "steps": form.num_inference_steps,
    })))
}

pub async fn generate_raw(
    State(state): State<DiffusionState>,
    Form(form): Form<PromptForm>,
) -> ApiResult<impl IntoResponse> {
    let prompt = required(&form.prompt, "prompt")?;
    let png = run(
        &state,
        &DiffusionRequest {
            prompt,
            width: form.width,
            height: form.height,
            steps: form.num_inference_steps,
            guidance_scale: form.guidance_scale,
        },
    )
    .await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

pub fn setup_routes(state: DiffusionState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/generate/", post(generate_raw))
        .route("/generate-json/", post(generate_json))
        .route("/generate-packaging/", post(generate_packaging))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

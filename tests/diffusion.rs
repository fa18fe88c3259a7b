use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use packsmith::{
    config::Device,
    diffusion::{
        DiffusionPipeline, DiffusionRequest, ModelBackend,
        loader::{ModelLoader, ModelState},
        routes::{DiffusionState, setup_routes},
    },
};
use serde_json::Value;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::sync::{Mutex, Notify};
use tower::ServiceExt;

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Records every request it is asked to render.
struct Recorder {
    seen: Mutex<Vec<DiffusionRequest>>,
}

#[async_trait]
impl DiffusionPipeline for Recorder {
    async fn generate(&self, request: &DiffusionRequest) -> Result<Vec<u8>> {
        self.seen.lock().await.push(request.clone());
        Ok(PNG_MAGIC.to_vec())
    }
}

struct Backend {
    pipeline: Arc<Recorder>,
    gated: AtomicBool,
    fail: AtomicBool,
    gate: Notify,
}

#[async_trait]
impl ModelBackend for Backend {
    async fn load(&self) -> Result<Arc<dyn DiffusionPipeline>> {
        if self.gated.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("out of memory"));
        }
        Ok(self.pipeline.clone())
    }
}

fn setup(gated: bool, fail: bool) -> (Router, Arc<Backend>, Arc<ModelLoader>) {
    let backend = Arc::new(Backend {
        pipeline: Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        }),
        gated: AtomicBool::new(gated),
        fail: AtomicBool::new(fail),
        gate: Notify::new(),
    });
    let loader = ModelLoader::new(backend.clone());
    let app = setup_routes(DiffusionState {
        loader: loader.clone(),
        device: Device::Cpu,
    });
    (app, backend, loader)
}

fn form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn status_json(app: &Router) -> Value {
    let (status, body) = call(app, Request::builder().uri("/").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn status_reports_lazy_model() {
    let (app, _, _) = setup(false, false);
    let status = status_json(&app).await;
    assert_eq!(status["status"], "alive");
    assert_eq!(status["model_loaded"], false);
    assert_eq!(status["model_status"], "not_loaded");
    assert_eq!(status["device"], "cpu");
    assert_eq!(status["precision"], "float32");
    assert_eq!(status["ready_for_requests"], false);
}

#[tokio::test]
async fn packaging_uses_defaults_and_loads_once() {
    let (app, backend, _) = setup(false, false);

    let (status, body) = call(&app, form("/generate-packaging/", "product_name=Basmati+Rice")).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["product_name"], "Basmati Rice");
    assert!(body["image_data"].as_str().unwrap().starts_with("data:image/png;base64,"));
    let prompt = body["prompt_used"].as_str().unwrap();
    assert!(prompt.contains("Basmati Rice"));
    assert!(prompt.contains("green and yellow color scheme"));
    assert!(prompt.contains("farmers-market"));

    let (status, body) = call(&app, form("/generate/", "prompt=a+jar+of+honey")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, PNG_MAGIC);

    let seen = backend.pipeline.seen.lock().await;
    assert_eq!(seen.len(), 2);
    assert_eq!((seen[0].width, seen[0].height, seen[0].steps), (768, 768, 6));
    assert!((seen[0].guidance_scale - 1.5).abs() < f32::EPSILON);
    assert_eq!((seen[1].width, seen[1].height, seen[1].steps), (512, 512, 4));

    assert_eq!(status_json(&app).await["model_status"], "loaded");
}

#[tokio::test]
async fn json_route_echoes_parameters() {
    let (app, _, _) = setup(false, false);
    let (status, body) = call(
        &app,
        form(
            "/generate-json/",
            "prompt=label&width=640&height=384&num_inference_steps=8&guidance_scale=2.0",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["dimensions"]["width"], 640);
    assert_eq!(body["dimensions"]["height"], 384);
    assert_eq!(body["steps"], 8);
}

#[tokio::test]
async fn requests_during_load_get_503() {
    let (app, backend, loader) = setup(true, false);

    let first = tokio::spawn({
        let app = app.clone();
        async move { call(&app, form("/generate-packaging/", "product_name=Honey")).await }
    });
    for _ in 0..100 {
        if loader.state() == ModelState::Loading {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(loader.state(), ModelState::Loading);
    assert_eq!(status_json(&app).await["model_loading"], true);

    let (status, body) = call(&app, form("/generate-json/", "prompt=honey")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "Model is loading, please wait...");

    backend.gate.notify_one();
    let (status, _) = first.await.unwrap();
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn failed_load_is_reported_and_retried() {
    let (app, backend, _) = setup(false, true);

    let (status, body) = call(&app, form("/generate-packaging/", "product_name=Honey")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "Model failed to load. Please check logs.");
    assert_eq!(status_json(&app).await["model_status"], "failed");

    backend.fail.store(false, Ordering::SeqCst);
    let (status, _) = call(&app, form("/generate-packaging/", "product_name=Honey")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn missing_fields_are_rejected() {
    let (app, _, loader) = setup(false, false);
    let (status, _) = call(&app, form("/generate-packaging/", "colors=red")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call(&app, form("/generate-json/", "width=256")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(loader.state(), ModelState::NotLoaded);
}

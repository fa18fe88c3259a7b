use crate::server::{AppState, design, status, storage::StorageService};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
};

/// Multipart framing on top of the raw file limit.
const BODY_OVERHEAD: usize = 1024 * 1024;

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(status::root))
        .route("/health", get(status::health))
        .route("/generate", post(design::generate))
        .route("/regenerate", post(design::regenerate))
        .route("/save-design", post(design::save_design))
        .route("/designs", get(design::list_designs))
        .route("/storage-stats", get(design::storage_stats))
        .route("/sample-design", get(design::sample_design))
        .route("/test-upload", post(design::test_upload))
        .route("/generate-replicate", post(design::generate_replicate))
}

/// `*` anywhere in the list opens the API to every origin, without credentials.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);
    if origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Ignoring CORS origin '{origin}': {e}");
                None
            }
        })
        .collect::<Vec<_>>();
    layer.allow_origin(origins).allow_credentials(true)
}

pub fn setup_routes(state: AppState) -> Router {
    let config = &state.config;
    Router::new()
        .route("/", get(status::root))
        .route("/health", get(status::health))
        .nest("/api", api_routes())
        .nest_service("/storage", ServeDir::new(state.storage.root()))
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .layer(DefaultBodyLimit::max(config.max_file_size + BODY_OVERHEAD))
        .layer(cors_layer(&config.cors_origins))
        .layer(CompressionLayer::new())
        .with_state(state)
}

/// Deletes artifacts older than `days` every `interval`, forever.
pub async fn start_cleanup_loop(storage: StorageService, days: u64, interval: Duration) {
    loop {
        match storage.cleanup_older_than(days).await {
            Ok(0) => log::info!("Cleanup found nothing older than {days} days"),
            Ok(removed) => log::info!("Cleanup removed {removed} entries older than {days} days"),
            Err(e) => log::error!("Cleanup failed: {e:?}"),
        }
        log::info!("Next cleanup in {}", format_duration(interval));
        tokio::time::sleep(interval).await;
    }
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    if total_seconds < 60 {
        return "less than a minute".to_string();
    }

    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let plural = |n: u64| if n == 1 { "" } else { "s" };

    match (hours, minutes) {
        (0, m) => format!("{m} minute{}", plural(m)),
        (h, 0) => format!("{h} hour{}", plural(h)),
        (h, m) => format!("{h} hour{} {m} minute{}", plural(h), plural(m)),
    }
}

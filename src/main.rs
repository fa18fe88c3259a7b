use anyhow::{Context, Result};
use packsmith::{
    config::{AppMode, Config},
    diffusion::{
        loader::ModelLoader,
        routes::{DiffusionState, setup_routes as diffusion_routes},
        webui::WebUiBackend,
    },
    server::{
        AppState,
        routing::{setup_routes, start_cleanup_loop},
    },
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()?;

    let config = Config::from_env()?;
    let addr = format!("{}:{}", config.host, config.port);

    let app = match config.mode {
        AppMode::Backend => {
            let state = AppState::new(config).await?;
            let storage = state.storage.clone();
            let (days, interval) = (state.config.cleanup_days, state.config.cleanup_interval);
            tokio::spawn(async move {
                Box::pin(start_cleanup_loop(storage, days, interval)).await;
            });
            setup_routes(state)
        }
        AppMode::Diffusion => {
            let backend = WebUiBackend::new(reqwest::Client::new(), &config);
            diffusion_routes(DiffusionState {
                loader: ModelLoader::new(Arc::new(backend)),
                device: config.diffusion_device,
            })
        }
    };

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    log::info!("Listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

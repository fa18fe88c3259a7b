//! Self-hosted image service: a lazily loaded diffusion model behind a small
//! form-based HTTP API.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub mod loader;
pub mod routes;
pub mod webui;

#[derive(Debug, Clone, PartialEq)]
pub struct DiffusionRequest {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub guidance_scale: f32,
}

/// A loaded model, ready to turn prompts into PNG bytes.
#[async_trait]
pub trait DiffusionPipeline: Send + Sync {
    async fn generate(&self, request: &DiffusionRequest) -> Result<Vec<u8>>;
}

/// Knows how to bring a model into memory.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn DiffusionPipeline>>;
}

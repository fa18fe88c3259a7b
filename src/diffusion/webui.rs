use super::{DiffusionPipeline, DiffusionRequest, ModelBackend};
use crate::config::{Config, Device};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::{sync::Arc, time::Duration};

/// Model switches can take minutes on CPU.
const LOAD_TIMEOUT: Duration = Duration::from_secs(600);
const GENERATE_TIMEOUT: Duration = Duration::from_secs(300);

/// Drives a Stable Diffusion WebUI-compatible runtime over its `sdapi`.
///
/// The runtime owns device selection and precision through its own launch
/// flags (`--use-cpu`, `--no-half`), and `sdapi` has no per-request switch for
/// either. `device` records what the runtime was started with, for the load
/// log and the status route.
pub struct WebUiBackend {
    client: Client,
    base_url: String,
    model: String,
    device: Device,
}

#[derive(Deserialize)]
struct SdModel {
    title: String,
    model_name: String,
}

#[derive(Deserialize)]
struct Txt2ImgResponse {
    #[serde(default)]
    images: Vec<String>,
}

impl WebUiBackend {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.diffusion_runtime_url.trim_end_matches('/').to_string(),
            model: config.diffusion_model.clone(),
            device: config.diffusion_device,
        }
    }

    /// Finds the checkpoint whose title or name mentions the configured model.
    fn pick_checkpoint<'a>(&self, models: &'a [SdModel]) -> Option<&'a SdModel> {
        let wanted = self.model.rsplit('/').next().unwrap_or(&self.model).to_lowercase();
        models.iter().find(|m| {
            m.title.to_lowercase().contains(&wanted) || m.model_name.to_lowercase().contains(&wanted)
        })
    }
}

#[async_trait]
impl ModelBackend for WebUiBackend {
    async fn load(&self) -> Result<Arc<dyn DiffusionPipeline>> {
        log::info!(
            "Loading {} on {} ({})",
            self.model,
            self.device.as_str(),
            self.device.precision()
        );
        let models: Vec<SdModel> = self
            .client
            .get(format!("{}/sdapi/v1/sd-models", self.base_url))
            .timeout(LOAD_TIMEOUT)
            .send()
            .await
            .context("diffusion runtime unreachable")?
            .error_for_status()?
            .json()
            .await?;
        let checkpoint = self
            .pick_checkpoint(&models)
            .ok_or_else(|| anyhow!("checkpoint '{}' not available in the runtime", self.model))?;

        self.client
            .post(format!("{}/sdapi/v1/options", self.base_url))
            .timeout(LOAD_TIMEOUT)
            .json(&json!({ "sd_model_checkpoint": checkpoint.title }))
            .send()
            .await?
            .error_for_status()
            .context("runtime refused the checkpoint")?;

        Ok(Arc::new(WebUiPipeline {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
        }))
    }
}

struct WebUiPipeline {
    client: Client,
    base_url: String,
}

#[async_trait]
impl DiffusionPipeline for WebUiPipeline {
    async fn generate(&self, request: &DiffusionRequest) -> Result<Vec<u8>> {
        let response: Txt2ImgResponse = self
            .client
            .post(format!("{}/sdapi/v1/txt2img", self.base_url))
            .timeout(GENERATE_TIMEOUT)
            .json(&json!({
                "prompt": request.prompt,
                "width": request.width,
                "height": request.height,
                "steps": request.steps,
                "cfg_scale": request.guidance_scale,
                "batch_size": 1,
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let image = response
            .images
            .first()
            .ok_or_else(|| anyhow!("runtime returned no images"))?;
        Ok(STANDARD.decode(image)?)
    }
}

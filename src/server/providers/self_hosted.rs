use super::ensure_success;
use crate::{
    config::Config,
    server::cascade::{GeneratedImage, GenerationRequest, ImageProducer, ProducerError},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Client for our own diffusion service (`APP_MODE=diffusion`).
pub struct SelfHostedProducer {
    client: Client,
    base_url: Option<String>,
    timeout: Duration,
}

#[derive(Deserialize)]
struct PackagingResponse {
    image_data: Option<String>,
    prompt_used: Option<String>,
    generator: Option<String>,
}

impl SelfHostedProducer {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config
                .self_hosted_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
            timeout: config.provider_timeout,
        }
    }
}

#[async_trait]
impl ImageProducer for SelfHostedProducer {
    fn name(&self) -> &'static str {
        "self-hosted"
    }

    fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<GeneratedImage, ProducerError> {
        let base_url = self
            .base_url
            .as_deref()
            .ok_or(ProducerError::NotConfigured("SELF_HOSTED_DIFFUSION_URL"))?;

        let product = &request.product;
        let colors = if product.colors.is_empty() {
            "green,yellow".to_string()
        } else {
            product.colors.join(",")
        };

        // A 503 here means the model is still loading; treated like any failure.
        let response = self
            .client
            .post(format!("{base_url}/generate-packaging/"))
            .timeout(self.timeout)
            .form(&[
                ("product_name", product.product_name.as_str()),
                ("colors", colors.as_str()),
                ("emotion", product.desired_emotion.as_str()),
                ("platform", product.sales_platform.as_str()),
            ])
            .send()
            .await?;
        let parsed: PackagingResponse = ensure_success(response).await?.json().await?;
        let image_url = parsed
            .image_data
            .filter(|data| data.starts_with("data:image/"))
            .ok_or_else(|| ProducerError::Malformed("no image_data in response".to_string()))?;

        Ok(GeneratedImage {
            image_url,
            generator: parsed
                .generator
                .unwrap_or_else(|| "Self-hosted Stable Diffusion".to_string()),
            cost: "FREE".to_string(),
            prompt_used: parsed.prompt_used,
            confidence: 0.9,
            advice: None,
        })
    }
}

use super::ensure_success;
use crate::{
    config::Config,
    server::{
        cascade::{GeneratedImage, GenerationRequest, ImageProducer, ProducerError},
        prompt,
    },
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// <https://deepai.org/machine-learning-model/text2img>
pub struct DeepAiProducer {
    client: Client,
    api_key: Option<String>,
    url: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct Text2ImgResponse {
    output_url: Option<String>,
}

impl DeepAiProducer {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            api_key: config.deepai_api_key.clone(),
            url: config.deepai_url.clone(),
            timeout: config.provider_timeout,
        }
    }
}

#[async_trait]
impl ImageProducer for DeepAiProducer {
    fn name(&self) -> &'static str {
        "deepai"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<GeneratedImage, ProducerError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProducerError::NotConfigured("DEEPAI_API_KEY"))?;

        let mut prompt = prompt::packaging_prompt(&request.product);
        if let Some(instructions) = &request.instructions {
            prompt = format!("{prompt}, {}", instructions.replace('\n', " "));
        }

        let response = self
            .client
            .post(&self.url)
            .header("api-key", api_key)
            .timeout(self.timeout)
            .form(&[("text", prompt.as_str())])
            .send()
            .await?;
        let parsed: Text2ImgResponse = ensure_success(response).await?.json().await?;
        let image_url = parsed
            .output_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ProducerError::Malformed("no output_url in response".to_string()))?;

        Ok(GeneratedImage {
            image_url,
            generator: "DeepAI Text2Image".to_string(),
            cost: "~$0.005 per image".to_string(),
            prompt_used: Some(prompt),
            confidence: 0.94,
            advice: None,
        })
    }
}

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
use serde_json::{Value, json};
use std::time::{Duration, Instant};

/// <https://replicate.com/stability-ai/sdxl>
const SDXL_VERSION: &str = "39ed52f2a78e934b3ba6e2a89f5b1c712de7dfea535525255b1aa35c5565e08b";
const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct ReplicateProducer {
    client: Client,
    api_token: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl ReplicateProducer {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            api_token: config.replicate_api_token.clone(),
            base_url: config.replicate_base_url.trim_end_matches('/').to_string(),
            timeout: config.provider_timeout,
        }
    }

    /// Creates a prediction and polls it until it settles or the timeout hits.
    async fn request_prediction(&self, api_token: &str, input_json: &Value) -> Result<String, ProducerError> {
        let started = Instant::now();
        let response = self
            .client
            .post(format!("{}/predictions", self.base_url))
            .bearer_auth(api_token)
            .timeout(self.timeout)
            .json(input_json)
            .send()
            .await?;
        let response_json: Value = ensure_success(response).await?.json().await?;
        let status_url = response_json["urls"]["get"]
            .as_str()
            .ok_or_else(|| ProducerError::Malformed("no status URL in prediction".to_string()))?
            .to_string();

        let mut status_json = response_json;
        loop {
            match status_json["status"].as_str() {
                Some("succeeded") => return prediction_output(&status_json),
                Some(status @ ("failed" | "canceled")) => {
                    return Err(ProducerError::Upstream {
                        status: 200,
                        body: format!(
                            "prediction {status}: {}",
                            status_json["error"].as_str().unwrap_or("no error given")
                        ),
                    });
                }
                _ => {}
            }
            if started.elapsed() >= self.timeout {
                return Err(ProducerError::Timeout(self.timeout.as_secs()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;

            let status_response = self
                .client
                .get(&status_url)
                .bearer_auth(api_token)
                .timeout(self.timeout)
                .send()
                .await?;
            status_json = ensure_success(status_response).await?.json().await?;
        }
    }
}

/// Replicate returns either a single URL or a list of them.
fn prediction_output(status_json: &Value) -> Result<String, ProducerError> {
    if let Some(url) = status_json["output"].as_str() {
        return Ok(url.to_string());
    }
    status_json["output"]
        .as_array()
        .and_then(|arr| arr.first())
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| ProducerError::Malformed("prediction has no output".to_string()))
}

#[async_trait]
impl ImageProducer for ReplicateProducer {
    fn name(&self) -> &'static str {
        "replicate"
    }

    fn is_configured(&self) -> bool {
        self.api_token.is_some()
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<GeneratedImage, ProducerError> {
        let api_token = self
            .api_token
            .as_deref()
            .ok_or(ProducerError::NotConfigured("REPLICATE_API_TOKEN"))?;

        let mut prompt = prompt::packaging_prompt(&request.product);
        if let Some(instructions) = &request.instructions {
            prompt = format!("{prompt}, {}", instructions.replace('\n', " "));
        }

        let image_url = self
            .request_prediction(
                api_token,
                &json!({
                    "version": SDXL_VERSION,
                    "input": {
                        "prompt": prompt,
                        "width": 1024,
                        "height": 1024,
                        "num_outputs": 1,
                        "scheduler": "K_EULER",
                        "num_inference_steps": 20,
                        "guidance_scale": 7.5,
                        "prompt_strength": 0.8,
                        "refine": "expert_ensemble_refiner",
                        "high_noise_frac": 0.8
                    }
                }),
            )
            .await?;

        Ok(GeneratedImage {
            image_url,
            generator: "Stability AI SDXL (Replicate)".to_string(),
            cost: "~$0.0012 per image".to_string(),
            prompt_used: Some(prompt),
            confidence: 0.94,
            advice: None,
        })
    }
}

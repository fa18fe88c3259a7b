use super::{data_url, ensure_success};
use crate::{
    config::Config,
    server::{
        cascade::{GeneratedImage, GenerationRequest, ImageProducer, ProducerError},
        prompt,
    },
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Image generation through the Gemini `generateContent` endpoint, with the
/// product photo attached as reference.
pub struct GeminiProducer {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

impl GeminiProducer {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            api_key: config.gemini_api_key.clone(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            timeout: config.provider_timeout,
        }
    }

    /// Whether the configured model answers at all.
    pub async fn check_health(&self) -> bool {
        let Some(api_key) = &self.api_key else {
            return false;
        };
        self.client
            .get(format!("{}/models/{}", self.base_url, self.model))
            .header("x-goog-api-key", api_key)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .is_ok_and(|response| response.status().is_success())
    }
}

#[async_trait]
impl ImageProducer for GeminiProducer {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<GeneratedImage, ProducerError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProducerError::NotConfigured("GEMINI_API_KEY"))?;

        let mut prompt = prompt::design_prompt(&request.product, &request.concepts);
        if let Some(instructions) = &request.instructions {
            prompt.push_str("\n\n");
            prompt.push_str(instructions);
        }

        let mut parts = vec![json!({ "text": prompt })];
        if let Some(photo) = &request.product.photo {
            parts.push(json!({
                "inline_data": {
                    "mime_type": photo.mime,
                    "data": STANDARD.encode(&photo.bytes),
                }
            }));
        }

        let body = json!({
            "contents": [{ "parts": parts }],
            "generationConfig": { "responseModalities": ["IMAGE"] }
        });

        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .header("x-goog-api-key", api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;
        let parsed: GeminiResponse = ensure_success(response).await?.json().await?;

        let inline = parsed
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .find_map(|part| part.inline_data)
            .ok_or_else(|| ProducerError::Malformed("no inline image in response".to_string()))?;
        let bytes = STANDARD
            .decode(&inline.data)
            .map_err(|e| ProducerError::Malformed(format!("invalid base64 image: {e}")))?;

        Ok(GeneratedImage {
            image_url: data_url(&inline.mime_type, &bytes),
            generator: "Gemini Image".to_string(),
            cost: "~$0.039 per image".to_string(),
            prompt_used: Some(prompt),
            confidence: 0.94,
            advice: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{common::ProductPhoto, server::cascade::tests::request};
    use axum::{
        Json, Router,
        extract::Path,
        http::{HeaderMap, StatusCode},
        routing::get,
    };
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::sync::Arc;

    /// Serves `models/{call}`: GET for the health probe, POST for generation.
    async fn spawn_gemini(reply: Value) -> (String, Arc<Mutex<Option<Value>>>) {
        let seen = Arc::new(Mutex::new(None));
        let app = Router::new().route(
            "/models/{call}",
            get(|Path(call): Path<String>| async move {
                if call == "test-model" {
                    StatusCode::OK
                } else {
                    StatusCode::NOT_FOUND
                }
            })
            .post({
                let seen = seen.clone();
                move |Path(call): Path<String>, headers: HeaderMap, Json(body): Json<Value>| {
                    let seen = seen.clone();
                    let reply = reply.clone();
                    async move {
                        assert_eq!(call, "test-model:generateContent");
                        assert_eq!(headers["x-goog-api-key"], "g-test");
                        *seen.lock() = Some(body);
                        Json(reply)
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}"), seen)
    }

    fn producer(base_url: String) -> GeminiProducer {
        GeminiProducer::new(
            Client::new(),
            &Config {
                gemini_api_key: Some("g-test".to_string()),
                gemini_base_url: base_url,
                gemini_model: "test-model".to_string(),
                ..Config::default()
            },
        )
    }

    #[tokio::test]
    async fn sends_photo_inline_and_returns_data_url() {
        let (base_url, seen) = spawn_gemini(json!({
            "candidates": [{"content": {"parts": [
                {"text": "Here is your design"},
                {"inlineData": {"mimeType": "image/png", "data": STANDARD.encode(b"rendered png")}}
            ]}}]
        }))
        .await;
        let producer = producer(base_url);
        assert!(producer.check_health().await);

        let mut request = request("Honey Jar");
        request.product.photo = Some(ProductPhoto {
            bytes: b"jpeg bytes".to_vec(),
            mime: "image/jpeg".to_string(),
        });
        let image = producer.attempt(&request).await.unwrap();
        assert_eq!(image.image_url, data_url("image/png", b"rendered png"));
        assert_eq!(image.generator, "Gemini Image");

        let body = seen.lock().clone().unwrap();
        let parts = &body["contents"][0]["parts"];
        assert!(parts[0]["text"].as_str().unwrap().contains("Honey Jar"));
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(parts[1]["inline_data"]["data"], STANDARD.encode(b"jpeg bytes"));
        assert_eq!(body["generationConfig"]["responseModalities"][0], "IMAGE");
    }

    #[tokio::test]
    async fn text_only_reply_is_malformed() {
        let (base_url, _) = spawn_gemini(json!({
            "candidates": [{"content": {"parts": [{"text": "I cannot draw that"}]}}]
        }))
        .await;
        let err = producer(base_url).attempt(&request("Honey Jar")).await.unwrap_err();
        assert!(matches!(err, ProducerError::Malformed(_)));
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let producer = GeminiProducer::new(Client::new(), &Config::default());
        assert!(!producer.is_configured());
        assert!(!producer.check_health().await);
        let err = producer.attempt(&request("Honey Jar")).await.unwrap_err();
        assert!(matches!(err, ProducerError::NotConfigured(_)));
    }

    #[test]
    fn response_parsing_finds_inline_image() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"here"},{"inlineData":{"mimeType":"image/png","data":"iVBORw0K"}}]}}]}"#;
        let parsed: GeminiResponse = serde_json::from_str(body).unwrap();
        let inline = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.inline_data)
            .unwrap();
        assert_eq!(inline.mime_type, "image/png");
    }
}

//! Ordered chain of image producers, ending in plain-text advice.
//!
//! Each producer is attempted once, in order. The first success wins and
//! every failure moves straight to the next stage, so the caller always gets a
//! result labelled with the generator that made it.

use crate::{
    common::{Advice, Concepts, ProductData},
    config::{Config, ProviderKind},
    server::{
        advisor,
        providers::{
            bitmap::BitmapFallback, deepai::DeepAiProducer, gemini::GeminiProducer,
            replicate::ReplicateProducer, self_hosted::SelfHostedProducer, vector::VectorFallback,
        },
    },
};
use async_trait::async_trait;
use reqwest::Client;

pub const ADVISOR_GENERATOR: &str = "Smart Packaging Advisor";

#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("timed out after {0} seconds")]
    Timeout(u64),
    #[error("render failed: {0}")]
    Render(String),
}

/// Input shared by every stage.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub product: ProductData,
    pub concepts: Concepts,
    /// Extra instructions, e.g. customisations on regenerate.
    pub instructions: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeneratedImage {
    /// Remote URL or `data:` URL.
    pub image_url: String,
    pub generator: String,
    pub cost: String,
    pub prompt_used: Option<String>,
    pub confidence: f64,
    pub advice: Option<Advice>,
}

#[derive(Debug, Clone)]
pub enum Generation {
    Image(GeneratedImage),
    Advice(Advice),
}

impl Generation {
    pub fn generator(&self) -> &str {
        match self {
            Self::Image(image) => &image.generator,
            Self::Advice(_) => ADVISOR_GENERATOR,
        }
    }

    pub fn cost(&self) -> &str {
        match self {
            Self::Image(image) => &image.cost,
            Self::Advice(_) => "FREE",
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Self::Image(image) => image.confidence,
            Self::Advice(_) => 0.98,
        }
    }
}

#[async_trait]
pub trait ImageProducer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this stage calls out to a third-party service.
    fn is_remote(&self) -> bool {
        true
    }

    /// Whether this stage can be attempted at all with the current config.
    fn is_configured(&self) -> bool {
        true
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<GeneratedImage, ProducerError>;
}

pub struct Cascade {
    producers: Vec<Box<dyn ImageProducer>>,
}

impl Cascade {
    pub fn new(producers: Vec<Box<dyn ImageProducer>>) -> Self {
        Self { producers }
    }

    /// Remote providers in `providers` order, then the local fallbacks.
    pub fn from_config(config: &Config, client: &Client, providers: &[ProviderKind]) -> Self {
        let mut producers: Vec<Box<dyn ImageProducer>> = providers
            .iter()
            .map(|kind| -> Box<dyn ImageProducer> {
                match kind {
                    ProviderKind::Gemini => Box::new(GeminiProducer::new(client.clone(), config)),
                    ProviderKind::Replicate => Box::new(ReplicateProducer::new(client.clone(), config)),
                    ProviderKind::DeepAi => Box::new(DeepAiProducer::new(client.clone(), config)),
                    ProviderKind::SelfHosted => {
                        Box::new(SelfHostedProducer::new(client.clone(), config))
                    }
                }
            })
            .collect();
        producers.push(Box::new(BitmapFallback::new(config.font_path.clone())));
        if config.vector_fallback {
            producers.push(Box::new(VectorFallback));
        }
        Self::new(producers)
    }

    pub fn has_remote(&self) -> bool {
        self.producers
            .iter()
            .any(|producer| producer.is_remote() && producer.is_configured())
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.producers.iter().map(|producer| producer.name()).collect()
    }

    pub async fn run(&self, request: &GenerationRequest) -> Generation {
        for producer in &self.producers {
            match producer.attempt(request).await {
                Ok(image) => {
                    log::info!(
                        "Generated packaging for '{}' with {}",
                        request.product.product_name, image.generator
                    );
                    return Generation::Image(image);
                }
                Err(e) => log::warn!("{} failed, falling back: {e}", producer.name()),
            }
        }
        log::info!(
            "No image producer succeeded for '{}', returning advice",
            request.product.product_name
        );
        Generation::Advice(advisor::advise(&request.product))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::server::concepts::generate_concepts;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    pub struct Scripted {
        pub name: &'static str,
        pub succeed: bool,
        pub calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        pub fn new(name: &'static str, succeed: bool) -> Self {
            Self {
                name,
                succeed,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl ImageProducer for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn attempt(&self, _request: &GenerationRequest) -> Result<GeneratedImage, ProducerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(GeneratedImage {
                    image_url: format!("data:image/png;base64,{}", self.name),
                    generator: self.name.to_string(),
                    cost: "FREE".to_string(),
                    prompt_used: None,
                    confidence: 0.9,
                    advice: None,
                })
            } else {
                Err(ProducerError::Render(format!("{} scripted failure", self.name)))
            }
        }
    }

    pub fn request(name: &str) -> GenerationRequest {
        GenerationRequest {
            product: ProductData::new(name),
            concepts: generate_concepts(name, "trust", "local-market"),
            instructions: None,
        }
    }

    #[tokio::test]
    async fn remote_failure_falls_to_bitmap() {
        let cascade = Cascade::new(vec![
            Box::new(Scripted::new("remote", false)),
            Box::new(Scripted::new("bitmap", true)),
            Box::new(Scripted::new("vector", true)),
        ]);
        let outcome = cascade.run(&request("Honey Jar")).await;
        assert_eq!(outcome.generator(), "bitmap");
        assert!(matches!(outcome, Generation::Image(_)));
    }

    #[tokio::test]
    async fn bitmap_failure_falls_to_vector() {
        let cascade = Cascade::new(vec![
            Box::new(Scripted::new("remote", false)),
            Box::new(Scripted::new("bitmap", false)),
            Box::new(Scripted::new("vector", true)),
        ]);
        assert_eq!(cascade.run(&request("Honey Jar")).await.generator(), "vector");
    }

    #[tokio::test]
    async fn all_failures_yield_advice() {
        let cascade = Cascade::new(vec![
            Box::new(Scripted::new("remote", false)),
            Box::new(Scripted::new("bitmap", false)),
            Box::new(Scripted::new("vector", false)),
        ]);
        match cascade.run(&request("Honey Jar")).await {
            Generation::Advice(advice) => {
                assert!(advice.professional_advice.contains("Honey Jar"));
                assert_eq!(advice.concept_summary.len(), 4);
            }
            Generation::Image(image) => panic!("unexpected image from {}", image.generator),
        }
    }

    #[tokio::test]
    async fn success_stops_the_chain_and_nothing_retries() {
        let remote = Scripted::new("remote", false);
        let primary = Scripted::new("primary", true);
        let later = Scripted::new("later", true);
        let (remote_calls, primary_calls, later_calls) =
            (remote.calls.clone(), primary.calls.clone(), later.calls.clone());

        let cascade = Cascade::new(vec![Box::new(remote), Box::new(primary), Box::new(later)]);
        assert_eq!(cascade.run(&request("Rice")).await.generator(), "primary");
        assert_eq!(remote_calls.load(Ordering::SeqCst), 1);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn config_builds_remote_then_local_stages() {
        let config = Config {
            image_providers: vec![ProviderKind::Gemini, ProviderKind::DeepAi],
            ..Config::default()
        };
        let cascade = Cascade::from_config(&config, &Client::new(), &config.image_providers);
        assert_eq!(
            cascade.stage_names(),
            vec!["gemini", "deepai", "bitmap-fallback", "vector-fallback"]
        );
        assert!(!cascade.has_remote());

        let config = Config {
            deepai_api_key: Some("key".to_string()),
            vector_fallback: false,
            ..Config::default()
        };
        let cascade = Cascade::from_config(&config, &Client::new(), &config.image_providers);
        assert_eq!(cascade.stage_names(), vec!["deepai", "bitmap-fallback"]);
        assert!(cascade.has_remote());
    }
}

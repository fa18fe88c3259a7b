use crate::config::{Config, ProviderKind};
use anyhow::Result;
use cascade::Cascade;
use providers::gemini::GeminiProducer;
use reqwest::Client;
use std::sync::{Arc, LazyLock};
use storage::StorageService;

pub mod advisor;
pub mod cascade;
pub mod concepts;
pub mod design;
pub mod error;
pub mod prompt;
pub mod providers;
pub mod report;
pub mod routing;
pub mod status;
pub mod storage;

static HTTP_CLIENT: LazyLock<Client> = LazyLock::new(Client::new);

/// Everything the backend handlers share.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: StorageService,
    pub cascade: Arc<Cascade>,
    /// Same fallbacks, but headed by Replicate.
    pub replicate_cascade: Arc<Cascade>,
    pub gemini: Option<Arc<GeminiProducer>>,
    pub client: Client,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        let storage = StorageService::open(config.storage_root.clone()).await?;
        Ok(Self::with_storage(config, storage))
    }

    pub fn with_storage(config: Config, storage: StorageService) -> Self {
        let client = HTTP_CLIENT.clone();
        let cascade = Cascade::from_config(&config, &client, &config.image_providers);
        let replicate_cascade = Cascade::from_config(&config, &client, &[ProviderKind::Replicate]);
        let gemini = config
            .image_providers
            .contains(&ProviderKind::Gemini)
            .then(|| Arc::new(GeminiProducer::new(client.clone(), &config)));
        log::info!("Generator cascade: {}", cascade.stage_names().join(" -> "));

        Self {
            config: Arc::new(config),
            storage,
            cascade: Arc::new(cascade),
            replicate_cascade: Arc::new(replicate_cascade),
            gemini,
            client,
        }
    }
}

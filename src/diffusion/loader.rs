use super::{DiffusionPipeline, ModelBackend};
use parking_lot::Mutex;
use std::{sync::Arc, time::Instant};

enum Slot {
    Unloaded,
    Loading,
    Ready(Arc<dyn DiffusionPipeline>),
    Failed(String),
}

/// Outcome of [`ModelLoader::ensure_loaded`].
pub enum LoadStatus {
    Ready(Arc<dyn DiffusionPipeline>),
    Loading,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    NotLoaded,
    Loading,
    Loaded,
    Failed,
}

impl ModelState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotLoaded => "not_loaded",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Failed => "failed",
        }
    }
}

/// Loads the model on first use. Only one load runs at a time; callers that
/// arrive meanwhile are told to come back later.
pub struct ModelLoader {
    backend: Arc<dyn ModelBackend>,
    slot: Mutex<Slot>,
}

impl ModelLoader {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            slot: Mutex::new(Slot::Unloaded),
        })
    }

    pub fn state(&self) -> ModelState {
        match &*self.slot.lock() {
            Slot::Unloaded => ModelState::NotLoaded,
            Slot::Loading => ModelState::Loading,
            Slot::Ready(_) => ModelState::Loaded,
            Slot::Failed(_) => ModelState::Failed,
        }
    }

    /// Message of the last failed load, if the model is in that state.
    pub fn last_error(&self) -> Option<String> {
        match &*self.slot.lock() {
            Slot::Failed(message) => Some(message.clone()),
            _ => None,
        }
    }

    pub async fn ensure_loaded(self: &Arc<Self>) -> LoadStatus {
        {
            let mut slot = self.slot.lock();
            match &*slot {
                Slot::Ready(pipeline) => return LoadStatus::Ready(Arc::clone(pipeline)),
                Slot::Loading => return LoadStatus::Loading,
                Slot::Unloaded | Slot::Failed(_) => *slot = Slot::Loading,
            }
        }

        // The load owns its own task so a dropped request cannot leave the
        // slot stuck in Loading.
        let loader = Arc::clone(self);
        let task = tokio::spawn(async move {
            let started = Instant::now();
            log::info!("Loading diffusion model...");
            let result = loader.backend.load().await;
            let mut slot = loader.slot.lock();
            match result {
                Ok(pipeline) => {
                    log::info!("Model loaded in {:.1}s", started.elapsed().as_secs_f64());
                    *slot = Slot::Ready(Arc::clone(&pipeline));
                    LoadStatus::Ready(pipeline)
                }
                Err(e) => {
                    log::error!("Failed to load model: {e:?}");
                    let message = format!("{e:#}");
                    *slot = Slot::Failed(message.clone());
                    LoadStatus::Failed(message)
                }
            }
        });

        match task.await {
            Ok(status) => status,
            Err(e) => {
                let message = format!("model load task ended: {e}");
                log::error!("{message}");
                *self.slot.lock() = Slot::Failed(message.clone());
                LoadStatus::Failed(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diffusion::DiffusionRequest;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct Blank;

    #[async_trait]
    impl DiffusionPipeline for Blank {
        async fn generate(&self, _request: &DiffusionRequest) -> Result<Vec<u8>> {
            Ok(vec![0x89, b'P', b'N', b'G'])
        }
    }

    /// Counts loads and waits for `gate` before finishing each one.
    struct GatedBackend {
        loads: AtomicUsize,
        fail: AtomicBool,
        gate: Notify,
    }

    impl GatedBackend {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                loads: AtomicUsize::new(0),
                fail: AtomicBool::new(fail),
                gate: Notify::new(),
            })
        }
    }

    #[async_trait]
    impl ModelBackend for GatedBackend {
        async fn load(&self) -> Result<Arc<dyn DiffusionPipeline>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            if self.fail.load(Ordering::SeqCst) {
                Err(anyhow!("weights missing"))
            } else {
                Ok(Arc::new(Blank))
            }
        }
    }

    async fn wait_for(loader: &ModelLoader, state: ModelState) {
        for _ in 0..100 {
            if loader.state() == state {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("loader never reached {state:?}");
    }

    #[tokio::test]
    async fn first_call_loads_and_later_calls_reuse() {
        let backend = GatedBackend::new(false);
        let loader = ModelLoader::new(backend.clone());
        assert_eq!(loader.state(), ModelState::NotLoaded);

        let first = tokio::spawn({
            let loader = loader.clone();
            async move { loader.ensure_loaded().await }
        });
        wait_for(&loader, ModelState::Loading).await;
        backend.gate.notify_one();
        assert!(matches!(first.await.unwrap(), LoadStatus::Ready(_)));

        assert!(matches!(loader.ensure_loaded().await, LoadStatus::Ready(_)));
        assert_eq!(backend.loads.load(Ordering::SeqCst), 1);
        assert_eq!(loader.state(), ModelState::Loaded);
    }

    #[tokio::test]
    async fn call_during_loading_does_not_start_another_load() {
        let backend = GatedBackend::new(false);
        let loader = ModelLoader::new(backend.clone());

        let first = tokio::spawn({
            let loader = loader.clone();
            async move { loader.ensure_loaded().await }
        });
        wait_for(&loader, ModelState::Loading).await;

        assert!(matches!(loader.ensure_loaded().await, LoadStatus::Loading));
        assert_eq!(backend.loads.load(Ordering::SeqCst), 1);

        backend.gate.notify_one();
        assert!(matches!(first.await.unwrap(), LoadStatus::Ready(_)));
    }

    #[tokio::test]
    async fn failed_load_is_reported_then_retried() {
        let backend = GatedBackend::new(true);
        let loader = ModelLoader::new(backend.clone());

        backend.gate.notify_one();
        match loader.ensure_loaded().await {
            LoadStatus::Failed(message) => assert!(message.contains("weights missing")),
            _ => panic!("expected a failed load"),
        }
        assert_eq!(loader.state(), ModelState::Failed);
        assert!(loader.last_error().is_some_and(|m| m.contains("weights missing")));

        backend.fail.store(false, Ordering::SeqCst);
        backend.gate.notify_one();
        assert!(matches!(loader.ensure_loaded().await, LoadStatus::Ready(_)));
        assert_eq!(backend.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dropped_caller_does_not_strand_the_load() {
        let backend = GatedBackend::new(false);
        let loader = ModelLoader::new(backend.clone());

        let first = tokio::spawn({
            let loader = loader.clone();
            async move { loader.ensure_loaded().await }
        });
        wait_for(&loader, ModelState::Loading).await;
        first.abort();

        backend.gate.notify_one();
        wait_for(&loader, ModelState::Loaded).await;
        assert_eq!(backend.loads.load(Ordering::SeqCst), 1);
    }
}

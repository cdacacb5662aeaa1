use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tracing::info;

use crate::config::{AppConfig, EngineKind};
use crate::engine::{CandleEngine, DummyEngine, InferenceEngine};

/// Shared service state:
/// - engine: the single generation backend loaded at startup
/// - config: service settings, including sampling parameters
/// - semaphore: caps concurrent generation calls
pub struct AppState {
    pub engine: Arc<dyn InferenceEngine>,
    pub config: AppConfig,
    pub semaphore: Arc<Semaphore>,
}

impl AppState {
    pub fn new(engine: Arc<dyn InferenceEngine>, config: AppConfig) -> Arc<Self> {
        let permits = config.max_concurrent_generations.max(1);
        Arc::new(Self {
            engine,
            config,
            semaphore: Arc::new(Semaphore::new(permits)),
        })
    }

    /// Builds the engine named by `config.engine`. Blocking: the Candle
    /// engine downloads and loads model weights.
    pub fn load(config: AppConfig) -> Result<Arc<Self>> {
        info!(engine = ?config.engine, model = %config.model_id, "loading recipe model");

        let engine: Arc<dyn InferenceEngine> = match config.engine {
            EngineKind::Dummy => DummyEngine::new(&config.model_id),
            EngineKind::Candle => {
                CandleEngine::new(&config.model_id, config.tokenizer_id(), &config.weights_file)?
            }
        };

        info!(model = %config.model_id, "recipe model loaded");
        Ok(Self::new(engine, config))
    }

    /// Runs one generation call once a concurrency permit is free.
    pub async fn generate(&self, prompt: &str) -> Result<Vec<String>> {
        let _permit = self.semaphore.acquire().await?;
        self.engine
            .generate(prompt, &self.config.sampling_params())
            .await
    }

    pub fn special_tokens(&self) -> &[String] {
        self.engine.special_tokens()
    }
}

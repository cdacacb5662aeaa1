use serde::Deserialize;

use crate::sampling::SamplingParams;

pub const DEFAULT_MODEL_ID: &str = "flax-community/t5-recipe-generation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Dummy,
    Candle,
}

/// Service settings, extracted from Rocket's figment (`Rocket.toml` and
/// `ROCKET_*` environment variables) next to Rocket's own keys.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub engine: EngineKind,
    pub model_id: String,
    /// Falls back to `model_id` when unset.
    pub tokenizer_id: Option<String>,
    pub weights_file: String,
    pub num_return_sequences: usize,
    pub max_length: usize,
    pub top_k: usize,
    pub top_p: f64,
    pub seed: Option<u64>,
    pub max_concurrent_generations: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        let sampling = SamplingParams::default();
        Self {
            service_name: "Grocify ML Service".to_string(),
            engine: EngineKind::Candle,
            model_id: DEFAULT_MODEL_ID.to_string(),
            tokenizer_id: None,
            weights_file: "pytorch_model.bin".to_string(),
            num_return_sequences: sampling.num_return_sequences,
            max_length: sampling.max_length,
            top_k: sampling.top_k,
            top_p: sampling.top_p,
            seed: sampling.seed,
            max_concurrent_generations: 2,
        }
    }
}

impl AppConfig {
    pub fn tokenizer_id(&self) -> &str {
        self.tokenizer_id.as_deref().unwrap_or(&self.model_id)
    }

    pub fn sampling_params(&self) -> SamplingParams {
        SamplingParams {
            num_return_sequences: self.num_return_sequences,
            max_length: self.max_length,
            top_k: self.top_k,
            top_p: self.top_p,
            seed: self.seed,
        }
    }
}

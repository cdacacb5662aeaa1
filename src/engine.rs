use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::t5;
use hf_hub::api::sync::{Api, ApiRepo};
use tokenizers::Tokenizer;

use crate::parser::{ITEM_MARKER, SECTION_MARKER};
use crate::prompt::PROMPT_PREFIX;
use crate::sampling::{sample_top_k_top_p, SamplingParams};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to fetch `{file}` from `{repo}`: {reason}")]
    Download {
        repo: String,
        file: String,
        reason: String,
    },

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("invalid model config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("sampling failed: {0}")]
    Sampling(String),
}

/// Text generation backend shared by all requests.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Samples `params.num_return_sequences` raw candidates for `prompt`.
    async fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<Vec<String>>;

    /// Tokens to strip from raw output before parsing.
    fn special_tokens(&self) -> &[String];
}

/// Canned engine that emits text in the recipe model's output format.
pub struct DummyEngine {
    pub model_name: String,
    special_tokens: Vec<String>,
}

impl DummyEngine {
    pub fn new(model_name: &str) -> Arc<Self> {
        Arc::new(Self {
            model_name: model_name.to_string(),
            special_tokens: vec!["<pad>".to_string(), "</s>".to_string(), "<unk>".to_string()],
        })
    }

    fn candidate(&self, ingredients: &[&str], index: usize) -> String {
        const STYLES: [&str; 3] = ["skillet", "bake", "salad"];
        let main = ingredients.first().copied().unwrap_or("pantry");
        let style = STYLES[index % STYLES.len()];
        let separator = format!(" {ITEM_MARKER} ");
        let items = ingredients.join(separator.as_str());

        format!(
            "<pad> title: {main} {style} {SECTION_MARKER} ingredients: {items} \
             {SECTION_MARKER} directions: prepare the {main}. {ITEM_MARKER} \
             combine everything and {style}. {ITEM_MARKER} serve warm.</s>"
        )
    }
}

#[async_trait]
impl InferenceEngine for DummyEngine {
    async fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<Vec<String>> {
        rocket::tokio::time::sleep(Duration::from_millis(50)).await;

        let ingredients: Vec<&str> = prompt
            .strip_prefix(PROMPT_PREFIX)
            .unwrap_or(prompt)
            .split(", ")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        debug!(model = %self.model_name, "dummy generation");
        Ok((0..params.num_return_sequences)
            .map(|i| self.candidate(&ingredients, i))
            .collect())
    }

    fn special_tokens(&self) -> &[String] {
        &self.special_tokens
    }
}

/// T5 encoder/decoder running on Candle.
pub struct CandleEngine {
    inner: Arc<CandleT5>,
}

struct CandleT5 {
    model_name: String,
    device: Device,
    config: t5::Config,
    model: Mutex<t5::T5ForConditionalGeneration>,
    tokenizer: Tokenizer,
    special_tokens: Vec<String>,
}

impl CandleEngine {
    /// Downloads (or reuses the hub cache for) the config, weights and
    /// tokenizer, then builds the model on CPU. Blocking.
    pub fn new(model_id: &str, tokenizer_id: &str, weights_file: &str) -> Result<Arc<Self>> {
        // 1) device: CPU
        let device = Device::Cpu;
        let api = Api::new()?;

        // 2) fetch config and weights from the model repo, tokenizer from its own repo
        let model_repo = api.model(model_id.to_string());
        let config_path = fetch(&model_repo, model_id, "config.json")?;
        let weights_path = fetch(&model_repo, model_id, weights_file)?;
        let tokenizer_repo = api.model(tokenizer_id.to_string());
        let tokenizer_path = fetch(&tokenizer_repo, tokenizer_id, "tokenizer.json")?;

        // 3) model config, with the decoder KV cache on
        let raw_config = std::fs::read_to_string(&config_path)?;
        let mut config: t5::Config = serde_json::from_str(&raw_config).map_err(EngineError::from)?;
        config.use_cache = true;

        // 4) build the weights
        let start = Instant::now();
        let vb = load_weights(&weights_path, &device)?;
        let model = t5::T5ForConditionalGeneration::load(vb, &config)?;
        info!(
            model = model_id,
            weights_bytes = std::fs::metadata(&weights_path)?.len(),
            elapsed_secs = start.elapsed().as_secs_f32(),
            "model weights loaded"
        );

        // 5) tokenizer, plus the special tokens the parser strips
        let tokenizer =
            Tokenizer::from_file(tokenizer_path).map_err(|e| EngineError::Tokenizer(e.to_string()))?;
        let mut special_tokens: Vec<String> = tokenizer
            .get_added_tokens_decoder()
            .into_values()
            .filter(|t| t.special)
            .map(|t| t.content)
            .collect();
        special_tokens.sort();
        debug!(count = special_tokens.len(), "collected special tokens");

        Ok(Arc::new(Self {
            inner: Arc::new(CandleT5 {
                model_name: model_id.to_string(),
                device,
                config,
                model: Mutex::new(model),
                tokenizer,
                special_tokens,
            }),
        }))
    }
}

fn fetch(repo: &ApiRepo, repo_name: &str, file: &str) -> Result<PathBuf> {
    repo.get(file).map_err(|e| {
        EngineError::Download {
            repo: repo_name.to_string(),
            file: file.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn load_weights(path: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let is_safetensors = path.extension().is_some_and(|ext| ext == "safetensors");
    let vb = if is_safetensors {
        // SAFETY: the hub cache file is not modified while mapped.
        unsafe { VarBuilder::from_mmaped_safetensors(&[path], DType::F32, device)? }
    } else {
        VarBuilder::from_pth(path, DType::F32, device)?
    };
    Ok(vb)
}

impl CandleT5 {
    fn generate_blocking(&self, prompt: &str, params: &SamplingParams) -> Result<Vec<String>> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| EngineError::Tokenizer(e.to_string()))?;
        let input_ids = Tensor::new(encoding.get_ids(), &self.device)?.unsqueeze(0)?;

        let mut rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        // The encoder runs once per request; every candidate reuses its output.
        let mut model = self.model.lock();
        model.clear_kv_cache();
        let encoder_output = model.encode(&input_ids)?;

        let mut outputs = Vec::with_capacity(params.num_return_sequences);
        for _ in 0..params.num_return_sequences {
            // Decoder cache belongs to one candidate.
            model.clear_kv_cache();
            let tokens = self.sample_sequence(&mut model, &encoder_output, params, &mut rng)?;
            let text = self
                .tokenizer
                .decode(&tokens, false)
                .map_err(|e| EngineError::Tokenizer(e.to_string()))?;
            debug!(model = %self.model_name, tokens = tokens.len(), "sampled candidate");
            outputs.push(text.trim().to_string());
        }

        Ok(outputs)
    }

    /// Autoregressive decoding of one candidate, without the decoder start token.
    fn sample_sequence(
        &self,
        model: &mut t5::T5ForConditionalGeneration,
        encoder_output: &Tensor,
        params: &SamplingParams,
        rng: &mut StdRng,
    ) -> Result<Vec<u32>> {
        let start_token = self
            .config
            .decoder_start_token_id
            .unwrap_or(self.config.pad_token_id) as u32;
        let eos_token = self.config.eos_token_id as u32;

        let mut tokens = vec![start_token];
        while tokens.len() < params.max_length {
            // With the KV cache on, only the newest token is fed after step one.
            let decoder_input = if tokens.len() == 1 {
                Tensor::new(tokens.as_slice(), &self.device)?.unsqueeze(0)?
            } else {
                Tensor::new(&tokens[tokens.len() - 1..], &self.device)?.unsqueeze(0)?
            };
            let logits = model
                .decode(&decoder_input, encoder_output)?
                .squeeze(0)?
                .to_dtype(DType::F32)?
                .to_vec1::<f32>()?;

            let next = sample_top_k_top_p(&logits, params.top_k, params.top_p, rng)?;
            if next == eos_token {
                break;
            }
            tokens.push(next);
        }

        Ok(tokens.split_off(1))
    }
}

#[async_trait]
impl InferenceEngine for CandleEngine {
    async fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<Vec<String>> {
        let inner = Arc::clone(&self.inner);
        let prompt = prompt.to_string();
        let params = params.clone();

        rocket::tokio::task::spawn_blocking(move || inner.generate_blocking(&prompt, &params))
            .await
            .context("generation worker did not complete")?
    }

    fn special_tokens(&self) -> &[String] {
        &self.inner.special_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::collect_recipes;

    #[rocket::async_test]
    async fn dummy_output_parses_into_distinct_recipes() {
        let engine = DummyEngine::new("dummy");
        let raws = engine
            .generate("items: tomato, cheese", &SamplingParams::default())
            .await
            .unwrap();
        assert_eq!(raws.len(), 3);

        let recipes = collect_recipes(&raws, engine.special_tokens());
        let titles: Vec<&str> = recipes.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["tomato skillet", "tomato bake", "tomato salad"]);
        assert_eq!(recipes[0].short_description, "Ingredients: Tomato, Cheese");
        assert_eq!(
            recipes[0].instructions,
            "1. Prepare the tomato.\n2. Combine everything and skillet.\n3. Serve warm."
        );
    }

    #[rocket::async_test]
    async fn dummy_honours_requested_sample_count() {
        let engine = DummyEngine::new("dummy");
        let params = SamplingParams {
            num_return_sequences: 5,
            ..SamplingParams::default()
        };

        let raws = engine.generate("items: rice", &params).await.unwrap();
        assert_eq!(raws.len(), 5);
    }
}

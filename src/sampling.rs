//! Top-k / top-p (nucleus) sampling over a single logits vector.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::engine::EngineError;

/// Sampling knobs for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    pub num_return_sequences: usize,
    pub max_length: usize,
    /// `0` disables top-k filtering.
    pub top_k: usize,
    pub top_p: f64,
    pub seed: Option<u64>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            num_return_sequences: 3,
            max_length: 512,
            top_k: 60,
            top_p: 0.95,
            seed: None,
        }
    }
}

/// Draws one token id: keep the `top_k` highest logits, softmax them, keep
/// the smallest prefix whose mass reaches `top_p`, then sample by weight.
pub fn sample_top_k_top_p<R: Rng + ?Sized>(
    logits: &[f32],
    top_k: usize,
    top_p: f64,
    rng: &mut R,
) -> Result<u32, EngineError> {
    if logits.is_empty() {
        return Err(EngineError::Sampling("empty logits".to_string()));
    }

    let mut order: Vec<usize> = (0..logits.len()).collect();
    order.sort_unstable_by(|&a, &b| logits[b].total_cmp(&logits[a]));
    if top_k > 0 {
        order.truncate(top_k);
    }

    let max_logit = logits[order[0]];
    let mut probs: Vec<f64> = order
        .iter()
        .map(|&i| f64::from(logits[i] - max_logit).exp())
        .collect();
    let total: f64 = probs.iter().sum();
    probs.iter_mut().for_each(|p| *p /= total);

    let mut cumulative = 0.0;
    let mut keep = probs.len();
    for (i, p) in probs.iter().enumerate() {
        cumulative += p;
        if cumulative >= top_p {
            keep = i + 1;
            break;
        }
    }
    order.truncate(keep);
    probs.truncate(keep);

    let dist = WeightedIndex::new(&probs).map_err(|e| EngineError::Sampling(e.to_string()))?;
    Ok(order[dist.sample(rng)] as u32)
}

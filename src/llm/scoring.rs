//! Incremental log-probability scoring
//!
//! Splits a text into a word-count prompt and a continuation, then scores the
//! continuation one token at a time with teacher forcing: each step runs the
//! model over the prompt plus the continuation tokens seen so far and reads the
//! log-probability of the actual next token from the last position.
//!
//! The split counts whitespace-delimited words, not tokens, so the
//! prompt/continuation boundary in token space is approximate.

use crate::config::ScorerConfig;
use crate::error::ScoreError;
use crate::llm::model::SequenceModel;
use crate::llm::vocab::Tokenizer;
use candle_core::{Device, Tensor, D};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

/// Per-token decomposition of `log P(continuation | prompt)`
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ScoreResult {
    pub total_log_prob: f64,
    pub per_token_log_probs: Vec<f64>,
    pub prompt_tokens: Vec<u32>,
    pub continuation_tokens: Vec<u32>,
}

impl ScoreResult {
    /// Number of scored continuation tokens
    pub fn len(&self) -> usize {
        self.per_token_log_probs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.per_token_log_probs.is_empty()
    }

    /// Average log-probability per scored token (0.0 when nothing was scored)
    pub fn mean_log_prob(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.total_log_prob / self.len() as f64
        }
    }

    /// `exp` of the mean negative log-likelihood
    pub fn perplexity(&self) -> f64 {
        (-self.mean_log_prob()).exp()
    }

    /// `(total, per_token)` pair
    pub fn into_parts(self) -> (f64, Vec<f64>) {
        (self.total_log_prob, self.per_token_log_probs)
    }
}

/// Split `text` into `(prompt, continuation)` after `prompt_words` words
///
/// Returns `None` when no words remain for the continuation.
pub fn split_prompt(text: &str, prompt_words: usize) -> Option<(String, String)> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= prompt_words {
        return None;
    }

    let (prompt, continuation) = words.split_at(prompt_words);
    Some((prompt.join(" "), continuation.join(" ")))
}

/// Numerically stable log-softmax over one logit row
fn log_softmax(logits: &[f32]) -> Result<Vec<f32>, ScoreError> {
    let row = Tensor::from_slice(logits, logits.len(), &Device::Cpu).map_err(inference)?;
    candle_nn::ops::log_softmax(&row, D::Minus1)
        .and_then(|t| t.to_vec1::<f32>())
        .map_err(inference)
}

fn inference(e: impl std::fmt::Display) -> ScoreError {
    ScoreError::ModelInference(e.to_string())
}

/// Scores continuations against an injected model and tokenizer
pub struct SequenceScorer<'a, M: ?Sized, T: ?Sized> {
    model: &'a M,
    tokenizer: &'a T,
    config: ScorerConfig,
}

impl<'a, M, T> SequenceScorer<'a, M, T>
where
    M: SequenceModel + ?Sized,
    T: Tokenizer + ?Sized,
{
    /// Create a scorer with the default configuration (two prompt words)
    pub fn new(model: &'a M, tokenizer: &'a T) -> Self {
        Self::with_config(model, tokenizer, ScorerConfig::default())
    }

    pub fn with_config(model: &'a M, tokenizer: &'a T, config: ScorerConfig) -> Self {
        SequenceScorer {
            model,
            tokenizer,
            config,
        }
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Score `text` using the configured prompt length
    pub fn score(&self, text: &str) -> Result<ScoreResult, ScoreError> {
        self.score_with_prompt(text, self.config.prompt_words)
    }

    /// Score every text in order, one result each
    pub fn score_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<Result<ScoreResult, ScoreError>> {
        texts.iter().map(|t| self.score(t.as_ref())).collect()
    }

    /// Score `text` with an explicit prompt length in words
    pub fn score_with_prompt(
        &self,
        text: &str,
        prompt_words: usize,
    ) -> Result<ScoreResult, ScoreError> {
        if text.trim().is_empty() {
            return Err(ScoreError::Input("text is empty".to_string()));
        }
        if prompt_words == 0 {
            return Err(ScoreError::Input(
                "prompt must contain at least one word".to_string(),
            ));
        }

        let (prompt, continuation) = match split_prompt(text, prompt_words) {
            Some(parts) => parts,
            None => {
                debug!(prompt_words, "text has no continuation, nothing to score");
                return Ok(ScoreResult::default());
            }
        };

        let prompt_tokens = self.tokenizer.encode(&prompt)?;
        if prompt_tokens.is_empty() {
            return Err(ScoreError::Encoding(format!(
                "prompt {:?} produced no tokens",
                prompt
            )));
        }
        let continuation_tokens = self.tokenizer.encode(&continuation)?;
        if continuation_tokens.is_empty() {
            return Err(ScoreError::Encoding(format!(
                "continuation {:?} produced no tokens",
                continuation
            )));
        }

        let per_token_log_probs = self.score_tokens(&prompt_tokens, &continuation_tokens)?;
        let total_log_prob: f64 = per_token_log_probs.iter().sum();

        info!(
            prompt_tokens = prompt_tokens.len(),
            continuation_tokens = continuation_tokens.len(),
            total_log_prob,
            "scored continuation"
        );

        Ok(ScoreResult {
            total_log_prob,
            per_token_log_probs,
            prompt_tokens,
            continuation_tokens,
        })
    }

    /// Teacher-forced log-probability of each continuation token
    fn score_tokens(&self, prompt: &[u32], continuation: &[u32]) -> Result<Vec<f64>, ScoreError> {
        let deadline = self.config.max_duration();
        let started = Instant::now();
        let vocab_size = self.model.vocab_size();

        let mut sequence = Vec::with_capacity(prompt.len() + continuation.len());
        sequence.extend_from_slice(prompt);
        let mut log_probs = Vec::with_capacity(continuation.len());

        for (step, &target) in continuation.iter().enumerate() {
            if deadline.is_some_and(|limit| started.elapsed() >= limit) {
                return Err(ScoreError::DeadlineExceeded {
                    completed: step,
                    total: continuation.len(),
                });
            }

            let logits = self.model.forward(&sequence)?;
            if logits.len() != sequence.len() {
                return Err(ScoreError::ModelInference(format!(
                    "expected {} logit rows, got {}",
                    sequence.len(),
                    logits.len()
                )));
            }

            // Non-empty: sequence always holds at least the prompt
            let last = &logits[logits.len() - 1];
            if last.len() != vocab_size {
                return Err(ScoreError::ModelInference(format!(
                    "expected {} logits per position, got {}",
                    vocab_size,
                    last.len()
                )));
            }
            if last.iter().any(|v| v.is_nan()) {
                return Err(ScoreError::ModelInference(
                    "logits contain NaN".to_string(),
                ));
            }

            let log_prob = *log_softmax(last)?.get(target as usize).ok_or_else(|| {
                ScoreError::ModelInference(format!(
                    "token {} outside vocabulary of size {}",
                    target, vocab_size
                ))
            })?;
            if !log_prob.is_finite() {
                return Err(ScoreError::ModelInference(format!(
                    "non-finite log-probability for token {}",
                    target
                )));
            }
            let log_prob = f64::from(log_prob).min(0.0);

            if tracing::enabled!(tracing::Level::DEBUG) {
                let piece = self.tokenizer.decode(&[target]).unwrap_or_default();
                debug!(step, context = sequence.len(), token = target, piece = %piece, log_prob, "scored token");
            }

            log_probs.push(log_prob);
            sequence.push(target);
        }

        Ok(log_probs)
    }
}

//! Candle model loading and inference
//!
//! Handles:
//! - Loading pre-trained weights from bincode format
//! - Causal forward pass producing one logit row per input position
//! - Tensors live on Metal on macOS, CPU elsewhere; logits are copied back
//!   to host rows for scoring

use crate::error::ModelError;
use candle_core::{Device, Tensor};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// A causal language model that can score a token sequence
///
/// `forward` returns one `vocab_size()`-long logit row per input position; row
/// `t` is the prediction for the token following position `t`. Implementations
/// are used in inference mode only and must not mutate parameters.
pub trait SequenceModel {
    fn vocab_size(&self) -> usize;

    fn forward(&self, tokens: &[u32]) -> Result<Vec<Vec<f32>>, ModelError>;
}

/// Metadata about the model
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelConfig {
    pub vocab_size: usize,
    pub hidden_size: usize,
}

impl ModelConfig {
    fn embedding_len(&self) -> usize {
        self.vocab_size * self.hidden_size
    }

    fn output_len(&self) -> usize {
        self.hidden_size * self.vocab_size
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            vocab_size: 256,
            hidden_size: 256,
        }
    }
}

struct Weights {
    /// (vocab_size, hidden_size)
    embedding: Tensor,
    /// (hidden_size, vocab_size)
    output: Tensor,
}

/// Candle-backed causal model
pub struct Model {
    config: ModelConfig,
    device: Device,
    weights: Option<Weights>,
}

fn select_device() -> Device {
    #[cfg(target_os = "macos")]
    let device = Device::new_metal(0).unwrap_or(Device::Cpu);
    #[cfg(not(target_os = "macos"))]
    let device = Device::Cpu;
    device
}

impl Model {
    /// Model without weights; forward yields uniform logits
    pub fn new(config: ModelConfig) -> Self {
        Model {
            config,
            device: select_device(),
            weights: None,
        }
    }

    /// Build a model from a flat buffer: embedding rows followed by the output projection
    pub fn from_weights(config: ModelConfig, weights_flat: &[f32]) -> Result<Self, ModelError> {
        let embedding_size = config.embedding_len();
        let expected = embedding_size + config.output_len();
        if weights_flat.len() < expected {
            return Err(ModelError::WeightsTooShort {
                expected,
                found: weights_flat.len(),
            });
        }

        let device = select_device();
        let embedding = Tensor::from_slice(
            &weights_flat[..embedding_size],
            (config.vocab_size, config.hidden_size),
            &device,
        )?;
        let output = Tensor::from_slice(
            &weights_flat[embedding_size..expected],
            (config.hidden_size, config.vocab_size),
            &device,
        )?;

        Ok(Model {
            config,
            device,
            weights: Some(Weights { embedding, output }),
        })
    }

    /// Load model from a bincode `(ModelConfig, Vec<f32>)` file
    ///
    /// A missing or undecodable file yields an unloaded model rather than an error.
    pub fn load(weights_path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let weights_path = weights_path.as_ref();

        if !weights_path.exists() {
            warn!(path = %weights_path.display(), "model weights not found, using uniform logits");
            return Ok(Model::new(ModelConfig::default()));
        }

        let weights_bytes = fs::read(weights_path)?;
        debug!(path = %weights_path.display(), bytes = weights_bytes.len(), "loading model");

        match bincode::deserialize::<(ModelConfig, Vec<f32>)>(&weights_bytes) {
            Ok((config, weights_flat)) => {
                debug!(
                    vocab_size = config.vocab_size,
                    hidden_size = config.hidden_size,
                    weights = weights_flat.len(),
                    "model weights decoded"
                );
                Model::from_weights(config, &weights_flat)
            }
            Err(e) => {
                warn!(path = %weights_path.display(), error = %e, "could not deserialize model weights");
                Ok(Model::new(ModelConfig::default()))
            }
        }
    }

    /// Write weights in the format read by [`Model::load`]
    ///
    /// Fails with [`ModelError::NotLoaded`] when the model has no weights.
    pub fn save(&self, weights_path: impl AsRef<Path>) -> Result<(), ModelError> {
        let weights = self.weights.as_ref().ok_or(ModelError::NotLoaded)?;

        let mut flat = Vec::with_capacity(self.parameter_count());
        flat.extend(weights.embedding.flatten_all()?.to_vec1::<f32>()?);
        flat.extend(weights.output.flatten_all()?.to_vec1::<f32>()?);

        let bytes = bincode::serialize(&(&self.config, flat))?;
        fs::write(weights_path, bytes)?;
        Ok(())
    }

    /// Get model configuration
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Check if model has valid weights loaded
    pub fn is_loaded(&self) -> bool {
        self.weights.is_some()
    }

    /// Number of weights: embedding plus output projection
    pub fn parameter_count(&self) -> usize {
        self.config.embedding_len() + self.config.output_len()
    }
}

impl SequenceModel for Model {
    fn vocab_size(&self) -> usize {
        self.config.vocab_size
    }

    fn forward(&self, tokens: &[u32]) -> Result<Vec<Vec<f32>>, ModelError> {
        if tokens.is_empty() {
            return Err(ModelError::EmptyInput);
        }
        if let Some(&token) = tokens
            .iter()
            .find(|&&t| t as usize >= self.config.vocab_size)
        {
            return Err(ModelError::TokenOutOfRange {
                token,
                vocab_size: self.config.vocab_size,
            });
        }

        let weights = match &self.weights {
            Some(w) => w,
            None => return Ok(vec![vec![0.0; self.config.vocab_size]; tokens.len()]),
        };

        let seq_len = tokens.len();
        let ids = Tensor::from_slice(tokens, seq_len, &self.device)?;

        // (seq_len, hidden_size)
        let embedded = weights.embedding.index_select(&ids, 0)?;

        // Position t sees the mean embedding of tokens 0..=t
        let counts = Tensor::arange(1f32, (seq_len + 1) as f32, &self.device)?
            .reshape((seq_len, 1))?;
        let pooled = embedded.cumsum(0)?.broadcast_div(&counts)?;

        let hidden = pooled.relu()?;

        // (seq_len, vocab_size)
        let logits = hidden.matmul(&weights.output)?;

        Ok(logits.to_vec2::<f32>()?)
    }
}

impl Default for Model {
    fn default() -> Self {
        Model::new(ModelConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config() -> ModelConfig {
        ModelConfig {
            vocab_size: 4,
            hidden_size: 2,
        }
    }

    /// Identity-like weights: embedding row i is one-hot over hidden units
    fn tiny_weights() -> Vec<f32> {
        let embedding = vec![
            1.0, 0.0, //
            0.0, 1.0, //
            1.0, 1.0, //
            0.0, 0.0, //
        ];
        let output = vec![
            2.0, 0.0, 1.0, 0.0, //
            0.0, 3.0, 1.0, 0.0, //
        ];
        embedding.into_iter().chain(output).collect()
    }

    #[test]
    fn test_model_creation() {
        let model = Model::new(ModelConfig::default());
        assert_eq!(model.config().vocab_size, 256);
        assert!(!model.is_loaded());
    }

    #[test]
    fn test_parameter_count() {
        let model = Model::new(tiny_config());
        assert_eq!(model.parameter_count(), 16);
        assert_eq!(model.parameter_count(), tiny_weights().len());
    }

    #[test]
    fn test_save_requires_weights() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_weights.bin");

        let model = Model::new(tiny_config());
        assert!(matches!(model.save(&path), Err(ModelError::NotLoaded)));
        assert!(!path.exists());
    }

    #[test]
    fn test_unloaded_forward_is_uniform() {
        let model = Model::new(tiny_config());
        let logits = model.forward(&[0, 1, 2]).unwrap();
        assert_eq!(logits.len(), 3);
        assert!(logits.iter().all(|row| row == &vec![0.0; 4]));
    }

    #[test]
    fn test_forward_shape_and_causal_mean() {
        let model = Model::from_weights(tiny_config(), &tiny_weights()).unwrap();
        let logits = model.forward(&[0, 1]).unwrap();

        assert_eq!(logits.len(), 2);
        assert!(logits.iter().all(|row| row.len() == 4));

        // Position 0: hidden = [1, 0] -> [2, 0, 1, 0]
        assert_eq!(logits[0], vec![2.0, 0.0, 1.0, 0.0]);
        // Position 1: hidden = mean([1,0],[0,1]) = [0.5, 0.5] -> [1, 1.5, 1, 0]
        let expected = [1.0, 1.5, 1.0, 0.0];
        for (got, want) in logits[1].iter().zip(expected) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn test_prefix_rows_are_stable() {
        let model = Model::from_weights(tiny_config(), &tiny_weights()).unwrap();
        let short = model.forward(&[2, 1]).unwrap();
        let long = model.forward(&[2, 1, 3]).unwrap();
        assert_eq!(short[..], long[..2]);
    }

    #[test]
    fn test_forward_rejects_bad_input() {
        let model = Model::from_weights(tiny_config(), &tiny_weights()).unwrap();
        assert!(matches!(model.forward(&[]), Err(ModelError::EmptyInput)));
        assert!(matches!(
            model.forward(&[0, 4]),
            Err(ModelError::TokenOutOfRange { token: 4, .. })
        ));
    }

    #[test]
    fn test_short_weight_buffer() {
        let err = Model::from_weights(tiny_config(), &[0.0; 3]).err().unwrap();
        assert!(matches!(
            err,
            ModelError::WeightsTooShort {
                expected: 16,
                found: 3
            }
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model_weights.bin");

        let model = Model::from_weights(tiny_config(), &tiny_weights()).unwrap();
        model.save(&path).unwrap();

        let loaded = Model::load(&path).unwrap();
        assert!(loaded.is_loaded());
        assert_eq!(loaded.config(), &tiny_config());
        assert_eq!(loaded.forward(&[1, 2]).unwrap(), model.forward(&[1, 2]).unwrap());
    }

    #[test]
    fn test_missing_weights_fall_back() {
        let model = Model::load("does/not/exist.bin").unwrap();
        assert!(!model.is_loaded());
        assert_eq!(model.vocab_size(), 256);
    }
}

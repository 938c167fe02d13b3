//! Error types for scoring and its collaborators

use thiserror::Error;

/// Failures raised by a [`Tokenizer`](crate::llm::vocab::Tokenizer)
#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Failed to read vocabulary: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid vocabulary file: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Unknown token id: {0}")]
    UnknownToken(u32),

    #[error("Vocabulary file has no `{0}` string")]
    MissingField(&'static str),
}

/// Failures raised by a [`SequenceModel`](crate::llm::model::SequenceModel)
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Tensor operation failed: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("Failed to read weights: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token id {token} is outside the vocabulary (size {vocab_size})")]
    TokenOutOfRange { token: u32, vocab_size: usize },

    #[error("Cannot run a forward pass over an empty sequence")]
    EmptyInput,

    #[error("Weight buffer too short: expected {expected} values, found {found}")]
    WeightsTooShort { expected: usize, found: usize },

    #[error("Model has no weights to save")]
    NotLoaded,

    #[error("Failed to encode weights: {0}")]
    Serialize(#[from] bincode::Error),
}

/// Failures of a single scoring call
///
/// Every variant aborts the call; no partial sums are returned.
#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error("Model inference failed: {0}")]
    ModelInference(String),

    #[error("Deadline exceeded after {completed} of {total} scoring steps")]
    DeadlineExceeded { completed: usize, total: usize },
}

impl From<TokenizerError> for ScoreError {
    fn from(e: TokenizerError) -> Self {
        ScoreError::Encoding(e.to_string())
    }
}

impl From<ModelError> for ScoreError {
    fn from(e: ModelError) -> Self {
        ScoreError::ModelInference(e.to_string())
    }
}

/// Failures while loading configuration or abstract corpora
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

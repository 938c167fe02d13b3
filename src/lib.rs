//! Biomedical abstract scoring - per-token log-probabilities with Candle
//!
//! Splits a text into a short prompt and a continuation and decomposes
//! `log P(continuation | prompt)` into one teacher-forced log-probability per
//! continuation token. Model and tokenizer are injected through the
//! [`SequenceModel`] and [`Tokenizer`] traits.
//!
//! ```no_run
//! use biomed_logprob::{Model, SequenceScorer, Vocab};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let vocab = Vocab::load("data/vocab.json")?;
//! let model = Model::load("models/model_weights.bin")?;
//! let scorer = SequenceScorer::new(&model, &vocab);
//!
//! let result = scorer.score("The catalyst exhibits high activity")?;
//! println!("{} over {} tokens", result.total_log_prob, result.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod corpus;
pub mod error;
pub mod llm;

pub use config::ScorerConfig;
pub use corpus::{filter_abstracts, load_abstracts, AbstractRecord, CorpusFilter};
pub use error::{LoadError, ModelError, ScoreError, TokenizerError};
pub use llm::{
    split_prompt, Model, ModelConfig, ScoreResult, SequenceModel, SequenceScorer, Tokenizer,
    Vocab,
};

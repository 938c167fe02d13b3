//! LLM Module: Model inference, tokenization and log-probability scoring
//!
//! # Components
//! - `model.rs`: `SequenceModel` trait and the Candle-backed model
//! - `vocab.rs`: `Tokenizer` trait and the character-level vocabulary
//! - `scoring.rs`: `SequenceScorer`, teacher-forced per-token log-probabilities

pub mod model;
pub mod scoring;
pub mod vocab;

pub use model::{Model, ModelConfig, SequenceModel};
pub use scoring::{split_prompt, ScoreResult, SequenceScorer};
pub use vocab::{Tokenizer, Vocab};

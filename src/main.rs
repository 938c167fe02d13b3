//! Biomedical abstract scorer - per-token log-probabilities for abstracts
//!
//! Scores each abstract's continuation given its first words as prompt and
//! prints the decomposition as JSON.

use anyhow::{bail, Context, Result};
use biomed_logprob::{
    filter_abstracts, load_abstracts, AbstractRecord, CorpusFilter, Model, ScorerConfig,
    SequenceScorer, Tokenizer, Vocab,
};
use clap::Parser;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "biomed-logprob")]
#[command(about = "Token-by-token log-probabilities of biomedical abstracts")]
struct Args {
    /// Path to model weights
    #[arg(short, long, default_value = "models/model_weights.bin")]
    model: PathBuf,

    /// Path to vocabulary file (default alphabet if missing)
    #[arg(short, long, default_value = "data/vocab.json")]
    vocab: PathBuf,

    /// Scorer configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Text to score (repeatable)
    #[arg(short, long)]
    text: Vec<String>,

    /// Abstracts to score: JSON records or one abstract per line
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Number of leading words used as prompt (overrides config)
    #[arg(short, long)]
    prompt_words: Option<usize>,

    /// Skip abstracts with fewer non-whitespace characters
    #[arg(long, default_value_t = 0)]
    min_chars: usize,

    /// Skip abstracts cited fewer times (or with unknown citation count)
    #[arg(long)]
    min_citations: Option<u32>,

    /// Where to write JSON (stdout if omitted)
    #[arg(long)]
    json_out: Option<PathBuf>,

    /// Enable debug logging (per-token trace)
    #[arg(short, long)]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_vocab(args: &Args) -> Result<Vocab> {
    if !args.vocab.exists() {
        warn!(path = %args.vocab.display(), "vocabulary not found, using default alphabet");
        return Ok(Vocab::with_default_alphabet());
    }
    Vocab::load(&args.vocab).with_context(|| format!("load vocabulary {}", args.vocab.display()))
}

fn collect_records(args: &Args) -> Result<Vec<AbstractRecord>> {
    let mut records: Vec<AbstractRecord> =
        args.text.iter().map(AbstractRecord::from_text).collect();

    if let Some(input) = &args.input {
        records.extend(load_abstracts(input).context("load abstracts")?);
    }
    if records.is_empty() {
        bail!("nothing to score: pass --text or --input");
    }

    let filter = CorpusFilter {
        min_chars: args.min_chars,
        min_citations: args.min_citations,
    };
    let total = records.len();
    let kept = filter_abstracts(records, &filter);
    info!(total, kept = kept.len(), "abstracts selected for scoring");

    Ok(kept)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    let mut config = match &args.config {
        Some(path) => ScorerConfig::load(path).context("load scorer config")?,
        None => ScorerConfig::default(),
    };
    if let Some(prompt_words) = args.prompt_words {
        config.prompt_words = prompt_words;
    }

    let vocab = load_vocab(&args)?;
    let model = Model::load(&args.model).context("load model")?;
    info!(
        vocab_size = vocab.size(),
        model_vocab = model.config().vocab_size,
        parameters = model.parameter_count(),
        loaded = model.is_loaded(),
        "collaborators ready"
    );
    if vocab.size() > model.config().vocab_size {
        warn!("vocabulary is larger than the model's output layer; some tokens cannot be scored");
    }

    let records = collect_records(&args)?;
    let scorer = SequenceScorer::with_config(&model, &vocab, config);

    let start = Instant::now();
    let mut results = Vec::with_capacity(records.len());
    for record in &records {
        let entry = match scorer.score(&record.abstract_text) {
            Ok(score) => {
                let pieces = score
                    .continuation_tokens
                    .iter()
                    .map(|&t| vocab.decode(&[t]))
                    .collect::<Result<Vec<_>, _>>()
                    .context("decode continuation")?;
                json!({
                    "pmid": record.pmid,
                    "total_log_prob": score.total_log_prob,
                    "per_token_log_probs": score.per_token_log_probs,
                    "tokens": pieces,
                    "mean_log_prob": score.mean_log_prob(),
                    "perplexity": score.perplexity(),
                })
            }
            Err(e) => {
                warn!(pmid = ?record.pmid, error = %e, "scoring failed");
                json!({ "pmid": record.pmid, "error": e.to_string() })
            }
        };
        results.push(entry);
    }

    let out = json!({
        "type": "score",
        "model": args.model.display().to_string(),
        "prompt_words": scorer.config().prompt_words,
        "abstracts": results,
        "latency": { "total_ms": start.elapsed().as_secs_f64() * 1000.0 },
    });

    if let Some(p) = &args.json_out {
        fs::write(p, serde_json::to_string_pretty(&out)?)
            .with_context(|| format!("write {}", p.display()))?;
        println!("Wrote score results to {}", p.display());
    } else {
        println!("{}", serde_json::to_string_pretty(&out)?);
    }

    Ok(())
}

//! Scorer configuration, optionally loaded from JSON

use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default number of prompt words
pub const DEFAULT_PROMPT_WORDS: usize = 2;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Leading whitespace-delimited words used as conditioning context
    pub prompt_words: usize,
    /// Wall-clock limit for the scoring loop of a single text
    pub max_duration_ms: Option<u64>,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        ScorerConfig {
            prompt_words: DEFAULT_PROMPT_WORDS,
            max_duration_ms: None,
        }
    }
}

impl ScorerConfig {
    /// Load configuration from a JSON file; missing keys take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| LoadError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ScorerConfig::default();
        assert_eq!(config.prompt_words, 2);
        assert!(config.max_duration().is_none());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_duration_ms": 1500}}"#).unwrap();

        let config = ScorerConfig::load(file.path()).unwrap();
        assert_eq!(config.prompt_words, DEFAULT_PROMPT_WORDS);
        assert_eq!(config.max_duration(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(
            ScorerConfig::load("missing/config.json"),
            Err(LoadError::Io { .. })
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "prompt_words = 3").unwrap();
        assert!(matches!(
            ScorerConfig::load(file.path()),
            Err(LoadError::Parse { .. })
        ));
    }
}

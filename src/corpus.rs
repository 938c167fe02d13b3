//! Local abstract corpora: loading and filtering
//!
//! Reads abstracts that were fetched elsewhere. Two formats are accepted:
//! a JSON array of records (`.json`) or plain text with one abstract per line.

use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One abstract with its bibliographic metadata
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AbstractRecord {
    #[serde(default)]
    pub pmid: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub citation_count: Option<u32>,
}

impl AbstractRecord {
    pub fn from_text(text: impl Into<String>) -> Self {
        AbstractRecord {
            abstract_text: text.into(),
            ..Default::default()
        }
    }
}

/// Criteria an abstract must meet to be scored
#[derive(Clone, Debug, Default)]
pub struct CorpusFilter {
    /// Minimum non-whitespace characters in the abstract
    pub min_chars: usize,
    /// Minimum citation count; records without a count are dropped when set
    pub min_citations: Option<u32>,
}

impl CorpusFilter {
    pub fn accepts(&self, record: &AbstractRecord) -> bool {
        let chars = record
            .abstract_text
            .chars()
            .filter(|c| !c.is_whitespace())
            .count();
        if chars == 0 || chars < self.min_chars {
            return false;
        }

        match self.min_citations {
            Some(min) => record.citation_count.is_some_and(|n| n >= min),
            None => true,
        }
    }
}

/// Load abstracts from a `.json` record array or a line-per-abstract text file
pub fn load_abstracts(path: impl AsRef<Path>) -> Result<Vec<AbstractRecord>, LoadError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&content).map_err(|source| LoadError::Parse {
            path: path.display().to_string(),
            source,
        })
    } else {
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(AbstractRecord::from_text)
            .collect())
    }
}

/// Keep the records accepted by `filter`, preserving order
pub fn filter_abstracts(records: Vec<AbstractRecord>, filter: &CorpusFilter) -> Vec<AbstractRecord> {
    records.into_iter().filter(|r| filter.accepts(r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str, citations: Option<u32>) -> AbstractRecord {
        AbstractRecord {
            citation_count: citations,
            ..AbstractRecord::from_text(text)
        }
    }

    #[test]
    fn test_load_text_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abstracts.txt");
        fs::write(&path, "First abstract here.\n\n  Second one.  \n").unwrap();

        let records = load_abstracts(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].abstract_text, "Second one.");
        assert!(records[0].pmid.is_none());
    }

    #[test]
    fn test_load_json_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abstracts.json");
        fs::write(
            &path,
            r#"[
                {"pmid": "12345", "title": "T", "abstract": "Aspirin reduces risk.", "citation_count": 12},
                {"abstract": "No metadata."}
            ]"#,
        )
        .unwrap();

        let records = load_abstracts(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].pmid.as_deref(), Some("12345"));
        assert_eq!(records[0].citation_count, Some(12));
        assert_eq!(records[1].citation_count, None);
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_abstracts(&path), Err(LoadError::Parse { .. })));
    }

    #[test]
    fn test_filter_by_length() {
        let filter = CorpusFilter {
            min_chars: 10,
            min_citations: None,
        };
        let kept = filter_abstracts(
            vec![record("short", None), record("long enough text", None), record("   ", None)],
            &filter,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].abstract_text, "long enough text");
    }

    #[test]
    fn test_filter_by_citations() {
        let filter = CorpusFilter {
            min_chars: 0,
            min_citations: Some(5),
        };
        let kept = filter_abstracts(
            vec![
                record("cited often", Some(40)),
                record("cited rarely", Some(1)),
                record("unknown citations", None),
            ],
            &filter,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].citation_count, Some(40));
    }
}

//! Tokenizer: Character-level vocabulary for English biomedical text
//!
//! Handles:
//! - Character to token ID mapping
//! - Token ID to character reverse mapping
//! - Normalization of typographic quotes and dashes

use crate::error::TokenizerError;
use rustc_hash::FxHashMap;
use serde_json::json;
use std::fs;
use std::path::Path;

/// Text ↔ token id mapping used by the scorer
///
/// Implementations must not add special or boundary tokens.
pub trait Tokenizer {
    /// Encode text into token ids
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerError>;

    /// Decode token ids back into text (diagnostics only)
    fn decode(&self, tokens: &[u32]) -> Result<String, TokenizerError>;
}

/// Characters covered by the default vocabulary
const DEFAULT_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 -.,;:!?\"'()[]{}%/+=<>*&#@_~^|\\$\n\t";

/// Character-level tokenizer
pub struct Vocab {
    /// Character → Token ID mapping
    char_to_id: FxHashMap<char, u32>,
    /// Token ID → Character reverse mapping
    id_to_char: FxHashMap<u32, char>,
    unk_token: u32,
}

impl Vocab {
    /// Create a vocabulary holding only the unknown token
    pub fn new() -> Self {
        let mut char_to_id = FxHashMap::default();
        let mut id_to_char = FxHashMap::default();

        let unk_token = 0;
        char_to_id.insert('\0', unk_token);
        id_to_char.insert(unk_token, '\0');

        Vocab {
            char_to_id,
            id_to_char,
            unk_token,
        }
    }

    /// Vocabulary over the default ASCII alphabet
    pub fn with_default_alphabet() -> Self {
        let mut vocab = Vocab::new();
        vocab.add_characters(DEFAULT_ALPHABET);
        vocab
    }

    /// Load vocabulary from a JSON file with a `characters` string
    ///
    /// Token ids are assigned in file order starting after the unknown token.
    pub fn load(vocab_path: impl AsRef<Path>) -> Result<Self, TokenizerError> {
        let content = fs::read_to_string(vocab_path)?;
        let json: serde_json::Value = serde_json::from_str(&content)?;

        let chars = json
            .get("characters")
            .and_then(|v| v.as_str())
            .ok_or(TokenizerError::MissingField("characters"))?;

        let mut vocab = Vocab::new();
        vocab.add_characters(chars);
        Ok(vocab)
    }

    /// Register characters not yet in the vocabulary
    pub fn add_characters(&mut self, chars: &str) {
        let mut token_id = self.next_id();

        for c in chars.chars() {
            if !self.char_to_id.contains_key(&c) {
                self.char_to_id.insert(c, token_id);
                self.id_to_char.insert(token_id, c);
                token_id += 1;
            }
        }
    }

    fn next_id(&self) -> u32 {
        self.id_to_char.keys().max().map_or(0, |&id| id + 1)
    }

    /// Map typographic punctuation onto its ASCII form
    fn normalize(text: &str) -> String {
        text.chars()
            .map(|c| match c {
                'ʼ' | '’' | '‘' | '`' => '\'',
                '“' | '”' | '«' | '»' => '"',
                '–' | '—' | '−' => '-',
                '\u{00a0}' => ' ',
                other => other,
            })
            .collect()
    }

    /// Convert character to token ID
    pub fn char_to_token(&self, c: char) -> Option<u32> {
        self.char_to_id.get(&c).copied()
    }

    /// Convert token ID to character
    pub fn token_to_char(&self, token_id: u32) -> Option<char> {
        self.id_to_char.get(&token_id).copied()
    }

    pub fn unk_token(&self) -> u32 {
        self.unk_token
    }

    /// Get vocabulary size
    pub fn size(&self) -> usize {
        self.char_to_id.len()
    }

    /// Save vocabulary to JSON, characters ordered by token id
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TokenizerError> {
        let mut entries: Vec<(u32, char)> = self
            .id_to_char
            .iter()
            .filter(|(id, _)| **id != self.unk_token)
            .map(|(&id, &c)| (id, c))
            .collect();
        entries.sort_unstable_by_key(|(id, _)| *id);

        let data = json!({
            "version": "0.1.0",
            "vocab_size": self.size(),
            "characters": entries.iter().map(|(_, c)| *c).collect::<String>(),
            "special_tokens": {
                "unk": self.unk_token
            }
        });

        fs::write(path, serde_json::to_string_pretty(&data)?)?;
        Ok(())
    }
}

impl Tokenizer for Vocab {
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerError> {
        let normalized = Self::normalize(text);

        Ok(normalized
            .chars()
            .map(|c| self.char_to_id.get(&c).copied().unwrap_or(self.unk_token))
            .collect())
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, TokenizerError> {
        let mut text = String::with_capacity(tokens.len());

        for &token_id in tokens {
            let c = self
                .id_to_char
                .get(&token_id)
                .ok_or(TokenizerError::UnknownToken(token_id))?;
            // Skip unknown token
            if token_id != self.unk_token {
                text.push(*c);
            }
        }

        Ok(text)
    }
}

impl Default for Vocab {
    fn default() -> Self {
        Self::with_default_alphabet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let vocab = Vocab::with_default_alphabet();
        let text = "IL-6 levels (p < 0.05)";
        let tokens = vocab.encode(text).unwrap();
        assert_eq!(tokens.len(), text.chars().count());
        assert_eq!(vocab.decode(&tokens).unwrap(), text);
    }

    #[test]
    fn test_no_special_tokens_added() {
        let vocab = Vocab::with_default_alphabet();
        assert_eq!(vocab.encode("ab").unwrap().len(), 2);
        assert!(vocab.encode("").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_characters_map_to_unk() {
        let vocab = Vocab::with_default_alphabet();
        let tokens = vocab.encode("αβ").unwrap();
        assert_eq!(tokens, vec![vocab.unk_token(); 2]);
        assert_eq!(vocab.decode(&tokens).unwrap(), "");
    }

    #[test]
    fn test_typographic_normalization() {
        assert_eq!(Vocab::normalize("Crohn’s “IBD” – 5"), "Crohn's \"IBD\" - 5");
    }

    #[test]
    fn test_decode_rejects_out_of_vocab_ids() {
        let vocab = Vocab::with_default_alphabet();
        let err = vocab.decode(&[9999]).unwrap_err();
        assert!(matches!(err, TokenizerError::UnknownToken(9999)));
    }

    #[test]
    fn test_load_requires_characters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.json");
        fs::write(&path, r#"{"characters": ["a", "b"]}"#).unwrap();

        assert!(matches!(
            Vocab::load(&path),
            Err(TokenizerError::MissingField("characters"))
        ));
    }

    #[test]
    fn test_save_and_load_preserves_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.json");

        let vocab = Vocab::with_default_alphabet();
        vocab.save(&path).unwrap();
        let loaded = Vocab::load(&path).unwrap();

        assert_eq!(loaded.size(), vocab.size());
        for c in "Protein kinase".chars() {
            assert_eq!(loaded.char_to_token(c), vocab.char_to_token(c));
        }
    }
}

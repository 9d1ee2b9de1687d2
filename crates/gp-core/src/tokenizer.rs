use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::hasher::Token;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s']").unwrap());
static APOSTROPHE_TRIM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^'+|'+$").unwrap());

/// Split text into lowercase words, keeping inner apostrophes ("don't").
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned = NON_WORD.replace_all(text, " ");
    cleaned
        .to_lowercase()
        .split_whitespace()
        .map(|t| APOSTROPHE_TRIM.replace_all(t, "").to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Word ↔ token id table. Ids are assigned in first-seen order starting at
/// 0, so encoding the same text into a fresh vocabulary always yields the
/// same ids.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    words: Vec<String>,
    ids: HashMap<String, Token>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Id for `word`, assigning the next free id on first sight.
    pub fn intern(&mut self, word: &str) -> Token {
        if let Some(&id) = self.ids.get(word) {
            return id;
        }
        let id = self.words.len() as Token;
        self.words.push(word.to_string());
        self.ids.insert(word.to_string(), id);
        id
    }

    pub fn id(&self, word: &str) -> Option<Token> {
        self.ids.get(word).copied()
    }

    pub fn word(&self, token: Token) -> Option<&str> {
        self.words.get(token as usize).map(String::as_str)
    }

    /// Tokenize `text` and intern every word.
    pub fn encode(&mut self, text: &str) -> Vec<Token> {
        tokenize(text).iter().map(|w| self.intern(w)).collect()
    }

    pub fn decode(&self, tokens: &[Token]) -> Vec<&str> {
        tokens.iter().filter_map(|&t| self.word(t)).collect()
    }
}

impl From<Vec<String>> for Vocabulary {
    fn from(words: Vec<String>) -> Self {
        let mut vocab = Self::new();
        for w in &words {
            vocab.intern(w);
        }
        vocab
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocab: Vocabulary) -> Self {
        vocab.words
    }
}

/// Parse a comma/whitespace separated list of integer token ids.
pub fn parse_token_list(s: &str) -> Option<Vec<Token>> {
    s.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(|t| t.parse().ok())
        .collect()
}

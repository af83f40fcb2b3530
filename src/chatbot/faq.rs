//! FAQ snippets offered to the model as examples of good answers.
//!
//! Relevance is a plain term overlap against the folded user text, not
//! semantic search.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::chatbot::language::LanguageCode;
use crate::chatbot::text;
use crate::config::ConfigError;

/// Most entries appended to one prompt.
pub const MAX_FAQ_SNIPPETS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaqEntry {
    /// Folded index terms.
    terms: Vec<String>,
    pub question: String,
    pub answer: String,
}

impl FaqEntry {
    pub fn new<S: AsRef<str>>(terms: &[S], question: &str, answer: &str) -> Self {
        Self {
            terms: terms
                .iter()
                .map(|t| text::fold(t.as_ref()))
                .filter(|t| !t.is_empty())
                .collect(),
            question: question.trim().to_string(),
            answer: answer.trim().to_string(),
        }
    }

    fn overlaps(&self, folded: &str) -> bool {
        if self.terms.iter().any(|t| t.contains(' ') && folded.contains(t.as_str())) {
            return true;
        }
        text::tokens(folded).any(|tok| self.terms.iter().any(|t| t == tok))
    }
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(default)]
    terms: Vec<String>,
    question: String,
    answer: String,
}

#[derive(Debug, Clone, Default)]
pub struct FaqIndex {
    entries: HashMap<LanguageCode, Vec<FaqEntry>>,
}

impl FaqIndex {
    pub fn new(entries: HashMap<LanguageCode, Vec<FaqEntry>>) -> Self {
        Self { entries }
    }

    /// Load `faq.json`. A missing file yields an empty index.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("FAQ file {} not found, prompts will carry no examples", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let index = Self::from_json(&content, path)?;
        info!("📚 Loaded {} FAQ entries from {}", index.len(), path.display());
        Ok(index)
    }

    pub fn from_json(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let raw: HashMap<String, Vec<RawEntry>> =
            serde_json::from_str(content).map_err(|e| ConfigError::ParseJson {
                path: origin.to_path_buf(),
                source: e,
            })?;

        let mut entries = HashMap::new();
        for (code, list) in raw {
            let lang = match code.parse::<LanguageCode>() {
                Ok(lang) => lang,
                Err(e) => {
                    warn!("Skipping FAQ section: {e}");
                    continue;
                }
            };
            let parsed: Vec<FaqEntry> = list
                .into_iter()
                .filter(|e| !e.question.trim().is_empty() && !e.answer.trim().is_empty())
                .map(|e| FaqEntry::new(e.terms.as_slice(), &e.question, &e.answer))
                .collect();
            entries.insert(lang, parsed);
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries whose terms overlap `user_text`, in file order.
    ///
    /// Languages without entries of their own use the Spanish ones.
    pub fn relevant(&self, language: LanguageCode, user_text: &str) -> Vec<&FaqEntry> {
        let folded = text::fold(user_text);
        if folded.is_empty() {
            return Vec::new();
        }

        let list = match self.entries.get(&language) {
            Some(list) if !list.is_empty() => list,
            _ => match self.entries.get(&LanguageCode::Es) {
                Some(list) => list,
                None => return Vec::new(),
            },
        };

        list.iter()
            .filter(|e| e.overlaps(&folded))
            .take(MAX_FAQ_SNIPPETS)
            .collect()
    }
}

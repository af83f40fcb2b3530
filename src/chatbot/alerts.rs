//! Local warning-sign screen.
//!
//! Every inbound message is matched against a static keyword table before it
//! reaches the model. Matching is deliberately high-recall: a keyword anywhere
//! in the folded text is enough, with no negation handling or scoring.

use std::collections::BTreeSet;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};

use crate::chatbot::language::LanguageCode;
use crate::chatbot::text;
use crate::config::ConfigError;

/// Only this version of `alerts.json` is understood.
const SUPPORTED_VERSION: u32 = 1;

/// Warning-sign class.
///
/// Declaration order is severity rank, most severe first. `Ord` follows it,
/// so an [`AlertMatch`] always iterates in the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    Seizures,
    Bleeding,
    FluidLoss,
    ReducedFetalMovement,
    BreathingDifficulty,
    Fainting,
    SeverePain,
    SevereHeadache,
    Fever,
}

impl AlertCategory {
    pub const ALL: [AlertCategory; 9] = [
        AlertCategory::Seizures,
        AlertCategory::Bleeding,
        AlertCategory::FluidLoss,
        AlertCategory::ReducedFetalMovement,
        AlertCategory::BreathingDifficulty,
        AlertCategory::Fainting,
        AlertCategory::SeverePain,
        AlertCategory::SevereHeadache,
        AlertCategory::Fever,
    ];

    /// Stable identifier, same spelling as in `alerts.json`.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCategory::Seizures => "seizures",
            AlertCategory::Bleeding => "bleeding",
            AlertCategory::FluidLoss => "fluid_loss",
            AlertCategory::ReducedFetalMovement => "reduced_fetal_movement",
            AlertCategory::BreathingDifficulty => "breathing_difficulty",
            AlertCategory::Fainting => "fainting",
            AlertCategory::SeverePain => "severe_pain",
            AlertCategory::SevereHeadache => "severe_headache",
            AlertCategory::Fever => "fever",
        }
    }

    /// Plain Spanish description used inside model instructions.
    pub fn prompt_description(&self) -> &'static str {
        match self {
            AlertCategory::Seizures => "convulsiones",
            AlertCategory::Bleeding => "sangrado",
            AlertCategory::FluidLoss => "pérdida de líquido",
            AlertCategory::ReducedFetalMovement => "no sentir o sentir menos los movimientos del bebé",
            AlertCategory::BreathingDifficulty => "dificultad para respirar",
            AlertCategory::Fainting => "desmayo o mareo fuerte",
            AlertCategory::SeverePain => "dolor muy fuerte",
            AlertCategory::SevereHeadache => "dolor de cabeza fuerte o visión borrosa",
            AlertCategory::Fever => "fiebre",
        }
    }
}

/// Categories found in one message, deduplicated, ordered by severity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertMatch {
    categories: BTreeSet<AlertCategory>,
}

impl AlertMatch {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn contains(&self, category: AlertCategory) -> bool {
        self.categories.contains(&category)
    }

    /// Most severe first.
    pub fn iter(&self) -> impl Iterator<Item = AlertCategory> + '_ {
        self.categories.iter().copied()
    }

    fn insert(&mut self, category: AlertCategory) {
        self.categories.insert(category);
    }
}

impl FromIterator<AlertCategory> for AlertMatch {
    fn from_iter<I: IntoIterator<Item = AlertCategory>>(iter: I) -> Self {
        Self {
            categories: iter.into_iter().collect(),
        }
    }
}

/// One keyword rule. Keywords are stored folded; the pattern runs against
/// folded text, so it should be written without accents.
#[derive(Debug, Clone)]
pub struct AlertRule {
    pub language: LanguageCode,
    pub category: AlertCategory,
    keywords: Vec<String>,
    pattern: Option<Regex>,
}

impl AlertRule {
    pub fn new<S: AsRef<str>>(
        language: LanguageCode,
        category: AlertCategory,
        keywords: &[S],
        pattern: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let mut folded = Vec::with_capacity(keywords.len());
        for kw in keywords {
            let kw = text::fold(kw.as_ref());
            if kw.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "blank keyword in {} rule for '{}'",
                    category.as_str(),
                    language
                )));
            }
            folded.push(kw);
        }

        if let Some(p) = pattern {
            // patterns run against folded text, so accented letters could never match
            if p.chars().any(|c| !c.is_ascii() && c.is_alphabetic()) {
                return Err(ConfigError::Validation(format!(
                    "pattern '{}' in {} rule for '{}' must be written without accents",
                    p,
                    category.as_str(),
                    language
                )));
            }
        }

        let pattern = pattern
            .map(|p| {
                Regex::new(&format!("(?i){p}")).map_err(|e| ConfigError::InvalidRegex {
                    pattern: p.to_string(),
                    source: e,
                })
            })
            .transpose()?;

        if folded.is_empty() && pattern.is_none() {
            return Err(ConfigError::Validation(format!(
                "{} rule for '{}' has neither keywords nor pattern",
                category.as_str(),
                language
            )));
        }

        Ok(Self {
            language,
            category,
            keywords: folded,
            pattern,
        })
    }

    fn matches(&self, folded: &str) -> bool {
        self.keywords.iter().any(|kw| folded.contains(kw.as_str()))
            || self.pattern.as_ref().is_some_and(|p| p.is_match(folded))
    }
}

#[derive(Deserialize)]
struct AlertsFile {
    version: u32,
    rules: Vec<RuleEntry>,
}

#[derive(Deserialize)]
struct RuleEntry {
    language: String,
    category: AlertCategory,
    #[serde(default)]
    keywords: Vec<String>,
    pattern: Option<String>,
}

/// Immutable rule table, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct AlertDetector {
    rules: Vec<AlertRule>,
}

impl AlertDetector {
    pub fn new(rules: Vec<AlertRule>) -> Self {
        Self { rules }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let detector = Self::from_json(&content, path)?;
        info!("🩺 Loaded {} alert rule(s) from {}", detector.rules.len(), path.display());
        Ok(detector)
    }

    /// Parse and validate an alerts document. `origin` is only used in errors.
    pub fn from_json(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let file: AlertsFile = serde_json::from_str(content).map_err(|e| ConfigError::ParseJson {
            path: origin.to_path_buf(),
            source: e,
        })?;

        if file.version != SUPPORTED_VERSION {
            return Err(ConfigError::Validation(format!(
                "alerts version {} is not supported (expected {})",
                file.version, SUPPORTED_VERSION
            )));
        }

        let mut rules = Vec::with_capacity(file.rules.len());
        for entry in file.rules {
            let language = match entry.language.parse::<LanguageCode>() {
                Ok(lang) => lang,
                Err(e) => {
                    warn!("Skipping {} alert rule: {}", entry.category.as_str(), e);
                    continue;
                }
            };
            rules.push(AlertRule::new(
                language,
                entry.category,
                entry.keywords.as_slice(),
                entry.pattern.as_deref(),
            )?);
        }

        Ok(Self { rules })
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Every category with a rule that fires on `text` in `language`.
    pub fn detect(&self, language: LanguageCode, text: &str) -> AlertMatch {
        let folded = text::fold(text);
        let mut found = AlertMatch::default();
        if folded.is_empty() {
            return found;
        }

        for rule in self.rules.iter().filter(|r| r.language == language) {
            if !found.contains(rule.category) && rule.matches(&folded) {
                found.insert(rule.category);
            }
        }
        found
    }

    /// Like [`detect`](Self::detect) for a raw code. Unknown codes match nothing.
    pub fn detect_code(&self, code: &str, text: &str) -> AlertMatch {
        match code.parse::<LanguageCode>() {
            Ok(lang) => self.detect(lang, text),
            Err(_) => AlertMatch::default(),
        }
    }
}

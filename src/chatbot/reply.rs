//! Outgoing reply assembly: alert notice, generated body, disclaimer.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::chatbot::alerts::AlertMatch;
use crate::chatbot::generator::GenerationError;
use crate::chatbot::language::LanguageStrings;
use crate::chatbot::text;

/// Sentences asserting the user's (or baby's) health status. Matched on folded text.
static VERDICT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \b(?:estas|usted\ esta|esta\ usted|te\ encuentras|eres|tu\ bebe\ esta)
            \s+(?:completamente\s+|totalmente\s+|muy\s+|perfectamente\s+)?
            (?:sana|sano|enferma|enfermo|saludable|anemica|anemico|diabetica|hipertensa)\b
        | \b(?:tienes|padeces|sufres\ de)\s+(?:una\s+|un\s+)?
            (?:anemia|diabetes|preeclampsia|hipertension|infeccion|eclampsia)\b
        | \byou(?:\ are|'re)\s+(?:completely\s+|perfectly\s+)?(?:healthy|sick|ill|anemic|anaemic|diabetic)\b
        | \byou\ have\s+(?:an?\s+)?(?:anemia|anaemia|diabetes|preeclampsia|infection)\b
        ",
    )
    .expect("verdict regex is valid")
});

/// True when `sentence` states a health verdict. Conditionals ("si tienes anemia...") pass.
pub fn is_verdict(sentence: &str) -> bool {
    let folded = text::fold(sentence);
    VERDICT_RE.find_iter(&folded).any(|m| {
        let before = &folded[..m.start()];
        !(before.ends_with("si ") || before.ends_with("if "))
    })
}

fn sentences(line: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, c) in line.char_indices() {
        if matches!(c, '.' | '!' | '?') {
            let end = i + c.len_utf8();
            if end == line.len() || line[end..].starts_with(' ') {
                out.push(&line[start..end]);
                start = end;
            }
        }
    }
    if start < line.len() {
        out.push(&line[start..]);
    }
    out
}

/// Drop sentences that assert a health status. Returns the cleaned text and
/// how many sentences were removed.
pub fn strip_verdicts(body: &str) -> (String, usize) {
    let mut dropped = 0;
    let mut lines = Vec::new();

    for line in body.lines() {
        if line.trim().is_empty() {
            lines.push(String::new());
            continue;
        }
        let kept: Vec<&str> = sentences(line)
            .into_iter()
            .filter(|s| {
                let verdict = is_verdict(s);
                if verdict {
                    dropped += 1;
                }
                !verdict
            })
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if !kept.is_empty() {
            lines.push(kept.join(" "));
        }
    }

    // collapse blank runs left behind by dropped lines
    let mut out = String::new();
    let mut blank = false;
    for line in lines {
        if line.is_empty() {
            blank = !out.is_empty();
            continue;
        }
        if blank {
            out.push_str("\n\n");
        } else if !out.is_empty() {
            out.push('\n');
        }
        blank = false;
        out.push_str(&line);
    }
    (out, dropped)
}

/// One outbound reply while a session is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyEnvelope {
    pub alert_notice: Option<String>,
    pub body: String,
    pub disclaimer: &'static str,
}

impl ReplyEnvelope {
    /// Build the reply. A failed or fully filtered generation becomes the localized apology.
    pub fn assemble(
        strings: &LanguageStrings,
        alerts: &AlertMatch,
        generated: Result<String, GenerationError>,
    ) -> Self {
        let alert_notice = (!alerts.is_empty()).then(|| {
            let mut notice = String::from(strings.alert_prefix);
            for category in alerts.iter() {
                notice.push('\n');
                notice.push_str(strings.warning(category));
            }
            notice.push_str("\n\n");
            notice.push_str(strings.alert_suffix);
            notice
        });

        let body = match generated {
            Ok(text) => {
                let (clean, dropped) = strip_verdicts(&text);
                if dropped > 0 {
                    warn!("🛡️ Removed {} sentence(s) stating a health verdict", dropped);
                }
                if clean.trim().is_empty() {
                    strings.fallback_error.to_string()
                } else {
                    clean
                }
            }
            Err(_) => strings.fallback_error.to_string(),
        };

        Self {
            alert_notice,
            body,
            disclaimer: strings.disclaimer,
        }
    }

    pub fn render(&self) -> String {
        let mut sections: Vec<&str> = Vec::with_capacity(3);
        if let Some(ref notice) = self.alert_notice {
            sections.push(notice);
        }
        sections.push(&self.body);
        sections.push(self.disclaimer);
        sections.join("\n\n")
    }
}

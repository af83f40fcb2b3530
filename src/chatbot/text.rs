//! Text folding shared by the alert detector and the FAQ index.

/// Lowercase `text`, strip Latin diacritics and collapse whitespace.
///
/// Apostrophe variants (’ ‘ ` ´) become a plain `'` so Quechua ejectives
/// like `q'oñi` match regardless of how the keyboard typed them.
pub fn fold(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(fold_char(c));
    }
    out
}

fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        '’' | '‘' | '`' | '´' => '\'',
        other => other,
    }
}

/// Split folded text into word tokens. Apostrophes stay inside words.
pub fn tokens(folded: &str) -> impl Iterator<Item = &str> {
    folded
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_strips_case_and_accents() {
        assert_eq!(fold("Tengo SANGRADO fuérte"), "tengo sangrado fuerte");
        assert_eq!(fold("Náuseas, Niño"), "nauseas, nino");
    }

    #[test]
    fn test_fold_collapses_whitespace() {
        assert_eq!(fold("  mucho\t\tdolor \n de  cabeza "), "mucho dolor de cabeza");
        assert_eq!(fold("   "), "");
    }

    #[test]
    fn test_fold_normalizes_apostrophes() {
        assert_eq!(fold("Q’OÑI"), "q'oni");
        assert_eq!(fold("q`oñi"), "q'oni");
    }

    #[test]
    fn test_tokens() {
        let folded = fold("¿Es normal la náusea? q'oñi-nanay");
        let toks: Vec<_> = tokens(&folded).collect();
        assert_eq!(toks, vec!["es", "normal", "la", "nausea", "q'oni", "nanay"]);
    }
}

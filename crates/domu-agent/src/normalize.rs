//! Text normalization for rule matching.

/// Lowercases, folds Spanish accents (keeping `ñ`), replaces punctuation with
/// spaces and collapses whitespace.
///
/// `"¿Sí, CUÁNDO  puedo ir?"` becomes `"si cuando puedo ir"`.
pub fn normalize_text(text: &str) -> String {
    let mapped: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            c if c.is_alphanumeric() => c,
            _ => ' ',
        })
        .collect();

    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `phrase` occurs in already-normalized `text` on word boundaries.
pub fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    let haystack = format!(" {} ", normalized);
    let needle = format!(" {} ", phrase);
    haystack.contains(&needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_accents_and_punctuation() {
        assert_eq!(normalize_text("¿Sí, CUÁNDO  puedo ir?"), "si cuando puedo ir");
        assert_eq!(normalize_text("No me interesa... es MUY caro!"), "no me interesa es muy caro");
        assert_eq!(normalize_text("  mañana\tpor la tarde "), "mañana por la tarde");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn phrase_matching_respects_word_boundaries() {
        assert!(contains_phrase("si me gusta mucho", "me gusta"));
        assert!(!contains_phrase("me gustaria saber", "me gusta"));
        assert!(contains_phrase("no", "no"));
        assert!(!contains_phrase("anda", ""));
    }
}

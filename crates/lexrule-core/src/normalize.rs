//! Lemma canonicalization and identifier tokens.

use crate::category::Category;

/// Normalize a lemma for matching: trim, collapse whitespace runs, lowercase.
///
/// Diacritics are preserved (`Mädchen` and `madchen` stay distinct).
pub fn normalize_lemma(lemma: &str) -> String {
    lemma
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Upper-case, identifier-safe token for a lemma.
///
/// German umlauts and ß are transliterated; any run of other characters
/// outside `A-Z0-9` becomes a single `.`; leading/trailing dots are trimmed.
pub fn id_token(text: &str) -> String {
    let mut upper = String::with_capacity(text.len());
    for ch in text.trim().chars() {
        match ch {
            'ä' | 'Ä' => upper.push_str("AE"),
            'ö' | 'Ö' => upper.push_str("OE"),
            'ü' | 'Ü' => upper.push_str("UE"),
            'ß' | 'ẞ' => upper.push_str("SS"),
            _ => upper.extend(ch.to_uppercase()),
        }
    }

    let mut token = String::with_capacity(upper.len());
    let mut pending_sep = false;
    for ch in upper.chars() {
        if ch.is_ascii_uppercase() || ch.is_ascii_digit() {
            if pending_sep && !token.is_empty() {
                token.push('.');
            }
            pending_sep = false;
            token.push(ch);
        } else {
            pending_sep = true;
        }
    }
    token
}

/// First candidate identifier for a (lemma, category) pair, before collision suffixes.
pub fn base_lex_id(category: Category, lemma: &str) -> String {
    let token = id_token(lemma);
    let token = if token.is_empty() { "ITEM" } else { &token };
    format!("LEX.{}.{}", category.id_prefix(), token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lemma() {
        assert_eq!(normalize_lemma("  Gehen "), "gehen");
        assert_eq!(normalize_lemma("heute \t Abend"), "heute abend");
        assert_eq!(normalize_lemma("Mädchen"), "mädchen");
        assert_ne!(normalize_lemma("Mädchen"), normalize_lemma("Madchen"));
    }

    #[test]
    fn test_id_token_transliterates() {
        assert_eq!(id_token("Mädchen"), "MAEDCHEN");
        assert_eq!(id_token("Straße"), "STRASSE");
        assert_eq!(id_token("morgen früh"), "MORGEN.FRUEH");
        assert_eq!(id_token("12:30"), "12.30");
        assert_eq!(id_token(" -- "), "");
    }

    #[test]
    fn test_base_lex_id() {
        assert_eq!(base_lex_id(Category::Verb, "gehen"), "LEX.VERB.GEHEN");
        assert_eq!(base_lex_id(Category::NumberTime, "zwölf"), "LEX.TIME.ZWOELF");
        assert_eq!(base_lex_id(Category::Other, "?!"), "LEX.OTHER.ITEM");
    }
}

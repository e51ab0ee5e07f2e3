//! Lexical tokenizer used for both indexing and querying.
//!
//! # Algorithm
//!
//! 1. Lowercase the input.
//! 2. Extract maximal runs of letters, digits, `-` and `_` (any script).
//!    A run with no letter or digit in it is not a term.
//! 3. Expand each term into suffix-stripped variants (`deploying` also
//!    yields `deploy`, `policies` also yields `policy`).
//! 4. Drop single-character entries and stopwords.
//!
//! Order follows first occurrence in the text, variants right after the
//! term they came from. Duplicates are kept so that term frequency reflects
//! repetition.

/// Common English function words that never become index terms.
const STOPWORDS: &[&str] = &[
    "about", "also", "and", "an", "are", "as", "at", "be", "been", "by", "can", "for", "from",
    "had", "has", "have", "how", "in", "into", "is", "it", "of", "on", "or", "our", "than",
    "that", "the", "them", "then", "there", "they", "this", "to", "use", "used", "using", "was",
    "were", "what", "when", "where", "which", "will", "with", "would", "you", "your",
];

/// Suffixes stripped during variant expansion, longest first.
const STEM_SUFFIXES: &[&str] = &["ingly", "edly", "ing", "ed", "ies", "es", "ly", "s"];

/// Split `text` into normalized index terms.
///
/// ```rust
/// use linkrag_core::tokenize::tokenize;
///
/// assert_eq!(tokenize("The deploy, then ROLLBACK!"), vec!["deploy", "rollback"]);
/// assert!(tokenize("?! -- ...").is_empty());
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut tokens = Vec::new();

    for term in lowered.split(|c: char| !is_term_char(c)) {
        if !term.chars().any(char::is_alphanumeric) {
            continue;
        }
        for variant in expand_variants(term) {
            if variant.chars().count() > 1 && !is_stopword(&variant) {
                tokens.push(variant);
            }
        }
    }

    tokens
}

fn is_term_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn is_stopword(term: &str) -> bool {
    STOPWORDS.contains(&term)
}

/// Breadth-first suffix stripping. The original term always comes first.
fn expand_variants(term: &str) -> Vec<String> {
    let mut variants = vec![term.to_string()];
    if term.chars().count() <= 2 {
        return variants;
    }

    let mut cursor = 0;
    while cursor < variants.len() {
        let current = variants[cursor].clone();
        cursor += 1;

        let current_len = current.chars().count();
        for suffix in STEM_SUFFIXES {
            if !current.ends_with(suffix) || current_len <= suffix.len() + 2 {
                continue;
            }

            let mut stem = current[..current.len() - suffix.len()].to_string();
            if *suffix == "ies" {
                stem.push('y');
            }
            if stem.chars().count() <= 2 {
                continue;
            }

            if !variants.contains(&stem) {
                variants.push(stem);
            }
        }
    }

    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_splits_on_punctuation() {
        assert_eq!(
            tokenize("Kafka, Docker; helm-chart!"),
            vec!["kafka", "docker", "helm-chart"]
        );
    }

    #[test]
    fn test_drops_stopwords_and_single_chars() {
        assert_eq!(tokenize("a b the x rust"), vec!["rust"]);
    }

    #[test]
    fn test_keeps_duplicates_in_order() {
        assert_eq!(
            tokenize("cache hit cache"),
            vec!["cache", "hit", "cache"]
        );
    }

    #[test]
    fn test_punctuation_only_yields_nothing() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("... -- __ !!").is_empty());
    }

    #[test]
    fn test_underscore_and_digits() {
        assert_eq!(tokenize("max_token 404"), vec!["max_token", "404"]);
    }

    #[test]
    fn test_expands_suffix_variants() {
        let tokens = tokenize("deploying");
        assert_eq!(tokens[0], "deploying");
        assert!(tokens.contains(&"deploy".to_string()));
    }

    #[test]
    fn test_ies_becomes_y() {
        let tokens = tokenize("policies");
        assert!(tokens.contains(&"policy".to_string()));
    }

    #[test]
    fn test_short_words_not_stemmed() {
        assert_eq!(tokenize("bus"), vec!["bus"]);
        assert_eq!(tokenize("is"), Vec::<String>::new());
    }

    #[test]
    fn test_variant_expansion_is_transitive() {
        // "reportedly" -> "reported" (ly) -> "report" (ed)
        let tokens = tokenize("reportedly");
        assert!(tokens.contains(&"reported".to_string()));
        assert!(tokens.contains(&"report".to_string()));
    }

    #[test]
    fn test_non_latin_scripts() {
        assert_eq!(tokenize("Привет мир"), vec!["привет", "мир"]);
    }

    #[test]
    fn test_deterministic() {
        let text = "Rolling deployments require rollback procedures.";
        assert_eq!(tokenize(text), tokenize(text));
    }
}

//! Identifier tokenizer: splits a SQL identifier into lowercase
//! word tokens, handling `snake_case`, `camelCase`/`PascalCase`, and digit
//! boundaries uniformly. Used by the Profiler (date-named-token detection),
//! the Token Lexicon, and the Retrieval Engine's lexical strategy.

/// Split `identifier` into lowercase tokens.
///
/// Algorithm: split on non-alphanumeric separators (`_`, `-`, `.`, spaces),
/// then further split each run on case boundaries (lower→upper) and
/// letter→digit / digit→letter boundaries. Tokens shorter than `min_len` are
/// kept as-is here; length filtering (`morph_min_len`) is the caller's
/// concern.
pub fn tokenize_identifier(identifier: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for chunk in identifier.split(|c: char| !c.is_alphanumeric()) {
        if chunk.is_empty() {
            continue;
        }
        tokens.extend(split_case_boundaries(chunk));
    }
    tokens
        .into_iter()
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty() && !t.chars().all(|c| c.is_ascii_digit()))
        .collect()
}

fn split_case_boundaries(chunk: &str) -> Vec<String> {
    let chars: Vec<char> = chunk.chars().collect();
    let mut out = Vec::new();
    let mut current = String::new();

    for i in 0..chars.len() {
        let c = chars[i];
        if i > 0 {
            let prev = chars[i - 1];
            let boundary = (prev.is_lowercase() && c.is_uppercase())
                || (prev.is_alphabetic() && c.is_ascii_digit())
                || (prev.is_ascii_digit() && c.is_alphabetic())
                || (c.is_uppercase()
                    && i + 1 < chars.len()
                    && chars[i + 1].is_lowercase()
                    && prev.is_uppercase());
            if boundary && !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// `true` if any token in `identifier` is a recognized date/time token.
pub const DATE_TOKENS: &[&str] = &[
    "date", "time", "timestamp", "created", "updated", "modified", "at", "day", "month", "year",
    "dob", "birthdate", "expiry", "expires", "datetime",
];

pub fn has_date_token(identifier: &str) -> bool {
    tokenize_identifier(identifier)
        .iter()
        .any(|t| DATE_TOKENS.contains(&t.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_snake_case() {
        assert_eq!(
            tokenize_identifier("created_at"),
            vec!["created".to_string(), "at".to_string()]
        );
    }

    #[test]
    fn tokenizes_camel_case() {
        assert_eq!(
            tokenize_identifier("customerId"),
            vec!["customer".to_string(), "id".to_string()]
        );
    }

    #[test]
    fn tokenizes_pascal_case_with_acronym() {
        assert_eq!(
            tokenize_identifier("HTTPStatusCode"),
            vec![
                "http".to_string(),
                "status".to_string(),
                "code".to_string()
            ]
        );
    }

    #[test]
    fn detects_date_tokens() {
        assert!(has_date_token("created_at"));
        assert!(has_date_token("order_date"));
        assert!(!has_date_token("customer_id"));
    }

    #[test]
    fn splits_letter_digit_boundary_and_drops_pure_digit_tokens() {
        assert_eq!(
            tokenize_identifier("col1name"),
            vec!["col".to_string(), "name".to_string()]
        );
    }
}

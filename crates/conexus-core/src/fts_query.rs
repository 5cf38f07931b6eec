//! Transforms free-text user queries into the full-text engine's operator
//! grammar (SQLite FTS5's `MATCH` expression syntax).

use crate::error::{Error, Result};

const PLACEHOLDER_PREFIX: char = '\u{0}';

/// Parses a free-text query into an FTS5 expression string.
///
/// 1. Trim whitespace; empty input is a validation error.
/// 2. Extract `"quoted phrases"` and substitute placeholders so the
///    remaining steps never touch their contents.
/// 3. In the remainder, replace `/`, `(`, `)`, `-` with spaces; double
///    internal `"`; preserve `@`.
/// 4. Restore phrases as FTS phrase literals, escaping `"` inside them.
/// 5. Uppercase word-boundary `and`/`or`/`not`.
/// 6. If no explicit operator remains, join whitespace-separated tokens
///    (phrases preserved whole) with `AND`.
pub fn parse_query(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("query must not be empty"));
    }

    let (stripped, phrases) = extract_phrases(trimmed);

    let mut cleaned = String::with_capacity(stripped.len());
    for ch in stripped.chars() {
        match ch {
            '/' | '(' | ')' | '-' => cleaned.push(' '),
            '"' => cleaned.push_str("\"\""),
            _ => cleaned.push(ch),
        }
    }

    let restored = restore_phrases(&cleaned, &phrases);

    let uppercased = uppercase_operators(&restored);

    let has_explicit_operator = uppercased
        .split_whitespace()
        .any(|tok| matches!(tok, "AND" | "OR" | "NOT"));

    if has_explicit_operator {
        return Ok(collapse_whitespace(&uppercased));
    }

    let tokens = tokenize_preserving_phrases(&uppercased);
    if tokens.is_empty() {
        return Err(Error::validation("query must not be empty"));
    }
    Ok(tokens.join(" AND "))
}

/// Replaces `"quoted phrases"` with placeholder tokens and returns the
/// placeholder-substituted string plus the extracted phrase texts in order.
fn extract_phrases(input: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(input.len());
    let mut phrases = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '"' {
            let mut phrase = String::new();
            for inner in chars.by_ref() {
                if inner == '"' {
                    break;
                }
                phrase.push(inner);
            }
            phrases.push(phrase);
            out.push(PLACEHOLDER_PREFIX);
            out.push_str(&(phrases.len() - 1).to_string());
            out.push(PLACEHOLDER_PREFIX);
        } else {
            out.push(ch);
        }
    }
    (out, phrases)
}

fn restore_phrases(input: &str, phrases: &[String]) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == PLACEHOLDER_PREFIX {
            let mut idx_str = String::new();
            for inner in chars.by_ref() {
                if inner == PLACEHOLDER_PREFIX {
                    break;
                }
                idx_str.push(inner);
            }
            if let Ok(idx) = idx_str.parse::<usize>() {
                if let Some(phrase) = phrases.get(idx) {
                    out.push('"');
                    out.push_str(&phrase.replace('"', "\"\""));
                    out.push('"');
                    continue;
                }
            }
        } else {
            out.push(ch);
        }
    }
    out
}

fn uppercase_operators(input: &str) -> String {
    let mut out_tokens = Vec::new();
    for tok in split_preserving_quotes(input) {
        if tok.starts_with('"') {
            out_tokens.push(tok);
            continue;
        }
        match tok.to_ascii_lowercase().as_str() {
            "and" => out_tokens.push("AND".to_string()),
            "or" => out_tokens.push("OR".to_string()),
            "not" => out_tokens.push("NOT".to_string()),
            _ => out_tokens.push(tok),
        }
    }
    out_tokens.join(" ")
}

fn tokenize_preserving_phrases(input: &str) -> Vec<String> {
    split_preserving_quotes(input)
        .into_iter()
        .filter(|t| !t.is_empty())
        .collect()
}

/// Splits on whitespace, but treats a `"..."` run as one token even if it
/// contains internal whitespace.
fn split_preserving_quotes(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    let mut current = String::new();
    let mut in_quotes = false;
    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                current.push(ch);
                if in_quotes {
                    // doubled quote = escape, stay in phrase
                    if chars.peek() == Some(&'"') {
                        current.push(chars.next().unwrap());
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_is_validation_error() {
        assert!(parse_query("   ").is_err());
    }

    #[test]
    fn phrase_and_term_joined_with_and() {
        let parsed = parse_query("\"hello world\" test").unwrap();
        assert_eq!(parsed, "\"hello world\" AND test");
    }

    #[test]
    fn lowercase_or_is_uppercased() {
        let parsed = parse_query("python or golang").unwrap();
        assert_eq!(parsed, "python OR golang");
    }

    #[test]
    fn path_like_query_strips_slash_and_joins_with_and() {
        let parsed = parse_query("path/to/file.go").unwrap();
        assert_eq!(parsed, "path AND to AND file.go");
    }

    #[test]
    fn parens_and_dashes_become_spaces() {
        let parsed = parse_query("(foo-bar)").unwrap();
        assert_eq!(parsed, "foo AND bar");
    }

    #[test]
    fn at_sign_is_preserved() {
        let parsed = parse_query("user@example.com").unwrap();
        assert_eq!(parsed, "user@example.com");
    }

    #[test]
    fn pure_operator_query_passes_through() {
        let parsed = parse_query("foo AND bar").unwrap();
        assert_eq!(parsed, "foo AND bar");
    }

    #[test]
    fn phrase_containing_operator_looking_token_is_untouched() {
        let parsed = parse_query("\"cats and dogs\"").unwrap();
        assert_eq!(parsed, "\"cats and dogs\"");
    }

    #[test]
    fn multi_space_runs_collapse() {
        let parsed = parse_query("foo   AND    bar").unwrap();
        assert_eq!(parsed, "foo AND bar");
    }

    #[test]
    fn quote_inside_phrase_is_escaped() {
        let parsed = parse_query("\"say \"\"hi\"\"\"").unwrap();
        assert!(parsed.starts_with('"') && parsed.ends_with('"'));
    }
}

//! Glob pattern matching for key enumeration.
//!
//! Supports `*` (any run), `?` (any single character), and `[seq]` /
//! `[!seq]` character classes — the dialect both the in-memory matcher and
//! the networked backend's server-side `KEYS` understand. Patterns are
//! compiled to anchored regular expressions.

use regex::Regex;

use crate::error::{StoreError, StoreResult};

/// Compile a glob pattern into an anchored [`Regex`].
pub fn glob_to_regex(pattern: &str) -> StoreResult<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            '[' => {
                let mut class = String::new();
                if chars.peek() == Some(&'!') {
                    chars.next();
                    class.push('^');
                }
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    if c == '\\' || (c == '^' && class.is_empty()) {
                        class.push('\\');
                    }
                    class.push(c);
                }
                if !closed {
                    return Err(StoreError::Configuration(format!(
                        "unterminated character class in pattern {pattern:?}"
                    )));
                }
                expr.push('[');
                expr.push_str(&class);
                expr.push(']');
            }
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }

    expr.push('$');
    Regex::new(&expr)
        .map_err(|e| StoreError::Configuration(format!("bad pattern {pattern:?}: {e}")))
}

/// Whether `key` matches the glob `pattern`.
pub fn glob_match(pattern: &str, key: &str) -> StoreResult<bool> {
    Ok(glob_to_regex(pattern)?.is_match(key))
}

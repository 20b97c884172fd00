//! Key namespacing and wildcard-pattern translation.
//!
//! Both cache tiers share the same key space, so both deletes-by-pattern go
//! through [`pattern_to_matcher`] to keep L1 and L2 agreeing on what a
//! pattern selects.

use regex::Regex;

/// Builds fully-qualified cache keys by prepending a namespace prefix.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    global_prefix: String,
}

impl KeyBuilder {
    /// Creates a builder with the given default namespace.
    pub fn new(global_prefix: impl Into<String>) -> Self {
        Self {
            global_prefix: global_prefix.into(),
        }
    }

    /// Returns the configured default prefix.
    pub fn global_prefix(&self) -> &str {
        &self.global_prefix
    }

    /// Returns `global_prefix + key`.
    #[inline]
    pub fn build(&self, key: &str) -> String {
        format!("{}{}", self.global_prefix, key)
    }

    /// Returns `prefix + key` when an override is given, otherwise
    /// [`KeyBuilder::build`].
    #[inline]
    pub fn build_with(&self, key: &str, prefix: Option<&str>) -> String {
        match prefix {
            Some(prefix) => format!("{prefix}{key}"),
            None => self.build(key),
        }
    }
}

/// Translates a glob pattern (`*` matches any substring) into an anchored
/// regex matcher.
///
/// Every regex metacharacter except `*` is escaped, so keys containing `.`
/// or `?` match literally. The match is anchored to the whole key; a partial
/// substring match does not count.
pub fn pattern_to_matcher(pattern: &str) -> Regex {
    let mut escaped = String::with_capacity(pattern.len() + 8);
    escaped.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => escaped.push_str(".*"),
            c if regex_metachar(c) => {
                escaped.push('\\');
                escaped.push(c);
            }
            c => escaped.push(c),
        }
    }
    escaped.push('$');

    // Every metacharacter is escaped above, so the pattern is always valid.
    Regex::new(&escaped).expect("escaped glob pattern is valid regex")
}

fn regex_metachar(c: char) -> bool {
    matches!(
        c,
        '.' | '+' | '?' | '^' | '$' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '\\'
    )
}

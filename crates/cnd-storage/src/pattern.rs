//! Glob-style key patterns (`*` and `?`), as understood by Redis `KEYS`.

use regex::Regex;

use crate::error::Result;

/// A compiled key pattern.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    regex: Regex,
}

impl KeyPattern {
    /// Compiles `pattern`; `*` matches any run, `?` exactly one character,
    /// everything else matches literally.
    pub fn new(pattern: &str) -> Result<Self> {
        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push('^');
        let mut buf = [0u8; 4];
        for c in pattern.chars() {
            match c {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut buf))),
            }
        }
        expr.push('$');

        Ok(Self {
            regex: Regex::new(&expr)?,
        })
    }

    /// Returns whether `key` matches the whole pattern.
    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_any_run() {
        let p = KeyPattern::new("package:*").unwrap();
        assert!(p.matches("package:"));
        assert!(p.matches("package:a:2024-01-01T00:00:00.000Z"));
        assert!(!p.matches("other:package:a"));
    }

    #[test]
    fn question_mark_matches_one_char() {
        let p = KeyPattern::new("k?y").unwrap();
        assert!(p.matches("key"));
        assert!(!p.matches("ky"));
        assert!(!p.matches("keey"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let p = KeyPattern::new("a.b+(c)").unwrap();
        assert!(p.matches("a.b+(c)"));
        assert!(!p.matches("axb+(c)"));
    }

    #[test]
    fn matching_is_anchored() {
        let p = KeyPattern::new("pkg").unwrap();
        assert!(!p.matches("pkg1"));
        assert!(!p.matches("1pkg"));
    }
}

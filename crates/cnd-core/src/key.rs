//! Key extraction from the `jk` snippet.
//!
//! Click'n'Load senders ship the AES key inside a small JavaScript function,
//! e.g. `function f(){ return "31323334353637383930313233343536"; }`. The
//! snippet comes from an arbitrary web page, so it is only ever scanned with
//! a regular expression and never evaluated.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static RETURN_HEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\breturn\s*["']([0-9A-Fa-f]+)["']"#).expect("valid key pattern")
});

/// Errors from key extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The snippet contains no `return "<hex>"` statement.
    #[error("no hex key found in jk")]
    NotFound,

    /// The extracted literal is not valid hex.
    #[error("invalid hex key: {0}")]
    InvalidHex(String),
}

/// Extracts the hex literal returned by the `jk` snippet.
pub fn extract_key(jk: &str) -> Result<String, KeyError> {
    RETURN_HEX
        .captures(jk)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or(KeyError::NotFound)
}

/// Extracts and hex-decodes the key bytes.
pub fn key_bytes(jk: &str) -> Result<Vec<u8>, KeyError> {
    let hex_key = extract_key(jk)?;
    hex::decode(&hex_key).map_err(|e| KeyError::InvalidHex(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_double_quoted_key() {
        let jk = r#"function f(){ return "0102030405060708090a0b0c0d0e0f10"; }"#;
        assert_eq!(
            extract_key(jk).unwrap(),
            "0102030405060708090a0b0c0d0e0f10"
        );
    }

    #[test]
    fn extracts_single_quoted_key() {
        let jk = "function f(){return '31323334353637383930313233343536';}";
        assert_eq!(
            extract_key(jk).unwrap(),
            "31323334353637383930313233343536"
        );
    }

    #[test]
    fn missing_return_is_not_found() {
        assert_eq!(extract_key("function f(){ }"), Err(KeyError::NotFound));
        assert_eq!(extract_key(""), Err(KeyError::NotFound));
    }

    #[test]
    fn non_hex_literal_is_not_found() {
        let jk = r#"function f(){ return "not-a-key"; }"#;
        assert_eq!(extract_key(jk), Err(KeyError::NotFound));
    }

    #[test]
    fn snippet_is_never_evaluated() {
        // Only the first returned literal counts, surrounding code is ignored.
        let jk = r#"while(true){} alert(1); return "abcd"; return "ffff";"#;
        assert_eq!(extract_key(jk).unwrap(), "abcd");
    }

    #[test]
    fn key_bytes_decodes_hex() {
        let jk = r#"return "0001ff""#;
        assert_eq!(key_bytes(jk).unwrap(), vec![0x00, 0x01, 0xff]);
    }

    #[test]
    fn key_bytes_rejects_odd_length() {
        let jk = r#"return "abc""#;
        assert!(matches!(key_bytes(jk), Err(KeyError::InvalidHex(_))));
    }
}

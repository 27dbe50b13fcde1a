//! CNL payload codec.
//!
//! The Click'n'Load `addcrypted2` exchange encrypts the link list with
//! AES-CBC, using the bytes extracted from `jk` as both the key and the IV.
//! Ciphertext travels as standard base64. Receivers are expected to tolerate
//! zero padding from older senders, so decryption does not enforce PKCS#7.

use aes::cipher::block_padding::{NoPadding, Pkcs7};
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::key;
use crate::models::CnlPackage;

/// AES block size, also the IV length.
pub const BLOCK_SIZE: usize = 16;

/// Separator used when re-encrypting processed links.
pub const LINK_SEPARATOR: &str = "\r\n";

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\p{Cc}]+").expect("valid whitespace pattern"));

macro_rules! cbc_decrypt {
    ($cipher:ty, $key:expr, $data:expr) => {
        cbc::Decryptor::<$cipher>::new_from_slices($key, &$key[..BLOCK_SIZE])
            .map_err(|_| CodecError::KeyLength($key.len()))
            .and_then(|dec| {
                dec.decrypt_padded_vec_mut::<NoPadding>($data)
                    .map_err(|_| CodecError::BlockLength($data.len()))
            })
    };
}

macro_rules! cbc_encrypt {
    ($cipher:ty, $key:expr, $data:expr) => {
        cbc::Encryptor::<$cipher>::new_from_slices($key, &$key[..BLOCK_SIZE])
            .map_err(|_| CodecError::KeyLength($key.len()))
            .map(|enc| enc.encrypt_padded_vec_mut::<Pkcs7>($data))
    };
}

/// Codec errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// `crypted` is not valid base64.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Ciphertext is not a whole number of AES blocks.
    #[error("ciphertext length {0} is not a multiple of the block size")]
    BlockLength(usize),

    /// Key bytes could not initialise the cipher.
    #[error("invalid key length: {0}")]
    KeyLength(usize),

    /// Nothing to encrypt.
    #[error("No links to encrypt")]
    NoLinks,
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Returns a copy of `pkg` with `decrypted` set to the normalized plaintext.
pub fn decrypt(pkg: &CnlPackage) -> Result<CnlPackage> {
    let decrypted = decrypt_payload(&pkg.crypted, &pkg.jk)?;
    debug!(
        package = ?pkg.package,
        bytes = decrypted.len(),
        "Decrypted CNL payload"
    );

    Ok(CnlPackage {
        decrypted: Some(decrypted),
        ..pkg.clone()
    })
}

/// Returns a copy of `pkg` with `crypted` replaced by the encrypted
/// `processed` links of `pkg.files`, joined with CRLF.
pub fn encrypt(pkg: &CnlPackage) -> Result<CnlPackage> {
    let links: Vec<&str> = pkg
        .files
        .iter()
        .flat_map(|files| files.results.iter())
        .map(|link| link.processed.as_str())
        .collect();

    if links.is_empty() {
        return Err(CodecError::NoLinks);
    }

    let crypted = encrypt_payload(&links.join(LINK_SEPARATOR), &pkg.jk)?;

    Ok(CnlPackage {
        crypted,
        ..pkg.clone()
    })
}

/// Decrypts a base64 payload with the key carried by `jk`.
///
/// Whitespace and control character runs, padding bytes included, are
/// collapsed into a single `\n`.
pub fn decrypt_payload(crypted: &str, jk: &str) -> Result<String> {
    let compact: String = crypted.chars().filter(|c| !c.is_whitespace()).collect();
    let data = STANDARD.decode(compact)?;
    if data.len() % BLOCK_SIZE != 0 {
        return Err(CodecError::BlockLength(data.len()));
    }

    let key = derive_key(jk);
    let mut plain = match key.len() {
        24 => cbc_decrypt!(aes::Aes192, &key, &data),
        32 => cbc_decrypt!(aes::Aes256, &key, &data),
        _ => cbc_decrypt!(aes::Aes128, &key, &data),
    }?;
    strip_pkcs7(&mut plain);

    let text = String::from_utf8_lossy(&plain);
    Ok(WHITESPACE_RUN.replace_all(&text, "\n").into_owned())
}

/// Encrypts `plain` with the key carried by `jk`, returning base64.
pub fn encrypt_payload(plain: &str, jk: &str) -> Result<String> {
    let key = derive_key(jk);
    let data = match key.len() {
        24 => cbc_encrypt!(aes::Aes192, &key, plain.as_bytes()),
        32 => cbc_encrypt!(aes::Aes256, &key, plain.as_bytes()),
        _ => cbc_encrypt!(aes::Aes128, &key, plain.as_bytes()),
    }?;
    Ok(STANDARD.encode(data))
}

/// Derives the AES key from `jk`.
///
/// Extraction failures are logged and yield an all-zero key; the resulting
/// garbage plaintext then fails further down the pipeline.
fn derive_key(jk: &str) -> Vec<u8> {
    let mut key = match key::key_bytes(jk) {
        Ok(key) => key,
        Err(e) => {
            error!(error = %e, "Failed to extract key from jk");
            debug!(jk, "Rejected key snippet");
            Vec::new()
        }
    };

    match key.len() {
        16 | 24 | 32 => key,
        len => {
            if len != 0 {
                warn!(len, "Unexpected key length, fitting to 16 bytes");
            }
            key.resize(BLOCK_SIZE, 0);
            key
        }
    }
}

/// Drops a well-formed PKCS#7 tail, leaves anything else untouched.
fn strip_pkcs7(plain: &mut Vec<u8>) {
    let Some(&last) = plain.last() else {
        return;
    };
    let pad = last as usize;
    if pad == 0 || pad > BLOCK_SIZE || pad > plain.len() {
        return;
    }
    if plain[plain.len() - pad..].iter().all(|&b| b == last) {
        plain.truncate(plain.len() - pad);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProcessedLink, ProcessingResult, ProcessingStats};
    use chrono::Utc;

    const JK: &str = r#"function f(){ return "31323334353637383930313233343536"; }"#;

    fn with_links(links: &[(&str, &str, bool)]) -> CnlPackage {
        let results: Vec<ProcessedLink> = links
            .iter()
            .map(|(original, processed, success)| {
                if *success {
                    ProcessedLink::resolved(*original, *processed, None, None)
                } else {
                    ProcessedLink::failed(*original, "unsupported host")
                }
            })
            .collect();
        let success_count = results.iter().filter(|r| r.success).count();
        let mut pkg = CnlPackage::new("", JK).with_package("pkg");
        pkg.files = Some(ProcessingResult {
            stats: ProcessingStats {
                processed_at: Utc::now(),
                debrid_service: "test".into(),
                total_links: results.len(),
                valid_links: results.len(),
                skipped_links: 0,
                success_count,
                failure_count: results.len() - success_count,
                success_rate: 0.0,
                processing_time_ms: 0,
            },
            results,
        });
        pkg
    }

    #[test]
    fn round_trip_keeps_processed_links_in_order() {
        let pkg = with_links(&[
            ("http://a/1", "https://dl/1", true),
            ("http://a/2", "http://a/2", false),
            ("http://a/3", "https://dl/3", true),
        ]);

        let encrypted = encrypt(&pkg).unwrap();
        let decrypted = decrypt(&encrypted).unwrap();

        assert_eq!(
            decrypted.decrypted.as_deref(),
            Some("https://dl/1\nhttp://a/2\nhttps://dl/3")
        );
    }

    #[test]
    fn decrypt_does_not_mutate_input() {
        let crypted = encrypt_payload("http://a/1.zip", JK).unwrap();
        let pkg = CnlPackage::new(crypted.clone(), JK).with_source("s");

        let out = decrypt(&pkg).unwrap();

        assert!(pkg.decrypted.is_none());
        assert_eq!(out.crypted, crypted);
        assert_eq!(out.source.as_deref(), Some("s"));
        assert_eq!(out.decrypted.as_deref(), Some("http://a/1.zip"));
    }

    #[test]
    fn encrypt_requires_results() {
        let pkg = CnlPackage::new("", JK);
        assert!(matches!(encrypt(&pkg), Err(CodecError::NoLinks)));

        let pkg = with_links(&[]);
        assert!(matches!(encrypt(&pkg), Err(CodecError::NoLinks)));
    }

    #[test]
    fn encryption_is_deterministic_for_a_key() {
        let a = encrypt_payload("http://a/1", JK).unwrap();
        let b = encrypt_payload("http://a/1", JK).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_padded_payload_normalizes_to_newline() {
        // Legacy senders pad with NUL bytes instead of PKCS#7.
        let key = b"1234567890123456";
        let mut block = b"http://a/1.zip".to_vec();
        block.resize(16, 0);
        let data = cbc::Encryptor::<aes::Aes128>::new_from_slices(key, key)
            .unwrap()
            .encrypt_padded_vec_mut::<NoPadding>(&block);
        let crypted = STANDARD.encode(data);

        let text = decrypt_payload(&crypted, JK).unwrap();
        assert_eq!(text, "http://a/1.zip\n");
    }

    #[test]
    fn whitespace_runs_collapse() {
        let crypted = encrypt_payload("a \t b\r\n\r\nc", JK).unwrap();
        assert_eq!(decrypt_payload(&crypted, JK).unwrap(), "a\nb\nc");
    }

    #[test]
    fn missing_key_does_not_panic() {
        let crypted = encrypt_payload("http://a/1", JK).unwrap();
        let text = decrypt_payload(&crypted, "no key here").unwrap();
        assert_ne!(text, "http://a/1");
    }

    #[test]
    fn invalid_base64_is_an_error() {
        assert!(matches!(
            decrypt_payload("***", JK),
            Err(CodecError::Base64(_))
        ));
    }

    #[test]
    fn partial_block_is_an_error() {
        let crypted = STANDARD.encode([1u8; 10]);
        assert!(matches!(
            decrypt_payload(&crypted, JK),
            Err(CodecError::BlockLength(10))
        ));
    }

    #[test]
    fn supports_256_bit_keys() {
        let jk = format!(r#"return "{}""#, "ab".repeat(32));
        let crypted = encrypt_payload("http://a/1", &jk).unwrap();
        assert_eq!(decrypt_payload(&crypted, &jk).unwrap(), "http://a/1");
    }

    #[test]
    fn base64_with_line_breaks_is_accepted() {
        let crypted = encrypt_payload("http://a/1\nhttp://a/2\nhttp://a/3", JK).unwrap();
        let wrapped = format!("{}\n{}", &crypted[..10], &crypted[10..]);
        assert_eq!(
            decrypt_payload(&wrapped, JK).unwrap(),
            "http://a/1\nhttp://a/2\nhttp://a/3"
        );
    }
}

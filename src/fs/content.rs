//! Content canonicalization and hashing.
//!
//! The bundle hash must be stable across machines and encodings, so raw
//! bytes are first normalized to UTF-8 (BOM-aware, with a Latin-1 fallback
//! for legacy single-byte encodings) and the SHA-256 is computed over the
//! canonical form.

use encoding_rs::Encoding;
use sha2::{Digest, Sha256};

/// Decode raw file bytes to a canonical UTF-8 string.
///
/// BOM sniffing is definitive for UTF-8/16; otherwise the bytes are tried as
/// UTF-8 and fall back to ISO-8859-1 (which maps every byte) when invalid.
pub fn normalize_to_utf8(bytes: &[u8]) -> String {
    if let Some((enc, bom_len)) = Encoding::for_bom(bytes) {
        let (cow, _had_errors) = enc.decode_without_bom_handling(&bytes[bom_len..]);
        return cow.into_owned();
    }

    let (cow, had_errors) = encoding_rs::UTF_8.decode_with_bom_removal(bytes);
    if !had_errors {
        return cow.into_owned();
    }

    let (cow, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    cow.into_owned()
}

/// SHA-256 of the canonicalized content, lowercase hex.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Normalize raw bytes and hash in one step, returning (content, hash).
pub fn normalize_and_hash(bytes: &[u8]) -> (String, String) {
    let content = normalize_to_utf8(bytes);
    let hash = content_hash(&content);
    (content, hash)
}

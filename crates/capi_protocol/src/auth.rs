//! Message authentication using HMAC-SHA256.
//!
//! Digests are lowercase hex strings. All comparisons of keys and digests
//! go through [`subtle`] so they take the same time whether or not, and
//! wherever, the inputs differ.

use crate::error::{ProtocolError, ProtocolResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Signs `body` with `secret`, returning the lowercase hex digest.
pub fn sign(secret: &[u8], body: &[u8]) -> ProtocolResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| ProtocolError::Digest(e.to_string()))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks `digest` against the digest of `body` under `secret`.
///
/// An empty secret never verifies.
pub fn verify_digest(secret: &[u8], body: &[u8], digest: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    match sign(secret, body) {
        Ok(expected) => keys_match(&expected, digest),
        Err(_) => false,
    }
}

/// Constant-time string equality.
///
/// Both inputs are padded to the longer length with different fill bytes
/// so a length difference cannot be observed through timing.
pub fn keys_match(a: &str, b: &str) -> bool {
    let max_len = a.len().max(b.len());

    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = (a.len() as u64).ct_eq(&(b.len() as u64));
    let contents_equal = a_padded.ct_eq(&b_padded);

    (lengths_equal & contents_equal).into()
}

//! Content digests and RSA signatures over them
//!
//! The signed value is the UTF-8 text of the lowercase hex SHA-256 digest, not the
//! raw digest bytes. Both sides must hash exactly that string for signatures to
//! verify, so it is part of the wire contract:
//!
//! ```text
//! digest_hex = hex(SHA-256(content))
//! signature  = RSASSA-PKCS1-v1_5(SHA-256(utf8(digest_hex)))
//! ```

use rand::rngs::OsRng;
use rsa::Pkcs1v15Sign;
use sha2::{Digest, Sha256};

use super::keys::{PublicKey, SecretKey};

/// Length of a hex-encoded SHA-256 digest
pub const DIGEST_HEX_LEN: usize = 64;

#[derive(Debug, thiserror::Error)]
#[error("signing failed: {0}")]
pub struct SigningError(String);

/// A detached RSA signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(Vec<u8>);

impl From<Vec<u8>> for Signature {
    fn from(bytes: Vec<u8>) -> Self {
        Signature(bytes)
    }
}

impl Signature {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// SHA-256 of `data`, lowercase hex
pub fn digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Whether `value` looks like output of [`digest`]
pub fn is_digest_hex(value: &str) -> bool {
    value.len() == DIGEST_HEX_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Sign the text of a hex digest with the sender's private key
pub fn sign(digest_hex: &str, signer: &SecretKey) -> Result<Signature, SigningError> {
    let hashed = Sha256::digest(digest_hex.as_bytes());
    let signature = signer
        .sign_with_rng(&mut OsRng, Pkcs1v15Sign::new::<Sha256>(), &hashed)
        .map_err(|e| SigningError(e.to_string()))?;
    Ok(Signature(signature))
}

/// Check a signature over the text of a hex digest
///
/// Never fails: a malformed signature or a key mismatch is just `false`.
pub fn verify(digest_hex: &str, signature: &[u8], signer: &PublicKey) -> bool {
    let hashed = Sha256::digest(digest_hex.as_bytes());
    signer
        .verify(Pkcs1v15Sign::new::<Sha256>(), &hashed, signature)
        .is_ok()
}

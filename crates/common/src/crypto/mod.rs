//! Cryptographic primitives for vouch
//!
//! This module provides the three primitives a signed transfer is built from:
//!
//! - **Identity keys**: RSA key pairs (`SecretKey`/`PublicKey`), at least 2048 bits
//! - **Hybrid encryption**: AES-256-CBC content encryption with an RSA-OAEP wrapped
//!   session key
//! - **Signatures**: RSASSA-PKCS1-v1_5 over the hex SHA-256 digest of the content
//!
//! # Security Model
//!
//! ## Confidentiality
//! Each transfer gets its own session key and IV, generated from the OS RNG and
//! never stored. Only the recipient's private key can unwrap the session key.
//!
//! ## Authenticity and Integrity
//! The sender signs the digest of the plaintext. The recipient checks the signature
//! against the sender's public key (authenticity) and compares the digest of what it
//! decrypted with the signed digest (integrity). The two checks are independent.
//!
//! ## Known Limitations
//! - CBC has no MAC; tampering is only caught by the digest comparison
//! - Packages carry no nonce, so a captured package can be replayed

mod hybrid;
mod keys;
mod signature;

pub use hybrid::{
    decrypt, encrypt, HybridCiphertext, HybridError, SessionKey, BLOCK_SIZE, IV_SIZE,
    SESSION_KEY_SIZE,
};
pub use keys::{KeyError, KeyPair, PublicKey, SecretKey, DEFAULT_KEY_SIZE, MIN_KEY_SIZE};
pub use signature::{
    digest, is_digest_hex, sign, verify, Signature, SigningError, DIGEST_HEX_LEN,
};

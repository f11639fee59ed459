//! Hybrid encryption: AES-256-CBC for the content, RSA-OAEP for the session key
//!
//! Every call to [`encrypt`] draws a fresh 256-bit session key and 128-bit IV. The
//! content is encrypted with AES-256 in CBC mode with PKCS#7 padding, and only the
//! session key (not the IV) is wrapped under the recipient's public key using OAEP
//! with SHA-1 / MGF1-SHA-1.
//!
//! # Wire Format
//!
//! ```text
//! ciphertext   = AES-256-CBC(key, iv, pkcs7(plaintext))
//! wrapped_key  = RSA-OAEP-SHA1(recipient_public, key)       (modulus-sized)
//! iv           = 16 random bytes, sent in the clear
//! ```
//!
//! CBC carries no authentication tag. Tamper detection is the job of the signed
//! digest checked by the transfer layer, which runs whenever decryption succeeds.
//!
//! [`decrypt`] reports every failure as the same [`HybridError::Decryption`]. When the
//! key unwrap fails a random key is substituted and the CBC pass still runs, so an
//! OAEP failure and a padding failure are indistinguishable to the caller.

use std::fmt;

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rsa::Oaep;
use sha1::Sha1;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::keys::{PublicKey, SecretKey};

/// Size of the AES-256 session key in bytes (256 bits)
pub const SESSION_KEY_SIZE: usize = 32;
/// Size of the CBC initialization vector in bytes (128 bits)
pub const IV_SIZE: usize = 16;
/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Errors from the hybrid cipher
///
/// Messages are deliberately fixed: which sub-step failed is never exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HybridError {
    #[error("encryption failed")]
    Encryption,
    #[error("decryption failed")]
    Decryption,
}

/// A single-use symmetric key and IV
///
/// Generated per transfer, never persisted, zeroed on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKey {
    key: [u8; SESSION_KEY_SIZE],
    iv: [u8; IV_SIZE],
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey").finish_non_exhaustive()
    }
}

impl SessionKey {
    /// Generate a new session key and IV from the OS RNG
    pub fn generate() -> Result<Self, HybridError> {
        let mut key = [0u8; SESSION_KEY_SIZE];
        let mut iv = [0u8; IV_SIZE];
        getrandom::getrandom(&mut key).map_err(|_| HybridError::Encryption)?;
        getrandom::getrandom(&mut iv).map_err(|_| HybridError::Encryption)?;
        Ok(Self { key, iv })
    }

    pub fn iv(&self) -> [u8; IV_SIZE] {
        self.iv
    }

    fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        Aes256CbcEnc::new(&self.key.into(), &self.iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
    }

    fn wrap(&self, recipient: &PublicKey) -> Result<Vec<u8>, HybridError> {
        recipient
            .encrypt(&mut OsRng, Oaep::new::<Sha1>(), &self.key)
            .map_err(|_| HybridError::Encryption)
    }
}

/// Output of [`encrypt`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HybridCiphertext {
    pub ciphertext: Vec<u8>,
    pub wrapped_key: Vec<u8>,
    pub iv: [u8; IV_SIZE],
}

/// Encrypt `plaintext` for the holder of `recipient`'s private key
///
/// # Errors
///
/// Returns [`HybridError::Encryption`] if the RNG fails or the session key cannot
/// be wrapped under the recipient key.
pub fn encrypt(plaintext: &[u8], recipient: &PublicKey) -> Result<HybridCiphertext, HybridError> {
    let session = SessionKey::generate()?;
    let ciphertext = session.encrypt(plaintext);
    let wrapped_key = session.wrap(recipient)?;

    Ok(HybridCiphertext {
        ciphertext,
        wrapped_key,
        iv: session.iv(),
    })
}

/// Recover the plaintext produced by [`encrypt`]
///
/// # Errors
///
/// Returns [`HybridError::Decryption`] if the IV has the wrong length, the wrapped
/// key does not unwrap under `recipient` (wrong key or corruption), or the padding
/// is invalid after CBC decryption (wrong key, corrupted or truncated ciphertext).
pub fn decrypt(
    ciphertext: &[u8],
    wrapped_key: &[u8],
    iv: &[u8],
    recipient: &SecretKey,
) -> Result<Vec<u8>, HybridError> {
    let iv: [u8; IV_SIZE] = iv.try_into().map_err(|_| HybridError::Decryption)?;

    let mut key = [0u8; SESSION_KEY_SIZE];
    let unwrapped = match recipient.decrypt_blinded(&mut OsRng, Oaep::new::<Sha1>(), wrapped_key)
    {
        Ok(mut bytes) if bytes.len() == SESSION_KEY_SIZE => {
            key.copy_from_slice(&bytes);
            bytes.zeroize();
            true
        }
        Ok(mut bytes) => {
            bytes.zeroize();
            getrandom::getrandom(&mut key).map_err(|_| HybridError::Decryption)?;
            false
        }
        Err(_) => {
            getrandom::getrandom(&mut key).map_err(|_| HybridError::Decryption)?;
            false
        }
    };

    let result = if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        None
    } else {
        Aes256CbcDec::new(&key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .ok()
    };
    key.zeroize();

    match result {
        Some(plaintext) if unwrapped => Ok(plaintext),
        Some(mut garbage) => {
            garbage.zeroize();
            Err(HybridError::Decryption)
        }
        None => Err(HybridError::Decryption),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::keys::DEFAULT_KEY_SIZE;

    fn keypair() -> (SecretKey, PublicKey) {
        let secret = SecretKey::generate(DEFAULT_KEY_SIZE).unwrap();
        let public = secret.public();
        (secret, public)
    }

    #[test]
    fn test_encrypt_decrypt() {
        let (secret, public) = keypair();
        let data = b"hello world, this is a test message for encryption";

        let sealed = encrypt(data, &public).unwrap();
        assert_eq!(sealed.ciphertext.len() % BLOCK_SIZE, 0);
        assert_eq!(sealed.wrapped_key.len(), DEFAULT_KEY_SIZE / 8);

        let decrypted =
            decrypt(&sealed.ciphertext, &sealed.wrapped_key, &sealed.iv, &secret).unwrap();
        assert_eq!(data.as_slice(), decrypted.as_slice());
    }

    #[test]
    fn test_empty_and_block_aligned_plaintext() {
        let (secret, public) = keypair();

        for data in [Vec::new(), vec![7u8; BLOCK_SIZE], vec![1u8; BLOCK_SIZE * 3 + 5]] {
            let sealed = encrypt(&data, &public).unwrap();
            // PKCS#7 always adds at least one byte of padding
            assert!(sealed.ciphertext.len() > data.len());
            let decrypted =
                decrypt(&sealed.ciphertext, &sealed.wrapped_key, &sealed.iv, &secret).unwrap();
            assert_eq!(data, decrypted);
        }
    }

    #[test]
    fn test_fresh_session_per_call() {
        let (_, public) = keypair();
        let data = b"same input twice";

        let first = encrypt(data, &public).unwrap();
        let second = encrypt(data, &public).unwrap();
        assert_ne!(first.iv, second.iv);
        assert_ne!(first.ciphertext, second.ciphertext);
        assert_ne!(first.wrapped_key, second.wrapped_key);
    }

    #[test]
    fn test_wrong_key_fails() {
        let (_, alice_public) = keypair();
        let (bob_secret, _) = keypair();

        let sealed = encrypt(b"for alice only", &alice_public).unwrap();
        let result = decrypt(&sealed.ciphertext, &sealed.wrapped_key, &sealed.iv, &bob_secret);
        assert_eq!(result, Err(HybridError::Decryption));
    }

    #[test]
    fn test_corrupted_wrapped_key_fails() {
        let (secret, public) = keypair();
        let mut sealed = encrypt(b"payload", &public).unwrap();
        sealed.wrapped_key[10] ^= 0x01;

        let result = decrypt(&sealed.ciphertext, &sealed.wrapped_key, &sealed.iv, &secret);
        assert_eq!(result, Err(HybridError::Decryption));
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let (secret, public) = keypair();
        let sealed = encrypt(&[3u8; 40], &public).unwrap();

        let truncated = &sealed.ciphertext[..sealed.ciphertext.len() - 3];
        let result = decrypt(truncated, &sealed.wrapped_key, &sealed.iv, &secret);
        assert_eq!(result, Err(HybridError::Decryption));

        let result = decrypt(&[], &sealed.wrapped_key, &sealed.iv, &secret);
        assert_eq!(result, Err(HybridError::Decryption));
    }

    #[test]
    fn test_bad_iv_length_fails() {
        let (secret, public) = keypair();
        let sealed = encrypt(b"payload", &public).unwrap();

        let result = decrypt(&sealed.ciphertext, &sealed.wrapped_key, &sealed.iv[..8], &secret);
        assert_eq!(result, Err(HybridError::Decryption));
    }

    #[test]
    fn test_error_messages_are_generic() {
        assert_eq!(HybridError::Decryption.to_string(), "decryption failed");
        assert_eq!(HybridError::Encryption.to_string(), "encryption failed");
    }
}

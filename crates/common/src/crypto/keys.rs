use std::fmt;
use std::ops::Deref;

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

/// Default RSA modulus size in bits
pub const DEFAULT_KEY_SIZE: usize = 2048;
/// Smallest RSA modulus we will generate or accept
pub const MIN_KEY_SIZE: usize = 2048;

/// PEM tag for PKCS#8 private keys (what we write)
pub const PRIVATE_KEY_PEM_TAG: &str = "PRIVATE KEY";
/// PEM tag for PKCS#1 private keys (accepted on import)
pub const RSA_PRIVATE_KEY_PEM_TAG: &str = "RSA PRIVATE KEY";
/// PEM tag for SubjectPublicKeyInfo public keys (what we write)
pub const PUBLIC_KEY_PEM_TAG: &str = "PUBLIC KEY";
/// PEM tag for PKCS#1 public keys (accepted on import)
pub const RSA_PUBLIC_KEY_PEM_TAG: &str = "RSA PUBLIC KEY";

/// Errors that can occur during key operations
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key size {0} is below the minimum of {} bits", MIN_KEY_SIZE)]
    KeySize(usize),
    #[error("key generation failed: {0}")]
    Generation(String),
    #[error("key error: {0}")]
    Default(#[from] anyhow::Error),
}

fn encode_pem(tag: &str, der: &[u8]) -> String {
    let pem = pem::Pem::new(tag, der);
    pem::encode_config(
        &pem,
        pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
    )
}

/// RSA public key of an identity
///
/// This is the only half of a key pair that ever leaves the key store. It is used to
/// wrap session keys for the identity and to check signatures the identity produced.
///
/// # Examples
///
/// ```ignore
/// let secret_key = SecretKey::generate(DEFAULT_KEY_SIZE)?;
/// let public_key = secret_key.public();
///
/// let pem = public_key.to_pem()?;
/// let recovered = PublicKey::from_pem(&pem)?;
/// assert_eq!(public_key, recovered);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(RsaPublicKey);

impl Deref for PublicKey {
    type Target = RsaPublicKey;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<RsaPublicKey> for PublicKey {
    fn from(key: RsaPublicKey) -> Self {
        PublicKey(key)
    }
}

impl PublicKey {
    /// Modulus size in bits
    pub fn key_size(&self) -> usize {
        self.0.size() * 8
    }

    /// DER-encoded SubjectPublicKeyInfo
    pub fn to_der(&self) -> Result<Vec<u8>, KeyError> {
        let doc = self
            .0
            .to_public_key_der()
            .map_err(|e| anyhow::anyhow!("failed to encode public key: {}", e))?;
        Ok(doc.as_bytes().to_vec())
    }

    /// Encode the public key in PEM format with tag "PUBLIC KEY"
    pub fn to_pem(&self) -> Result<String, KeyError> {
        Ok(encode_pem(PUBLIC_KEY_PEM_TAG, &self.to_der()?))
    }

    /// Parse a public key from PEM format
    ///
    /// Accepts both "PUBLIC KEY" (SubjectPublicKeyInfo) and "RSA PUBLIC KEY" (PKCS#1).
    pub fn from_pem(pem_str: &str) -> Result<Self, KeyError> {
        let pem = pem::parse(pem_str).map_err(|e| anyhow::anyhow!("failed to parse PEM: {}", e))?;

        let key = match pem.tag() {
            PUBLIC_KEY_PEM_TAG => RsaPublicKey::from_public_key_der(pem.contents())
                .map_err(|e| anyhow::anyhow!("invalid public key: {}", e))?,
            RSA_PUBLIC_KEY_PEM_TAG => RsaPublicKey::from_pkcs1_der(pem.contents())
                .map_err(|e| anyhow::anyhow!("invalid public key: {}", e))?,
            other => {
                return Err(anyhow::anyhow!(
                    "invalid PEM tag, expected {}, got {}",
                    PUBLIC_KEY_PEM_TAG,
                    other
                )
                .into())
            }
        };
        Ok(Self(key))
    }

    /// Lowercase hex SHA-256 of the DER encoding
    pub fn fingerprint(&self) -> Result<String, KeyError> {
        Ok(hex::encode(Sha256::digest(self.to_der()?)))
    }
}

/// RSA private key of an identity
///
/// Never transmitted. `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(RsaPrivateKey);

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("key_size", &self.key_size())
            .finish_non_exhaustive()
    }
}

impl Deref for SecretKey {
    type Target = RsaPrivateKey;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl SecretKey {
    /// Generate a new RSA key with a cryptographically secure RNG
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::KeySize`] if `key_size` is below [`MIN_KEY_SIZE`].
    pub fn generate(key_size: usize) -> Result<Self, KeyError> {
        if key_size < MIN_KEY_SIZE {
            return Err(KeyError::KeySize(key_size));
        }
        let key = RsaPrivateKey::new(&mut OsRng, key_size)
            .map_err(|e| KeyError::Generation(e.to_string()))?;
        Ok(Self(key))
    }

    /// Derive the public key from this secret key
    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.to_public_key())
    }

    /// Modulus size in bits
    pub fn key_size(&self) -> usize {
        self.0.size() * 8
    }

    /// Encode secret key in PEM format for storage
    ///
    /// Returns a PKCS#8 PEM-encoded string with tag "PRIVATE KEY".
    pub fn to_pem(&self) -> Result<String, KeyError> {
        let doc = self
            .0
            .to_pkcs8_der()
            .map_err(|e| anyhow::anyhow!("failed to encode private key: {}", e))?;
        Ok(encode_pem(PRIVATE_KEY_PEM_TAG, doc.as_bytes()))
    }

    /// Parse a secret key from PEM format
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The PEM string is malformed
    /// - The PEM tag is neither "PRIVATE KEY" nor "RSA PRIVATE KEY"
    /// - The DER contents are not an RSA private key
    pub fn from_pem(pem_str: &str) -> Result<Self, KeyError> {
        let pem = pem::parse(pem_str).map_err(|e| anyhow::anyhow!("failed to parse PEM: {}", e))?;

        let key = match pem.tag() {
            PRIVATE_KEY_PEM_TAG => RsaPrivateKey::from_pkcs8_der(pem.contents())
                .map_err(|e| anyhow::anyhow!("invalid private key: {}", e))?,
            RSA_PRIVATE_KEY_PEM_TAG => RsaPrivateKey::from_pkcs1_der(pem.contents())
                .map_err(|e| anyhow::anyhow!("invalid private key: {}", e))?,
            other => {
                return Err(anyhow::anyhow!(
                    "invalid PEM tag, expected {}, got {}",
                    PRIVATE_KEY_PEM_TAG,
                    other
                )
                .into())
            }
        };
        Ok(Self(key))
    }
}

/// An identity's key pair together with its creation time
#[derive(Debug, Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
    created_at: DateTime<Utc>,
}

impl KeyPair {
    /// Generate a fresh key pair stamped with the current time
    pub fn generate(key_size: usize) -> Result<Self, KeyError> {
        let secret = SecretKey::generate(key_size)?;
        Ok(Self::from_parts(secret, Utc::now()))
    }

    /// Rebuild a key pair from a stored secret key and its recorded creation time
    pub fn from_parts(secret: SecretKey, created_at: DateTime<Utc>) -> Self {
        let public = secret.public();
        Self {
            secret,
            public,
            created_at,
        }
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn key_size(&self) -> usize {
        self.secret.key_size()
    }
}

//! Per-identity RSA key management
//!
//! A [`KeyStore`] generates, persists and retrieves one key pair per identity on top
//! of a caller-supplied [`KeyStorage`] backend ([`MemoryKeyStorage`] for tests,
//! [`FsKeyStorage`] for real use). There is no process-wide registry: every store is
//! an explicit value.
//!
//! # Provisioning
//!
//! The metadata record is the commit marker: an identity whose metadata is missing
//! is treated as not provisioned, whatever key files it has. A write first removes
//! the old metadata, then writes the private key, the public key and finally the new
//! metadata, so a write that fails part way leaves the identity unprovisioned
//! rather than pairing new metadata with a mix of old and new keys.
//!
//! Every write holds the backend's identity lock ([`KeyStorage::lock`]), which
//! spans all stores sharing that backend. Two concurrent [`KeyStore::ensure_keys`]
//! calls for the same identity produce one key pair, even from separate processes
//! over one key directory.

mod fs;
mod memory;
mod storage;

pub use fs::FsKeyStorage;
pub use memory::MemoryKeyStorage;
pub use storage::{Held, IdentityLock, KeyKind, KeyStorage, StorageError};

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{
    KeyError, KeyPair, PublicKey, SecretKey, DEFAULT_KEY_SIZE, MIN_KEY_SIZE,
};

/// Longest identity we accept
pub const MAX_IDENTITY_LEN: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error(
        "invalid identity '{0}': use 1-128 ASCII letters, digits, '-', '_' or '.', \
         not starting with '.'"
    )]
    InvalidIdentity(String),

    #[error("key error: {0}")]
    Key(#[from] KeyError),

    #[error("identity '{0}' already holds a private key")]
    HasPrivateKey(String),

    #[error("identity '{0}' only holds an imported public key")]
    PublicOnly(String),

    #[error("stored {kind} for '{identity}' is corrupted: {reason}")]
    Corrupted {
        identity: String,
        kind: KeyKind,
        reason: String,
    },

    #[error("key store I/O error: {0}")]
    Storage(#[from] StorageError),
}

/// Record written beside an identity's keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMetadata {
    pub identity: String,
    pub created_at: DateTime<Utc>,
    pub key_size: usize,
    /// False for identities whose public key was imported from another party
    pub has_private_key: bool,
}

/// Where a persisted identity lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageHandle {
    pub identity: String,
    pub location: String,
}

/// Check that `identity` is usable as a storage key
pub fn validate_identity(identity: &str) -> Result<(), KeyStoreError> {
    let valid = !identity.is_empty()
        && identity.len() <= MAX_IDENTITY_LEN
        && !identity.starts_with('.')
        && identity
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));

    if valid {
        Ok(())
    } else {
        Err(KeyStoreError::InvalidIdentity(identity.to_string()))
    }
}

#[derive(Debug)]
pub struct KeyStore<S: KeyStorage> {
    storage: S,
    key_size: usize,
}

impl<S: KeyStorage> KeyStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            key_size: DEFAULT_KEY_SIZE,
        }
    }

    /// Key size used by [`KeyStore::ensure_keys`]
    pub fn with_key_size(mut self, key_size: usize) -> Self {
        self.key_size = key_size;
        self
    }

    pub fn key_size(&self) -> usize {
        self.key_size
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Generate a key pair for `identity` without storing it
    ///
    /// # Errors
    ///
    /// Fails with [`KeyError::KeySize`] if `key_size` is below 2048 bits.
    pub fn generate(&self, identity: &str, key_size: usize) -> Result<KeyPair, KeyStoreError> {
        validate_identity(identity)?;
        if key_size < MIN_KEY_SIZE {
            return Err(KeyError::KeySize(key_size).into());
        }
        tracing::debug!(identity, key_size, "generating key pair");
        Ok(KeyPair::generate(key_size)?)
    }

    /// Write a key pair and its metadata under `identity`, replacing anything there
    pub fn persist(
        &self,
        identity: &str,
        key_pair: &KeyPair,
    ) -> Result<StorageHandle, KeyStoreError> {
        validate_identity(identity)?;
        let _lock = self.storage.lock(identity)?;
        self.write_key_pair(identity, key_pair)
    }

    fn write_key_pair(
        &self,
        identity: &str,
        key_pair: &KeyPair,
    ) -> Result<StorageHandle, KeyStoreError> {
        let private_pem = key_pair.secret().to_pem()?;
        let public_pem = key_pair.public().to_pem()?;
        let metadata = KeyMetadata {
            identity: identity.to_string(),
            created_at: key_pair.created_at(),
            key_size: key_pair.key_size(),
            has_private_key: true,
        };

        self.storage.remove_slot(identity, KeyKind::Metadata)?;
        self.storage
            .put(identity, KeyKind::Private, private_pem.as_bytes())?;
        self.storage
            .put(identity, KeyKind::Public, public_pem.as_bytes())?;
        self.write_metadata(&metadata)?;

        tracing::info!(identity, key_size = metadata.key_size, "persisted key pair");
        Ok(StorageHandle {
            identity: identity.to_string(),
            location: self.storage.location(identity),
        })
    }

    fn write_metadata(&self, metadata: &KeyMetadata) -> Result<(), KeyStoreError> {
        let json = serde_json::to_vec_pretty(metadata).map_err(|e| KeyStoreError::Corrupted {
            identity: metadata.identity.clone(),
            kind: KeyKind::Metadata,
            reason: e.to_string(),
        })?;
        self.storage.put(&metadata.identity, KeyKind::Metadata, &json)?;
        Ok(())
    }

    /// Make sure `identity` has a key pair, generating one if it has none
    ///
    /// Returns the identity's public key and whether it was created by this call.
    /// Calling this twice leaves one key pair and returns the same public key.
    ///
    /// # Errors
    ///
    /// Fails with [`KeyStoreError::PublicOnly`] if `identity` holds an imported
    /// public key, rather than replacing the peer's key with a local one.
    pub fn ensure_keys(&self, identity: &str) -> Result<(PublicKey, bool), KeyStoreError> {
        validate_identity(identity)?;
        let _lock = self.storage.lock(identity)?;

        if let Some(metadata) = self.metadata(identity)? {
            if !metadata.has_private_key {
                return Err(KeyStoreError::PublicOnly(identity.to_string()));
            }
            if let Some(public) = self.load_public(identity)? {
                tracing::debug!(identity, "keys already provisioned");
                return Ok((public, false));
            }
        }

        let key_pair = self.generate(identity, self.key_size)?;
        self.write_key_pair(identity, &key_pair)?;
        Ok((key_pair.public().clone(), true))
    }

    /// Register another party's public key under `identity`
    ///
    /// # Errors
    ///
    /// - [`KeyStoreError::HasPrivateKey`] if `identity` is a local identity
    /// - [`KeyError`] if the PEM is invalid or the key is smaller than 2048 bits
    pub fn import_public_key(
        &self,
        identity: &str,
        pem: &str,
    ) -> Result<StorageHandle, KeyStoreError> {
        validate_identity(identity)?;
        let public = PublicKey::from_pem(pem)?;
        if public.key_size() < MIN_KEY_SIZE {
            return Err(KeyError::KeySize(public.key_size()).into());
        }

        let public_pem = public.to_pem()?;
        let _lock = self.storage.lock(identity)?;

        if self.storage.get(identity, KeyKind::Private)?.is_some() {
            return Err(KeyStoreError::HasPrivateKey(identity.to_string()));
        }

        self.storage.remove_slot(identity, KeyKind::Metadata)?;
        self.storage
            .put(identity, KeyKind::Public, public_pem.as_bytes())?;
        self.write_metadata(&KeyMetadata {
            identity: identity.to_string(),
            created_at: Utc::now(),
            key_size: public.key_size(),
            has_private_key: false,
        })?;

        tracing::info!(identity, "imported public key");
        Ok(StorageHandle {
            identity: identity.to_string(),
            location: self.storage.location(identity),
        })
    }

    /// Metadata for `identity`, or `None` if it is not provisioned
    pub fn metadata(&self, identity: &str) -> Result<Option<KeyMetadata>, KeyStoreError> {
        validate_identity(identity)?;
        let Some(bytes) = self.storage.get(identity, KeyKind::Metadata)? else {
            return Ok(None);
        };
        let metadata = serde_json::from_slice(&bytes).map_err(|e| KeyStoreError::Corrupted {
            identity: identity.to_string(),
            kind: KeyKind::Metadata,
            reason: e.to_string(),
        })?;
        Ok(Some(metadata))
    }

    fn load_pem(&self, identity: &str, kind: KeyKind) -> Result<Option<String>, KeyStoreError> {
        let Some(bytes) = self.storage.get(identity, kind)? else {
            return Ok(None);
        };
        let pem = String::from_utf8(bytes).map_err(|e| KeyStoreError::Corrupted {
            identity: identity.to_string(),
            kind,
            reason: e.to_string(),
        })?;
        Ok(Some(pem))
    }

    /// Load the key pair of a local identity
    ///
    /// Returns `None` if the identity is unknown, not fully provisioned, or only
    /// holds an imported public key.
    pub fn load_private(&self, identity: &str) -> Result<Option<KeyPair>, KeyStoreError> {
        let Some(metadata) = self.metadata(identity)? else {
            return Ok(None);
        };
        if !metadata.has_private_key {
            return Ok(None);
        }
        let Some(pem) = self.load_pem(identity, KeyKind::Private)? else {
            return Ok(None);
        };
        let secret = SecretKey::from_pem(&pem).map_err(|e| KeyStoreError::Corrupted {
            identity: identity.to_string(),
            kind: KeyKind::Private,
            reason: e.to_string(),
        })?;
        Ok(Some(KeyPair::from_parts(secret, metadata.created_at)))
    }

    /// Load the public key of any provisioned identity
    pub fn load_public(&self, identity: &str) -> Result<Option<PublicKey>, KeyStoreError> {
        if self.metadata(identity)?.is_none() {
            return Ok(None);
        }
        let Some(pem) = self.load_pem(identity, KeyKind::Public)? else {
            return Ok(None);
        };
        let public = PublicKey::from_pem(&pem).map_err(|e| KeyStoreError::Corrupted {
            identity: identity.to_string(),
            kind: KeyKind::Public,
            reason: e.to_string(),
        })?;
        Ok(Some(public))
    }

    /// Canonical PEM text of `identity`'s public key
    pub fn export_public_key_pem(&self, identity: &str) -> Result<Option<String>, KeyStoreError> {
        match self.load_public(identity)? {
            Some(public) => Ok(Some(public.to_pem()?)),
            None => Ok(None),
        }
    }

    /// Every provisioned identity
    pub fn list_identities(&self) -> Result<BTreeSet<String>, KeyStoreError> {
        let mut identities = BTreeSet::new();
        for identity in self.storage.identities()? {
            if validate_identity(&identity).is_err() {
                continue;
            }
            if self.storage.get(&identity, KeyKind::Metadata)?.is_some() {
                identities.insert(identity);
            }
        }
        Ok(identities)
    }

    /// Public key PEM of every provisioned identity
    pub fn public_key_registry(&self) -> Result<BTreeMap<String, String>, KeyStoreError> {
        let mut registry = BTreeMap::new();
        for identity in self.list_identities()? {
            if let Some(pem) = self.export_public_key_pem(&identity)? {
                registry.insert(identity, pem);
            }
        }
        Ok(registry)
    }

    /// Irreversibly remove `identity`'s keys and metadata
    pub fn delete(&self, identity: &str) -> Result<bool, KeyStoreError> {
        validate_identity(identity)?;
        let _lock = self.storage.lock(identity)?;

        let removed = self.storage.remove(identity)?;
        if removed {
            tracing::info!(identity, "deleted keys");
        }
        Ok(removed)
    }
}

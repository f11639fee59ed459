use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::storage::{IdentityLock, KeyKind, KeyStorage, StorageError};

/// In-memory key storage using HashMaps
///
/// Clones share the same underlying map, so a test can hand one clone to a
/// `KeyStore` and inspect or corrupt slots through another.
///
/// Locking is coarse: one mutex, shared by all clones, covers every identity.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyStorage {
    inner: Arc<RwLock<HashMap<String, HashMap<KeyKind, Vec<u8>>>>>,
    writer: Arc<Mutex<()>>,
}

impl MemoryKeyStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStorage for MemoryKeyStorage {
    fn lock(&self, _identity: &str) -> Result<IdentityLock<'_>, StorageError> {
        Ok(IdentityLock::new(self.writer.lock()))
    }

    fn put(&self, identity: &str, kind: KeyKind, bytes: &[u8]) -> Result<(), StorageError> {
        self.inner
            .write()
            .entry(identity.to_string())
            .or_default()
            .insert(kind, bytes.to_vec());
        Ok(())
    }

    fn remove_slot(&self, identity: &str, kind: KeyKind) -> Result<bool, StorageError> {
        Ok(self
            .inner
            .write()
            .get_mut(identity)
            .is_some_and(|slots| slots.remove(&kind).is_some()))
    }

    fn get(&self, identity: &str, kind: KeyKind) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .inner
            .read()
            .get(identity)
            .and_then(|slots| slots.get(&kind))
            .cloned())
    }

    fn exists(&self, identity: &str) -> Result<bool, StorageError> {
        Ok(self
            .inner
            .read()
            .get(identity)
            .is_some_and(|slots| !slots.is_empty()))
    }

    fn remove(&self, identity: &str) -> Result<bool, StorageError> {
        Ok(self.inner.write().remove(identity).is_some())
    }

    fn identities(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.inner.read().keys().cloned().collect())
    }

    fn location(&self, identity: &str) -> String {
        format!("memory://{}", identity)
    }
}

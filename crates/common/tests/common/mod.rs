//! Shared fixtures for transfer and key store integration tests
#![allow(dead_code)]

use common::keystore::{FsKeyStorage, KeyStore, MemoryKeyStorage};
use common::transfer::SecureTransfer;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Route library logs to the test harness, filtered by RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// An in-memory transfer service with keys provisioned for `identities`
pub fn memory_transfer(identities: &[&str]) -> SecureTransfer<MemoryKeyStorage> {
    init_tracing();
    let transfer = SecureTransfer::new(KeyStore::new(MemoryKeyStorage::new()));
    for identity in identities {
        transfer.keys().ensure_keys(identity).unwrap();
    }
    transfer
}

/// A filesystem key store rooted in a fresh temp dir
pub fn fs_key_store() -> (KeyStore<FsKeyStorage>, TempDir) {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let storage = FsKeyStorage::open(temp_dir.path().join("keys")).unwrap();
    (KeyStore::new(storage), temp_dir)
}

/// Plaintext spanning several cipher blocks
pub fn multi_block_plaintext() -> Vec<u8> {
    b"The quick brown fox jumps over the lazy dog, then does it again and again.".to_vec()
}

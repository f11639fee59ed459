mod common;

use std::fs;
use std::sync::{Arc, Barrier};

use ::common::keystore::{FsKeyStorage, KeyKind, KeyStore, KeyStoreError};

#[test]
fn test_ensure_keys_twice_leaves_one_pair_on_disk() {
    let (keys, temp_dir) = common::fs_key_store();

    let (first, created) = keys.ensure_keys("alice").unwrap();
    assert!(created);
    let private_path = temp_dir.path().join("keys/alice/private_key.pem");
    let pem_before = fs::read_to_string(&private_path).unwrap();

    let (second, created) = keys.ensure_keys("alice").unwrap();
    assert!(!created);
    assert_eq!(first, second);

    let pem_after = fs::read_to_string(&private_path).unwrap();
    assert_eq!(pem_before, pem_after);

    let entries = fs::read_dir(temp_dir.path().join("keys/alice")).unwrap().count();
    assert_eq!(entries, KeyKind::ALL.len());
}

#[test]
fn test_concurrent_ensure_keys_on_disk() {
    let (keys, _temp_dir) = common::fs_key_store();
    let keys = Arc::new(keys);

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let keys = keys.clone();
            std::thread::spawn(move || keys.ensure_keys("bob").unwrap())
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|(_, created)| *created).count(), 1);
    let stored = keys.load_public("bob").unwrap().unwrap();
    assert!(results.iter().all(|(public, _)| *public == stored));
}

#[test]
fn test_separate_stores_over_one_directory_provision_once() {
    let (first, temp_dir) = common::fs_key_store();
    let second = KeyStore::new(FsKeyStorage::open(temp_dir.path().join("keys")).unwrap());
    let stores = [Arc::new(first), Arc::new(second)];

    for round in 0..3 {
        let barrier = Arc::new(Barrier::new(stores.len()));
        let handles: Vec<_> = stores
            .iter()
            .map(|store| {
                let store = store.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    store.ensure_keys("bob").unwrap()
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let created = results.iter().filter(|(_, created)| *created).count();
        assert_eq!(created, 1, "round {round}");
        assert_eq!(results[0].0, results[1].0, "round {round}");

        // The pair on disk is the one both callers were handed
        let key_pair = stores[0].load_private("bob").unwrap().unwrap();
        assert_eq!(key_pair.public(), &results[0].0, "round {round}");

        assert!(stores[1].delete("bob").unwrap());
    }
}

#[test]
fn test_rewrite_drops_metadata_before_keys() {
    let (keys, temp_dir) = common::fs_key_store();
    keys.ensure_keys("alice").unwrap();

    // A directory in the public key slot makes the rename fail after the
    // private key has been replaced
    let public_path = temp_dir.path().join("keys/alice/public_key.pem");
    fs::remove_file(&public_path).unwrap();
    fs::create_dir(&public_path).unwrap();
    fs::write(public_path.join("occupied"), "x").unwrap();

    let replacement = keys.generate("alice", 2048).unwrap();
    let result = keys.persist("alice", &replacement);
    assert!(matches!(result, Err(KeyStoreError::Storage(_))));

    assert!(!temp_dir.path().join("keys/alice/metadata.json").exists());
    assert!(keys.metadata("alice").unwrap().is_none());
    assert!(keys.load_private("alice").unwrap().is_none());
    assert!(keys.list_identities().unwrap().is_empty());
}

#[test]
fn test_metadata_file_contents() {
    let (keys, temp_dir) = common::fs_key_store();
    keys.ensure_keys("alice").unwrap();

    let json = fs::read_to_string(temp_dir.path().join("keys/alice/metadata.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["identity"], "alice");
    assert_eq!(value["key_size"], 2048);
    assert_eq!(value["has_private_key"], true);
    assert!(value["created_at"].is_string());
}

#[test]
fn test_list_skips_unprovisioned_directories() {
    let (keys, temp_dir) = common::fs_key_store();
    keys.ensure_keys("alice").unwrap();

    // A directory with keys but no metadata is a half-finished provisioning
    let half = temp_dir.path().join("keys/bob");
    fs::create_dir_all(&half).unwrap();
    fs::copy(
        temp_dir.path().join("keys/alice/public_key.pem"),
        half.join("public_key.pem"),
    )
    .unwrap();

    let identities: Vec<_> = keys.list_identities().unwrap().into_iter().collect();
    assert_eq!(identities, vec!["alice".to_string()]);
    assert!(keys.load_public("bob").unwrap().is_none());
}

#[test]
fn test_export_import_between_stores() {
    let (alice_keys, _alice_dir) = common::fs_key_store();
    let (bob_keys, _bob_dir) = common::fs_key_store();

    alice_keys.ensure_keys("alice").unwrap();
    let pem = alice_keys.export_public_key_pem("alice").unwrap().unwrap();
    assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));

    bob_keys.import_public_key("alice", &pem).unwrap();
    assert_eq!(
        bob_keys.load_public("alice").unwrap(),
        alice_keys.load_public("alice").unwrap()
    );
    assert!(bob_keys.load_private("alice").unwrap().is_none());

    let registry = bob_keys.public_key_registry().unwrap();
    assert_eq!(registry.get("alice"), Some(&pem));
}

#[test]
fn test_path_traversal_rejected() {
    let (keys, temp_dir) = common::fs_key_store();
    let result = keys.ensure_keys("../outside");
    assert!(matches!(result, Err(KeyStoreError::InvalidIdentity(_))));
    assert!(!temp_dir.path().join("outside").exists());
}

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::storage::{IdentityLock, KeyKind, KeyStorage, StorageError};

/// Directory under the root holding one lock file per identity
const LOCK_DIR_NAME: &str = ".locks";

/// Key storage on the local filesystem
///
/// # Layout
///
/// ```text
/// <root>/
///   .locks/
///     <identity>.lock
///   <identity>/
///     private_key.pem   (0600 on unix)
///     public_key.pem
///     metadata.json
/// ```
///
/// Every write goes to a temp file in the identity directory which is synced and
/// then renamed over the target, so a slot is never left half-written. The
/// directory is synced after the rename.
///
/// Identity locks are advisory OS file locks on `.locks/<identity>.lock`, so
/// they hold across `FsKeyStorage` values and processes sharing the root. Lock
/// files are never deleted: unlinking one while a waiter holds it open would
/// let a later locker take a fresh file and run alongside.
#[derive(Debug, Clone)]
pub struct FsKeyStorage {
    root: PathBuf,
}

impl FsKeyStorage {
    /// Use `root` as the key directory, creating it if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn identity_dir(&self, identity: &str) -> PathBuf {
        self.root.join(identity)
    }

    fn slot_path(&self, identity: &str, kind: KeyKind) -> PathBuf {
        self.identity_dir(identity).join(kind.file_name())
    }

    fn lock_path(&self, identity: &str) -> PathBuf {
        self.root
            .join(LOCK_DIR_NAME)
            .join(format!("{}.lock", identity))
    }
}

/// Flush a directory's entries so a completed rename or unlink survives a crash
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_mode(file: &fs::File, kind: KeyKind) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = match kind {
        KeyKind::Private => 0o600,
        KeyKind::Public | KeyKind::Metadata => 0o644,
    };
    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &fs::File, _kind: KeyKind) -> io::Result<()> {
    Ok(())
}

impl KeyStorage for FsKeyStorage {
    fn lock(&self, identity: &str) -> Result<IdentityLock<'_>, StorageError> {
        let path = self.lock_path(identity);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        file.lock()?;
        Ok(IdentityLock::new(file))
    }

    fn put(&self, identity: &str, kind: KeyKind, bytes: &[u8]) -> Result<(), StorageError> {
        let dir = self.identity_dir(identity);
        if !dir.try_exists()? {
            fs::create_dir_all(&dir)?;
            sync_dir(&self.root)?;
        }

        let mut tmp = NamedTempFile::new_in(&dir)?;
        set_mode(tmp.as_file(), kind)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.slot_path(identity, kind))
            .map_err(|e| StorageError::Io(e.error))?;
        sync_dir(&dir)?;
        Ok(())
    }

    fn remove_slot(&self, identity: &str, kind: KeyKind) -> Result<bool, StorageError> {
        match fs::remove_file(self.slot_path(identity, kind)) {
            Ok(()) => {
                sync_dir(&self.identity_dir(identity))?;
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn get(&self, identity: &str, kind: KeyKind) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.slot_path(identity, kind)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, identity: &str) -> Result<bool, StorageError> {
        for kind in KeyKind::ALL {
            if self.slot_path(identity, kind).try_exists()? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn remove(&self, identity: &str) -> Result<bool, StorageError> {
        let dir = self.identity_dir(identity);
        if !dir.try_exists()? {
            return Ok(false);
        }

        // Drop the provisioning marker first so a crash mid-delete leaves an
        // identity that reads as absent
        self.remove_slot(identity, KeyKind::Metadata)?;
        fs::remove_dir_all(&dir)?;
        sync_dir(&self.root)?;
        Ok(true)
    }

    fn identities(&self) -> Result<Vec<String>, StorageError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut identities = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            match entry.file_name().to_str() {
                Some(name) if !name.starts_with('.') => identities.push(name.to_string()),
                _ => {}
            }
        }
        Ok(identities)
    }

    fn location(&self, identity: &str) -> String {
        self.identity_dir(identity).display().to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_put_get_overwrite() {
        let temp = TempDir::new().unwrap();
        let storage = FsKeyStorage::open(temp.path().join("keys")).unwrap();

        storage.put("alice", KeyKind::Public, b"first").unwrap();
        storage.put("alice", KeyKind::Public, b"second").unwrap();

        assert_eq!(
            storage.get("alice", KeyKind::Public).unwrap(),
            Some(b"second".to_vec())
        );
        assert!(temp.path().join("keys/alice/public_key.pem").exists());
        assert!(storage.get("alice", KeyKind::Private).unwrap().is_none());
        assert!(storage.get("nobody", KeyKind::Private).unwrap().is_none());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let temp = TempDir::new().unwrap();
        let storage = FsKeyStorage::open(temp.path()).unwrap();

        for kind in KeyKind::ALL {
            storage.put("alice", kind, b"bytes").unwrap();
        }

        let mut names: Vec<String> = fs::read_dir(temp.path().join("alice"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec!["metadata.json", "private_key.pem", "public_key.pem"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_private_key_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let storage = FsKeyStorage::open(temp.path()).unwrap();
        storage.put("alice", KeyKind::Private, b"secret").unwrap();
        storage.put("alice", KeyKind::Public, b"public").unwrap();

        let private_mode = fs::metadata(temp.path().join("alice/private_key.pem"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(private_mode & 0o777, 0o600);

        let public_mode = fs::metadata(temp.path().join("alice/public_key.pem"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(public_mode & 0o777, 0o644);
    }

    #[test]
    fn test_identities_and_remove() {
        let temp = TempDir::new().unwrap();
        let storage = FsKeyStorage::open(temp.path()).unwrap();

        storage.put("alice", KeyKind::Metadata, b"{}").unwrap();
        storage.put("bob", KeyKind::Metadata, b"{}").unwrap();
        // Stray files in the root are not identities
        fs::write(temp.path().join("README"), "hi").unwrap();

        let mut identities = storage.identities().unwrap();
        identities.sort();
        assert_eq!(identities, vec!["alice", "bob"]);

        assert!(storage.exists("alice").unwrap());
        assert!(storage.remove("alice").unwrap());
        assert!(!storage.exists("alice").unwrap());
        assert!(!storage.remove("alice").unwrap());
        assert!(!temp.path().join("alice").exists());
    }

    #[test]
    fn test_remove_slot_keeps_the_rest() {
        let temp = TempDir::new().unwrap();
        let storage = FsKeyStorage::open(temp.path()).unwrap();
        for kind in KeyKind::ALL {
            storage.put("alice", kind, b"bytes").unwrap();
        }

        assert!(storage.remove_slot("alice", KeyKind::Metadata).unwrap());
        assert!(!storage.remove_slot("alice", KeyKind::Metadata).unwrap());
        assert!(!storage.remove_slot("nobody", KeyKind::Private).unwrap());
        assert!(!temp.path().join("alice/metadata.json").exists());
        assert!(storage.get("alice", KeyKind::Private).unwrap().is_some());
        assert!(storage.get("alice", KeyKind::Public).unwrap().is_some());
    }

    #[test]
    fn test_first_put_creates_identity_dir() {
        let temp = TempDir::new().unwrap();
        let storage = FsKeyStorage::open(temp.path().join("keys")).unwrap();

        storage.put("erin", KeyKind::Public, b"public").unwrap();
        assert!(temp.path().join("keys/erin").is_dir());
        assert_eq!(
            fs::read(temp.path().join("keys/erin/public_key.pem")).unwrap(),
            b"public"
        );
    }

    #[test]
    fn test_lock_excludes_other_handles() {
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;

        let temp = TempDir::new().unwrap();
        let first = FsKeyStorage::open(temp.path()).unwrap();
        let second = FsKeyStorage::open(temp.path()).unwrap();

        let held = first.lock("alice").unwrap();
        let (tx, rx) = mpsc::channel();
        let waiter = thread::spawn(move || {
            let _lock = second.lock("alice").unwrap();
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        drop(held);
        rx.recv_timeout(Duration::from_secs(10)).unwrap();
        waiter.join().unwrap();

        // Other identities are independent
        let _alice = first.lock("alice").unwrap();
        let _bob = first.lock("bob").unwrap();
    }

    #[test]
    fn test_lock_dir_is_not_an_identity() {
        let temp = TempDir::new().unwrap();
        let storage = FsKeyStorage::open(temp.path()).unwrap();

        let lock = storage.lock("alice").unwrap();
        storage.put("alice", KeyKind::Metadata, b"{}").unwrap();
        drop(lock);

        assert!(temp.path().join(".locks/alice.lock").exists());
        assert_eq!(storage.identities().unwrap(), vec!["alice"]);
    }

    #[test]
    fn test_missing_root_lists_nothing() {
        let temp = TempDir::new().unwrap();
        let storage = FsKeyStorage::open(temp.path().join("keys")).unwrap();
        fs::remove_dir(temp.path().join("keys")).unwrap();
        assert!(storage.identities().unwrap().is_empty());
    }
}

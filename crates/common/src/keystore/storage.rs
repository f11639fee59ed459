use std::fmt;

/// Which piece of an identity's key material a storage slot holds
///
/// Metadata is written last and removed first; a stored identity without it
/// is treated as not provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyKind {
    Private,
    Public,
    Metadata,
}

impl KeyKind {
    pub const ALL: [KeyKind; 3] = [KeyKind::Private, KeyKind::Public, KeyKind::Metadata];

    /// File name used by on-disk backends
    pub fn file_name(&self) -> &'static str {
        match self {
            KeyKind::Private => "private_key.pem",
            KeyKind::Public => "public_key.pem",
            KeyKind::Metadata => "metadata.json",
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Private => write!(f, "private key"),
            KeyKind::Public => write!(f, "public key"),
            KeyKind::Metadata => write!(f, "metadata"),
        }
    }
}

/// Exclusive hold on an identity, released on drop
///
/// Backends put whatever keeps the lock alive in here: a mutex guard, an open
/// locked file, ...
#[must_use = "the identity is unlocked as soon as this is dropped"]
pub struct IdentityLock<'a> {
    _held: Box<dyn Held + 'a>,
}

/// Anything a backend keeps alive for the duration of a lock
pub trait Held {}

impl<T> Held for T {}

impl<'a> IdentityLock<'a> {
    pub fn new(held: impl Held + 'a) -> Self {
        Self {
            _held: Box::new(held),
        }
    }
}

impl fmt::Debug for IdentityLock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityLock").finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable home for per-identity key material
///
/// Implementations must make each `put` crash-consistent: after a crash a slot
/// holds either the old bytes or the new bytes, never a mix.
///
/// [`KeyStorage::lock`] must exclude every other holder of the same identity that
/// shares the underlying storage, including other `KeyStorage` values and, for
/// durable backends, other processes. Callers take it around every write.
pub trait KeyStorage: Send + Sync + fmt::Debug + 'static {
    /// Block until `identity` is exclusively held by the caller
    fn lock(&self, identity: &str) -> Result<IdentityLock<'_>, StorageError>;

    /// Write `bytes` into the `kind` slot of `identity`, creating the identity if absent
    fn put(&self, identity: &str, kind: KeyKind, bytes: &[u8]) -> Result<(), StorageError>;

    /// Remove a single slot, returning whether it was there
    fn remove_slot(&self, identity: &str, kind: KeyKind) -> Result<bool, StorageError>;

    /// Read the `kind` slot of `identity`
    fn get(&self, identity: &str, kind: KeyKind) -> Result<Option<Vec<u8>>, StorageError>;

    /// Whether any slot exists for `identity`
    fn exists(&self, identity: &str) -> Result<bool, StorageError>;

    /// Remove every slot of `identity`, returning whether anything was there
    fn remove(&self, identity: &str) -> Result<bool, StorageError>;

    /// Every identity with at least one slot, in no particular order
    fn identities(&self) -> Result<Vec<String>, StorageError>;

    /// Human-readable location of an identity's material (a path, a table key, ...)
    fn location(&self, identity: &str) -> String;
}

/**
 * Cryptographic types and operations.
 *  - RSA identity keys and their PEM encoding
 *  - Hybrid AES-CBC / RSA-OAEP encryption
 *  - Content digests and signatures
 */
pub mod crypto;
/**
 * Per-identity key pairs on top of a
 *  pluggable storage backend.
 */
pub mod keystore;
/**
 * The wire envelope carried between
 *  sender and recipient.
 */
pub mod package;
/**
 * Delivery of packages to a recipient.
 */
pub mod relay;
/**
 * Prepare-and-send and receive-and-verify,
 *  built from the pieces above.
 */
pub mod transfer;

pub mod prelude {
    pub use crate::crypto::{KeyPair, PublicKey, SecretKey};
    pub use crate::keystore::{FsKeyStorage, KeyStorage, KeyStore, KeyStoreError, MemoryKeyStorage};
    pub use crate::package::{PackageError, TransferPackage};
    pub use crate::relay::{MailboxRelay, Relay};
    pub use crate::transfer::{
        FailureKind, KeyRole, SecureTransfer, TransferError, TransferOutcome, TransferState,
        TransferStatus,
    };
}

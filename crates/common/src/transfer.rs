//! Secure transfer orchestration
//!
//! [`SecureTransfer`] composes the key store, hybrid cipher and signer into the two
//! protocol operations:
//!
//! ```text
//! prepare:  load sender secret + recipient public
//!           -> digest(plaintext) -> encrypt -> sign(digest) -> encode
//! receive:  decode -> load local secret + sender public
//!           -> decrypt -> verify(signature, digest) + compare digests
//! ```
//!
//! Missing keys and malformed packages are errors. Cryptographic failures while
//! receiving are not: they come back as a [`TransferOutcome`] with both trust flags
//! false, so one bad package never aborts a batch.

use std::fmt;

use crate::crypto::{self, HybridError, SigningError};
use crate::keystore::{KeyStorage, KeyStore, KeyStoreError};
use crate::package::{PackageContents, PackageError, TransferPackage};
use crate::relay::{Relay, RelayError};

/// Which side of a transfer an identity is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    Sender,
    Recipient,
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRole::Sender => write!(f, "sender"),
            KeyRole::Recipient => write!(f, "recipient"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("no key found for {role} '{identity}'")]
    KeyNotFound { identity: String, role: KeyRole },
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),
    #[error(transparent)]
    Crypto(#[from] HybridError),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Package(#[from] PackageError),
    #[error(transparent)]
    Relay(#[from] RelayError),
    #[error("verification failed: authenticity={authenticity}, integrity={integrity}")]
    Verification { authenticity: bool, integrity: bool },
    #[error("invalid transfer transition from {from} to {to}")]
    InvalidTransition {
        from: TransferState,
        to: TransferState,
    },
}

impl TransferError {
    fn key_not_found(identity: &str, role: KeyRole) -> Self {
        TransferError::KeyNotFound {
            identity: identity.to_string(),
            role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Verified,
    Failed,
}

/// Why a received package is not trustworthy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The session key or content could not be decrypted with the local key
    Decryption,
    /// Content matches the digest but the signature is not the sender's
    Signature,
    /// Signed by the sender, but the content changed after signing
    Integrity,
    SignatureAndIntegrity,
}

impl FailureKind {
    fn message(&self, sender_id: &str) -> String {
        match self {
            FailureKind::Decryption => "decryption failed".to_string(),
            FailureKind::Signature => format!("signature is not valid for sender '{}'", sender_id),
            FailureKind::Integrity => "file was modified after signing".to_string(),
            FailureKind::SignatureAndIntegrity => format!(
                "signature is not valid for sender '{}' and file was modified",
                sender_id
            ),
        }
    }
}

/// Result of processing a received package
///
/// `authenticity` reflects only the signature check and `integrity` only the digest
/// comparison; both must be true for the file to be trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub status: TransferStatus,
    pub file_name: String,
    pub sender_id: String,
    /// Absent only when decryption failed
    pub plaintext: Option<Vec<u8>>,
    pub authenticity: bool,
    pub integrity: bool,
    pub message: String,
    pub failure: Option<FailureKind>,
}

impl TransferOutcome {
    fn decryption_failed(contents: &PackageContents) -> Self {
        TransferOutcome {
            status: TransferStatus::Failed,
            file_name: contents.file_name.clone(),
            sender_id: contents.sender_id.clone(),
            plaintext: None,
            authenticity: false,
            integrity: false,
            message: FailureKind::Decryption.message(&contents.sender_id),
            failure: Some(FailureKind::Decryption),
        }
    }

    fn checked(
        contents: &PackageContents,
        plaintext: Vec<u8>,
        authenticity: bool,
        integrity: bool,
    ) -> Self {
        let failure = match (authenticity, integrity) {
            (true, true) => None,
            (false, true) => Some(FailureKind::Signature),
            (true, false) => Some(FailureKind::Integrity),
            (false, false) => Some(FailureKind::SignatureAndIntegrity),
        };
        let (status, message) = match failure {
            None => (
                TransferStatus::Verified,
                "file intact and signature valid".to_string(),
            ),
            Some(kind) => (TransferStatus::Failed, kind.message(&contents.sender_id)),
        };

        TransferOutcome {
            status,
            file_name: contents.file_name.clone(),
            sender_id: contents.sender_id.clone(),
            plaintext: Some(plaintext),
            authenticity,
            integrity,
            message,
            failure,
        }
    }

    pub fn is_trustworthy(&self) -> bool {
        self.status == TransferStatus::Verified
    }

    /// Take the plaintext of a verified transfer, or turn the failure into an error
    pub fn into_verified(self) -> Result<Vec<u8>, TransferError> {
        match (self.failure, self.plaintext) {
            (None, Some(plaintext)) => Ok(plaintext),
            (Some(FailureKind::Decryption), _) | (_, None) => {
                Err(HybridError::Decryption.into())
            }
            (Some(_), Some(_)) => Err(TransferError::Verification {
                authenticity: self.authenticity,
                integrity: self.integrity,
            }),
        }
    }
}

/// Lifecycle of a single transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Prepared,
    Sent,
    Verified,
    Failed,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferState::Prepared => write!(f, "prepared"),
            TransferState::Sent => write!(f, "sent"),
            TransferState::Verified => write!(f, "verified"),
            TransferState::Failed => write!(f, "failed"),
        }
    }
}

impl TransferState {
    pub fn mark_sent(self) -> Result<Self, TransferError> {
        match self {
            TransferState::Prepared => Ok(TransferState::Sent),
            from => Err(TransferError::InvalidTransition {
                from,
                to: TransferState::Sent,
            }),
        }
    }

    /// Move a sent transfer to its terminal state
    pub fn resolve(self, outcome: &TransferOutcome) -> Result<Self, TransferError> {
        let to = match outcome.status {
            TransferStatus::Verified => TransferState::Verified,
            TransferStatus::Failed => TransferState::Failed,
        };
        match self {
            TransferState::Sent => Ok(to),
            from => Err(TransferError::InvalidTransition { from, to }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Verified | TransferState::Failed)
    }
}

/// Sends and receives signed, encrypted files for identities in a [`KeyStore`]
#[derive(Debug)]
pub struct SecureTransfer<S: KeyStorage> {
    keys: KeyStore<S>,
}

impl<S: KeyStorage> SecureTransfer<S> {
    pub fn new(keys: KeyStore<S>) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &KeyStore<S> {
        &self.keys
    }

    /// Encrypt `file` for `recipient_id` and sign it as `sender_id`
    ///
    /// # Errors
    ///
    /// - [`TransferError::KeyNotFound`] if the sender has no private key or the
    ///   recipient has no public key
    /// - [`PackageError::Malformed`] if `file_name` is empty
    /// - [`HybridError::Encryption`] / [`SigningError`] on primitive failure
    pub fn prepare_for_transfer(
        &self,
        file: &[u8],
        file_name: &str,
        sender_id: &str,
        recipient_id: &str,
    ) -> Result<TransferPackage, TransferError> {
        if file_name.trim().is_empty() {
            return Err(PackageError::Malformed {
                field: "file_name",
                reason: "is empty".to_string(),
            }
            .into());
        }

        let sender = self
            .keys
            .load_private(sender_id)?
            .ok_or_else(|| TransferError::key_not_found(sender_id, KeyRole::Sender))?;
        let recipient = self
            .keys
            .load_public(recipient_id)?
            .ok_or_else(|| TransferError::key_not_found(recipient_id, KeyRole::Recipient))?;

        let digest = crypto::digest(file);
        let sealed = crypto::encrypt(file, &recipient)?;
        let signature = crypto::sign(&digest, sender.secret())?;

        let package = PackageContents {
            ciphertext: sealed.ciphertext,
            wrapped_key: sealed.wrapped_key,
            iv: sealed.iv,
            signature: signature.into_bytes(),
            digest,
            file_name: file_name.to_string(),
            sender_id: sender_id.to_string(),
            recipient_id: recipient_id.to_string(),
        }
        .encode();

        tracing::info!(
            sender_id,
            recipient_id,
            file_name,
            size = file.len(),
            digest = %package.file_hash,
            "prepared transfer"
        );
        Ok(package)
    }

    /// Prepare a transfer and hand it to `relay` for delivery
    pub fn send<R: Relay + ?Sized>(
        &self,
        file: &[u8],
        file_name: &str,
        sender_id: &str,
        recipient_id: &str,
        relay: &R,
    ) -> Result<TransferState, TransferError> {
        let package = self.prepare_for_transfer(file, file_name, sender_id, recipient_id)?;
        let state = TransferState::Prepared;
        relay.deliver(recipient_id, package)?;
        state.mark_sent()
    }

    /// Process a package as its addressed recipient
    pub fn receive_and_process(
        &self,
        package: &TransferPackage,
    ) -> Result<TransferOutcome, TransferError> {
        self.receive_and_process_as(&package.recipient_id, package)
    }

    /// Process a package with `local_id`'s private key, whoever it was addressed to
    ///
    /// # Errors
    ///
    /// - [`PackageError`] if the package does not decode
    /// - [`TransferError::KeyNotFound`] if `local_id` has no private key
    ///   ([`KeyRole::Recipient`]) or the sender has no public key ([`KeyRole::Sender`])
    ///
    /// Decryption and verification failures are reported in the outcome.
    pub fn receive_and_process_as(
        &self,
        local_id: &str,
        package: &TransferPackage,
    ) -> Result<TransferOutcome, TransferError> {
        let contents = package.decode()?;

        let local = self
            .keys
            .load_private(local_id)?
            .ok_or_else(|| TransferError::key_not_found(local_id, KeyRole::Recipient))?;
        let sender = self
            .keys
            .load_public(&contents.sender_id)?
            .ok_or_else(|| TransferError::key_not_found(&contents.sender_id, KeyRole::Sender))?;

        let plaintext = match crypto::decrypt(
            &contents.ciphertext,
            &contents.wrapped_key,
            &contents.iv,
            local.secret(),
        ) {
            Ok(plaintext) => plaintext,
            Err(_) => {
                tracing::warn!(
                    local_id,
                    sender_id = %contents.sender_id,
                    file_name = %contents.file_name,
                    "could not decrypt package"
                );
                return Ok(TransferOutcome::decryption_failed(&contents));
            }
        };

        let authenticity = crypto::verify(&contents.digest, &contents.signature, &sender);
        let integrity = crypto::digest(&plaintext) == contents.digest;
        let outcome = TransferOutcome::checked(&contents, plaintext, authenticity, integrity);

        if outcome.is_trustworthy() {
            tracing::info!(
                local_id,
                sender_id = %contents.sender_id,
                file_name = %contents.file_name,
                "verified transfer"
            );
        } else {
            tracing::warn!(
                local_id,
                sender_id = %contents.sender_id,
                file_name = %contents.file_name,
                authenticity,
                integrity,
                "transfer failed verification"
            );
        }
        Ok(outcome)
    }
}

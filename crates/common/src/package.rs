use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::crypto::{is_digest_hex, IV_SIZE};

#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("malformed package: field '{field}' {reason}")]
    Malformed { field: &'static str, reason: String },
    #[error("malformed package: {0}")]
    Json(#[from] serde_json::Error),
}

impl PackageError {
    fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        PackageError::Malformed {
            field,
            reason: reason.into(),
        }
    }

    fn missing(field: &'static str) -> Self {
        Self::malformed(field, "is missing")
    }
}

/// The envelope exchanged between sender and recipient
///
/// Every binary field is standard base64 with padding. The digest travels as the
/// lowercase hex string that was signed.
///
/// ```json
/// {
///   "encrypted_file": "<base64>",
///   "encrypted_aes_key": "<base64>",
///   "iv": "<base64, 16 bytes>",
///   "signature": "<base64>",
///   "file_hash": "<64 lowercase hex chars>",
///   "file_name": "note.txt",
///   "sender_id": "alice",
///   "recipient_id": "bob"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferPackage {
    pub encrypted_file: String,
    pub encrypted_aes_key: String,
    pub iv: String,
    pub signature: String,
    pub file_hash: String,
    pub file_name: String,
    pub sender_id: String,
    pub recipient_id: String,
}

/// Decoded fields of a [`TransferPackage`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageContents {
    pub ciphertext: Vec<u8>,
    pub wrapped_key: Vec<u8>,
    pub iv: [u8; IV_SIZE],
    pub signature: Vec<u8>,
    pub digest: String,
    pub file_name: String,
    pub sender_id: String,
    pub recipient_id: String,
}

/// Wire shape with every field optional, so a missing field is reported by name
/// rather than as a generic serde error
#[derive(Deserialize)]
struct RawPackage {
    encrypted_file: Option<String>,
    encrypted_aes_key: Option<String>,
    iv: Option<String>,
    signature: Option<String>,
    file_hash: Option<String>,
    file_name: Option<String>,
    sender_id: Option<String>,
    recipient_id: Option<String>,
}

impl TryFrom<RawPackage> for TransferPackage {
    type Error = PackageError;

    fn try_from(raw: RawPackage) -> Result<Self, Self::Error> {
        Ok(TransferPackage {
            encrypted_file: raw
                .encrypted_file
                .ok_or_else(|| PackageError::missing("encrypted_file"))?,
            encrypted_aes_key: raw
                .encrypted_aes_key
                .ok_or_else(|| PackageError::missing("encrypted_aes_key"))?,
            iv: raw.iv.ok_or_else(|| PackageError::missing("iv"))?,
            signature: raw
                .signature
                .ok_or_else(|| PackageError::missing("signature"))?,
            file_hash: raw
                .file_hash
                .ok_or_else(|| PackageError::missing("file_hash"))?,
            file_name: raw
                .file_name
                .ok_or_else(|| PackageError::missing("file_name"))?,
            sender_id: raw
                .sender_id
                .ok_or_else(|| PackageError::missing("sender_id"))?,
            recipient_id: raw
                .recipient_id
                .ok_or_else(|| PackageError::missing("recipient_id"))?,
        })
    }
}

fn decode_binary(field: &'static str, value: &str) -> Result<Vec<u8>, PackageError> {
    let bytes = STANDARD
        .decode(value)
        .map_err(|e| PackageError::malformed(field, format!("is not valid base64: {}", e)))?;
    if bytes.is_empty() {
        return Err(PackageError::malformed(field, "is empty"));
    }
    Ok(bytes)
}

fn require_text(field: &'static str, value: &str) -> Result<String, PackageError> {
    if value.trim().is_empty() {
        return Err(PackageError::malformed(field, "is empty"));
    }
    Ok(value.to_string())
}

/// Build the wire envelope from its decoded fields
pub fn encode(contents: &PackageContents) -> TransferPackage {
    TransferPackage {
        encrypted_file: STANDARD.encode(&contents.ciphertext),
        encrypted_aes_key: STANDARD.encode(&contents.wrapped_key),
        iv: STANDARD.encode(contents.iv),
        signature: STANDARD.encode(&contents.signature),
        file_hash: contents.digest.clone(),
        file_name: contents.file_name.clone(),
        sender_id: contents.sender_id.clone(),
        recipient_id: contents.recipient_id.clone(),
    }
}

/// Parse and validate every field of a wire envelope
pub fn decode(package: &TransferPackage) -> Result<PackageContents, PackageError> {
    let ciphertext = decode_binary("encrypted_file", &package.encrypted_file)?;
    let wrapped_key = decode_binary("encrypted_aes_key", &package.encrypted_aes_key)?;
    let iv: [u8; IV_SIZE] = decode_binary("iv", &package.iv)?
        .try_into()
        .map_err(|bytes: Vec<u8>| {
            PackageError::malformed(
                "iv",
                format!("must be {} bytes, got {}", IV_SIZE, bytes.len()),
            )
        })?;
    let signature = decode_binary("signature", &package.signature)?;

    if !is_digest_hex(&package.file_hash) {
        return Err(PackageError::malformed(
            "file_hash",
            "must be 64 lowercase hex characters",
        ));
    }

    Ok(PackageContents {
        ciphertext,
        wrapped_key,
        iv,
        signature,
        digest: package.file_hash.clone(),
        file_name: require_text("file_name", &package.file_name)?,
        sender_id: require_text("sender_id", &package.sender_id)?,
        recipient_id: require_text("recipient_id", &package.recipient_id)?,
    })
}

impl PackageContents {
    pub fn encode(&self) -> TransferPackage {
        encode(self)
    }
}

impl TransferPackage {
    pub fn decode(&self) -> Result<PackageContents, PackageError> {
        decode(self)
    }

    pub fn to_json(&self) -> Result<String, PackageError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a package from JSON, rejecting it if any field is absent or invalid
    pub fn from_json(json: &str) -> Result<Self, PackageError> {
        let raw: RawPackage = serde_json::from_str(json)?;
        let package = TransferPackage::try_from(raw)?;
        package.decode()?;
        Ok(package)
    }
}

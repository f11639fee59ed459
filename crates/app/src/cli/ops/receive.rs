use std::path::{Path, PathBuf};

use clap::Args;

use common::package::{PackageError, TransferPackage};
use common::transfer::{SecureTransfer, TransferError, TransferOutcome};
use vouch_app::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct Receive {
    /// Package JSON produced by `vouch send`
    pub package: PathBuf,

    /// Local identity to decrypt with (defaults to the package's recipient)
    #[arg(long = "as")]
    pub as_identity: Option<String>,

    /// Directory to write the recovered file into
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Write the file even if it fails verification
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ReceiveError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Package(#[from] PackageError),
    #[error("refusing to write untrusted file\n{0}")]
    Untrusted(String),
    #[error("package file name '{0}' is not a plain file name")]
    UnsafeFileName(String),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Strip any directory components a sender put in the file name
pub fn safe_file_name(file_name: &str) -> Option<&str> {
    let name = Path::new(file_name).file_name()?.to_str()?;
    if name == file_name && !name.starts_with('.') {
        Some(name)
    } else {
        None
    }
}

pub fn trust_report(outcome: &TransferOutcome) -> String {
    let flag = |ok: bool| if ok { "ok" } else { "FAILED" };
    format!(
        "{}\n - File: {}\n - Sender: {}\n - Authenticity: {}\n - Integrity: {}",
        outcome.message,
        outcome.file_name,
        outcome.sender_id,
        flag(outcome.authenticity),
        flag(outcome.integrity)
    )
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Receive {
    type Error = ReceiveError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let json = tokio::fs::read_to_string(&self.package)
            .await
            .map_err(|source| ReceiveError::Io {
                path: self.package.clone(),
                source,
            })?;
        let package = TransferPackage::from_json(&json)?;

        let transfer = SecureTransfer::new(ctx.key_store()?);
        let local_id = self
            .as_identity
            .clone()
            .unwrap_or_else(|| package.recipient_id.clone());
        let outcome = transfer.receive_and_process_as(&local_id, &package)?;
        let report = trust_report(&outcome);

        if !outcome.is_trustworthy() && !self.force {
            return Err(ReceiveError::Untrusted(report));
        }

        let Some(plaintext) = outcome.plaintext.as_deref() else {
            return Err(ReceiveError::Untrusted(report));
        };
        let name = safe_file_name(&outcome.file_name)
            .ok_or_else(|| ReceiveError::UnsafeFileName(outcome.file_name.clone()))?;

        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .map_err(|source| ReceiveError::Io {
                path: self.out_dir.clone(),
                source,
            })?;
        let out = self.out_dir.join(name);
        tokio::fs::write(&out, plaintext)
            .await
            .map_err(|source| ReceiveError::Io {
                path: out.clone(),
                source,
            })?;

        Ok(format!("{}\n - Written to: {}", report, out.display()))
    }
}

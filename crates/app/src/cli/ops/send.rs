use std::path::{Path, PathBuf};

use clap::Args;

use common::package::PackageError;
use common::transfer::{SecureTransfer, TransferError};
use vouch_app::state::StateError;

/// Extension appended to the file name for the default package path
pub const PACKAGE_EXTENSION: &str = "vouch.json";

#[derive(Args, Debug, Clone)]
pub struct SendFile {
    /// Local identity that signs the file
    #[arg(long)]
    pub from: String,

    /// Identity the file is encrypted for
    #[arg(long)]
    pub to: String,

    /// File to send
    pub file: PathBuf,

    /// Where to write the package (defaults to <file>.vouch.json)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Package(#[from] PackageError),
    #[error("{path} has no file name")]
    NoFileName { path: PathBuf },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Default package location beside the input file
pub fn default_package_path(file: &Path) -> Option<PathBuf> {
    let name = file.file_name()?.to_str()?;
    Some(file.with_file_name(format!("{}.{}", name, PACKAGE_EXTENSION)))
}

#[async_trait::async_trait]
impl crate::cli::op::Op for SendFile {
    type Error = SendError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let file_name = self
            .file
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| SendError::NoFileName {
                path: self.file.clone(),
            })?;
        let out = match &self.out {
            Some(out) => out.clone(),
            None => default_package_path(&self.file).ok_or_else(|| SendError::NoFileName {
                path: self.file.clone(),
            })?,
        };

        let data = tokio::fs::read(&self.file)
            .await
            .map_err(|source| SendError::Io {
                path: self.file.clone(),
                source,
            })?;

        let transfer = SecureTransfer::new(ctx.key_store()?);
        let package = transfer.prepare_for_transfer(&data, file_name, &self.from, &self.to)?;

        tokio::fs::write(&out, package.to_json()?)
            .await
            .map_err(|source| SendError::Io {
                path: out.clone(),
                source,
            })?;

        Ok(format!(
            "Wrote package for '{}' to {}\n - File: {} ({} bytes)\n - SHA-256: {}",
            self.to,
            out.display(),
            file_name,
            data.len(),
            package.file_hash
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_package_path() {
        assert_eq!(
            default_package_path(Path::new("/tmp/note.txt")),
            Some(PathBuf::from("/tmp/note.txt.vouch.json"))
        );
        assert_eq!(
            default_package_path(Path::new("report")),
            Some(PathBuf::from("report.vouch.json"))
        );
        assert_eq!(default_package_path(Path::new("/")), None);
    }
}

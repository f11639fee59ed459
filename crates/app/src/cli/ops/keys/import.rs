use std::path::PathBuf;

use clap::Args;

use common::keystore::KeyStoreError;
use vouch_app::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct Import {
    /// Identity to register the key under
    pub identity: String,

    /// PEM file holding the peer's public key
    pub pem_file: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Import {
    type Error = ImportError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let pem = tokio::fs::read_to_string(&self.pem_file)
            .await
            .map_err(|source| ImportError::Read {
                path: self.pem_file.clone(),
                source,
            })?;

        let keys = ctx.key_store()?;
        let handle = keys.import_public_key(&self.identity, &pem)?;
        Ok(format!(
            "Imported public key for '{}' into {}",
            handle.identity, handle.location
        ))
    }
}

use clap::Args;

use common::keystore::KeyStoreError;
use vouch_app::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct Export {
    /// Identity whose public key to print
    pub identity: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),
    #[error("no keys found for '{0}'")]
    NotFound(String),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Export {
    type Error = ExportError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let keys = ctx.key_store()?;
        let pem = keys
            .export_public_key_pem(&self.identity)?
            .ok_or_else(|| ExportError::NotFound(self.identity.clone()))?;
        Ok(pem.trim_end().to_string())
    }
}

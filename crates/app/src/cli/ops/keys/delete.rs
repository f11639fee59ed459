use clap::Args;

use common::keystore::KeyStoreError;
use vouch_app::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct Delete {
    /// Identity whose keys to remove
    pub identity: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),
    #[error("no keys found for '{0}'")]
    NotFound(String),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Delete {
    type Error = DeleteError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let keys = ctx.key_store()?;
        if !keys.delete(&self.identity)? {
            return Err(DeleteError::NotFound(self.identity.clone()));
        }
        Ok(format!("Deleted keys for '{}'", self.identity))
    }
}

use clap::Args;

use common::crypto::KeyError;
use common::keystore::KeyStoreError;
use vouch_app::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct Generate {
    /// Identity to provision
    pub identity: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),
    #[error(transparent)]
    Key(#[from] KeyError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Generate {
    type Error = GenerateError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let keys = ctx.key_store()?;
        let (public, created) = keys.ensure_keys(&self.identity)?;

        let status = if created { "Generated" } else { "Already provisioned" };
        Ok(format!(
            "{} keys for '{}'\n - Key size: {} bits\n - Fingerprint: {}",
            status,
            self.identity,
            public.key_size(),
            public.fingerprint()?
        ))
    }
}

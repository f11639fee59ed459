use clap::Args;

use common::crypto::KeyError;
use common::keystore::KeyStoreError;
use vouch_app::state::StateError;

#[derive(Args, Debug, Clone)]
pub struct List;

#[derive(Debug, thiserror::Error)]
pub enum ListError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),
    #[error(transparent)]
    Key(#[from] KeyError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for List {
    type Error = ListError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let keys = ctx.key_store()?;

        let mut lines = Vec::new();
        for identity in keys.list_identities()? {
            let Some(metadata) = keys.metadata(&identity)? else {
                continue;
            };
            let Some(public) = keys.load_public(&identity)? else {
                continue;
            };
            let kind = if metadata.has_private_key { "local" } else { "imported" };
            lines.push(format!(
                "{} ({}, {} bits) {}",
                identity,
                kind,
                metadata.key_size,
                public.fingerprint()?
            ));
        }

        if lines.is_empty() {
            Ok("No identities found".to_string())
        } else {
            Ok(lines.join("\n"))
        }
    }
}

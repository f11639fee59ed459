use std::path::PathBuf;

use clap::Args;

use vouch_app::state::{AppConfig, AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// RSA key size in bits for new identities (minimum 2048)
    #[arg(long, default_value_t = common::crypto::DEFAULT_KEY_SIZE)]
    pub key_size: usize,

    /// Keep keys outside the vouch directory
    #[arg(long)]
    pub keys_dir: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config = AppConfig {
            key_size: self.key_size,
            keys_dir: self.keys_dir.clone(),
            ..AppConfig::default()
        };

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        Ok(format!(
            "Initialized vouch directory at: {}\n\
             - Keys: {}\n\
             - Config: {}\n\
             - Key size: {} bits",
            state.vouch_dir.display(),
            state.keys_path.display(),
            state.config_path.display(),
            state.config.key_size,
        ))
    }
}

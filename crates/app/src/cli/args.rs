pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "vouch")]
#[command(about = "Send files the recipient can decrypt and verify")]
pub struct Args {
    /// Path to the vouch config directory (defaults to ~/.vouch)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: crate::Command,
}

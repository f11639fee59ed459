// CLI modules
mod cli;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Init, Keys, Receive, SendFile, Version};
use vouch_app::logging::{init_logging, parse_level};
use vouch_app::state::AppState;

command_enum! {
    (Init, Init),
    (Keys, Keys),
    (Send, SendFile),
    (Receive, Receive),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // --log-level beats the configured level; RUST_LOG beats both
    let level = args
        .log_level
        .clone()
        .or_else(|| {
            AppState::load(args.config_path.clone())
                .ok()
                .map(|state| state.config.log_level)
        })
        .map(|level| parse_level(&level))
        .unwrap_or(tracing::Level::INFO);
    let guard = init_logging(level);

    let ctx = cli::op::OpContext::new(args.config_path);

    let code = match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    // Flush buffered log lines before exiting
    drop(guard);
    std::process::exit(code);
}

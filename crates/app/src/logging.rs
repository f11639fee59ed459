use std::str::FromStr;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Parse a level name, falling back to INFO for anything unrecognized
pub fn parse_level(level: &str) -> Level {
    Level::from_str(level).unwrap_or(Level::INFO)
}

/// Install the CLI's subscriber: compact output on stderr so stdout only carries
/// command output. RUST_LOG overrides `level`.
///
/// The returned guard flushes buffered lines on drop and must be held until exit.
pub fn init_logging(level: Level) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(writer)
        .with_filter(env_filter);

    if tracing_subscriber::registry().with(layer).try_init().is_err() {
        eprintln!("Warning: a tracing subscriber is already installed");
    }

    guard
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("WARN"), Level::WARN);
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("loud"), Level::INFO);
    }
}

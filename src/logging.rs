//!
//! Structured logging setup, replacing the teacher's hand-rolled
//! `util::log`/`LogLevel` with `tracing`/`tracing-subscriber`.
//!

use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Map the config's redis-style loglevel onto a tracing filter directive.
/// `RUST_LOG`, if set, always takes precedence.
pub fn init(config: &Config) {
    let default_directive = match config.loglevel.as_str() {
        "debug" => "debug",
        "verbose" => "info",
        "notice" => "warn",
        "warning" => "error",
        _ => "info",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

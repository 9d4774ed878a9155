//! Subscriber setup for the binary and anything else embedding the roster.

use tracing_subscriber::EnvFilter;

/// Environment variable holding a full `EnvFilter` directive; wins over the configured default.
pub const LOG_ENV: &str = "ROLLBOOK_LOG";

/// Installs a global fmt subscriber. Fails if a global subscriber is already set.
pub fn init(default_filter: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).try_init()
}

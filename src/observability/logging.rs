//! # Logging
//!
//! Installs the global `tracing` subscriber.

use crate::config::LogFormat;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "sealed_secret_generator=info,sealctl=info,tower_http=info";

/// Install the global subscriber; a no-op if one is already installed
pub fn init(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let result = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    if let Err(e) = result {
        tracing::warn!("Tracing subscriber init returned error (may already be initialized): {}", e);
    }
}

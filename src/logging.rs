//! Structured logging setup.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize tracing with the given default level; `RUST_LOG` overrides.
///
/// Returns an error when a subscriber is already installed, which callers
/// embedding the crate into a larger host can safely ignore.
pub fn init_tracing(default_level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()?;
    Ok(())
}

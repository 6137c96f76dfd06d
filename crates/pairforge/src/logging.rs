//! Tracing subscriber setup.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs a global fmt subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `default_filter` is used
/// (e.g. `"info"` or `"pairforge=debug,info"`). Fails if a global
/// subscriber is already set.
pub fn init(default_filter: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()
}

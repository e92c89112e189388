use tracing_subscriber::{EnvFilter, prelude::*};

use crate::error::{AppError, AppResult};

/// Installs the global subscriber: `RUST_LOG` filtering (default `info`)
/// with human-readable output on stderr.
pub fn init() -> AppResult<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()
        .map_err(|err| AppError::unsupported(format!("failed to install logger: {err}")))
}

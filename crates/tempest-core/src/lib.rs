pub mod config;
pub mod error;

pub use config::{Config, ValidationResult, WeatherConfig, MAX_API_KEYS, MIN_REFRESH_MINUTES};
pub use error::{AppError, ConfigError, NetworkError, StorageError, WeatherError};

use anyhow::Result;

/// Initialize logging for the host application.
///
/// Safe to call more than once; later calls keep the subscriber that is
/// already installed.
pub fn init() -> Result<()> {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Tempest core initialized");
    } else {
        tracing::debug!("Tracing subscriber already installed");
    }
    Ok(())
}

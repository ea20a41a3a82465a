//! Logging setup on top of `tracing-subscriber`

use tracing_subscriber::EnvFilter;

use crate::adapters::toml_config::{LogFormat, LoggingConfig};
use crate::error::{ClipChopError, ClipChopResult};

/// Logging system manager
pub struct LoggingSystem {
    config: LoggingConfig,
}

impl LoggingSystem {
    pub fn new(config: LoggingConfig) -> Self {
        Self { config }
    }

    /// Filter from `RUST_LOG` when set, otherwise from the configured level
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.config.level))
    }

    /// Install the global subscriber; logs go to stderr
    pub fn initialize(&self) -> ClipChopResult<()> {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(self.env_filter())
            .with_writer(std::io::stderr);

        let result = match self.config.format {
            LogFormat::Pretty => builder.pretty().try_init(),
            LogFormat::Compact => builder.compact().try_init(),
            LogFormat::Json => builder.json().try_init(),
        };
        result.map_err(|e| ClipChopError::config(format!("Failed to initialize logging: {}", e)))?;

        tracing::debug!(
            level = %self.config.level,
            format = ?self.config.format,
            "Logging system initialized"
        );
        Ok(())
    }

    /// Log system information
    pub fn log_system_info(&self) {
        tracing::info!("clipchop {}", env!("CARGO_PKG_VERSION"));

        #[cfg(target_os = "macos")]
        tracing::debug!("Platform: macOS");
        #[cfg(target_os = "linux")]
        tracing::debug!("Platform: Linux");
        #[cfg(target_os = "windows")]
        tracing::debug!("Platform: Windows");
    }
}

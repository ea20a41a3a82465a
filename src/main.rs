//! clipchop CLI
//!
//! Trims videos without re-encoding: the requested start is snapped to the
//! keyframe at or before it, then ffmpeg copies the streams.
//!
//! # Usage
//!
//! ```bash
//! clipchop resolve --input "video.mp4" --start 00:01:00
//! clipchop export --input "video.mkv" --start 1:00 --stop 2:30 --dry-run
//! clipchop keyframes --input "video.mp4" --limit 20 --format json
//! clipchop list --dir ~/Videos
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use clipchop::app::DefaultAppContainer;
use clipchop::cli::{commands, Cli};
use clipchop::config_initialization::initialize_configuration_hierarchy;
use clipchop::utils::LoggingSystem;

/// Main entry point for the clipchop CLI application
#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    let loaded = initialize_configuration_hierarchy(&cli).context("Failed to load configuration")?;
    let config = loaded.config.clone();

    // Initialize logging
    let logging = LoggingSystem::new(config.logging.clone());
    logging.initialize()?;
    logging.log_system_info();
    loaded.log_summary();

    let container = DefaultAppContainer::new(&config)?;

    // Execute the requested command
    commands::run(cli.command, &container, &config).await?;

    info!("clipchop completed successfully");
    Ok(())
}

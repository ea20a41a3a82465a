//! Configuration initialization and hierarchy management

use std::path::PathBuf;

use tracing::{debug, info};

use crate::adapters::toml_config::{AppConfig, TomlConfigAdapter};
use crate::cli::{Cli, Commands};
use crate::error::{ClipChopError, ClipChopResult};

/// Environment variables and the settings they override
pub const ENV_MAPPINGS: [(&str, &str); 5] = [
    ("CLIPCHOP_LOG_LEVEL", "logging.level"),
    ("CLIPCHOP_LOG_FORMAT", "logging.format"),
    ("CLIPCHOP_PROBE_BACKEND", "probe.backend"),
    ("CLIPCHOP_FFMPEG_PATH", "export.ffmpeg_path"),
    ("CLIPCHOP_OVERWRITE", "export.overwrite"),
];

/// Merged configuration and where its values came from
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    /// Config file that was read, if any
    pub source: Option<PathBuf>,
    pub env_overrides: usize,
    pub cli_overrides: usize,
}

impl LoadedConfig {
    /// Report the configuration sources; call once logging is installed
    pub fn log_summary(&self) {
        match &self.source {
            Some(path) => info!("Loaded configuration from {}", path.display()),
            None => debug!("No configuration file found; using defaults"),
        }
        if self.env_overrides > 0 {
            info!("Applied {} environment variable overrides", self.env_overrides);
        }
        if self.cli_overrides > 0 {
            info!("Applied {} CLI configuration overrides", self.cli_overrides);
        }
    }
}

/// Initialize configuration hierarchy following precedence: CLI > Env > File > Defaults
pub fn initialize_configuration_hierarchy(cli: &Cli) -> ClipChopResult<LoadedConfig> {
    build_configuration(cli, |name| std::env::var(name).ok())
}

/// Merge the layers with environment variables read through `lookup`
pub fn build_configuration<F>(cli: &Cli, lookup: F) -> ClipChopResult<LoadedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    // Step 1: defaults, Step 2: file
    let (mut config, source) = load_config_file(cli.config.clone())?;

    // Step 3: environment variables
    let env_overrides = apply_environment_overrides(&mut config, lookup)?;

    // Step 4: CLI arguments
    let cli_overrides = apply_cli_overrides(&mut config, cli)?;

    config.validate()?;
    Ok(LoadedConfig {
        config,
        source,
        env_overrides,
        cli_overrides,
    })
}

/// An explicit path must exist; the default locations are optional
pub fn load_config_file(explicit: Option<PathBuf>) -> ClipChopResult<(AppConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(path) => path,
        None => match TomlConfigAdapter::default_config_path() {
            Some(path) => path,
            None => return Ok((AppConfig::default(), None)),
        },
    };
    let config = TomlConfigAdapter::load(&path)?;
    Ok((config, Some(path)))
}

fn parse_bool(name: &str, value: &str) -> ClipChopResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ClipChopError::config(format!(
            "{} must be a boolean, got '{}'",
            name, other
        ))),
    }
}

/// Apply environment overrides read through `lookup`; returns how many applied
pub fn apply_environment_overrides<F>(config: &mut AppConfig, lookup: F) -> ClipChopResult<usize>
where
    F: Fn(&str) -> Option<String>,
{
    let mut env_overrides = 0;
    for (env_var, key) in ENV_MAPPINGS {
        let Some(value) = lookup(env_var).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        match key {
            "logging.level" => config.logging.level = value.clone(),
            "logging.format" => config.logging.format = value.parse()?,
            "probe.backend" => config.probe.backend = value.parse()?,
            "export.ffmpeg_path" => config.export.ffmpeg_path = PathBuf::from(&value),
            "export.overwrite" => config.export.overwrite = parse_bool(env_var, &value)?,
            _ => continue,
        }
        env_overrides += 1;
    }
    Ok(env_overrides)
}

/// Apply CLI argument overrides to configuration
pub fn apply_cli_overrides(config: &mut AppConfig, cli: &Cli) -> ClipChopResult<usize> {
    let mut cli_overrides = 0;

    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
        cli_overrides += 1;
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = format.parse()?;
        cli_overrides += 1;
    }
    if let Some(backend) = &cli.backend {
        config.probe.backend = backend.parse()?;
        cli_overrides += 1;
    }
    if let Commands::Export(args) = &cli.command {
        if args.overwrite {
            config.export.overwrite = true;
            cli_overrides += 1;
        }
    }
    Ok(cli_overrides)
}

// TOML config adapter - Configuration file model, loading and validation

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ClipChopError, ClipChopResult};

pub const CONFIG_FILE_NAME: &str = "clipchop.toml";
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = ClipChopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(ClipChopError::config(format!(
                "unknown log format '{}' (expected pretty, compact or json)",
                other
            ))),
        }
    }
}

/// Keyframe probing backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeBackend {
    Native,
    Libav,
}

impl FromStr for ProbeBackend {
    type Err = ClipChopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "native" => Ok(ProbeBackend::Native),
            "libav" => Ok(ProbeBackend::Libav),
            other => Err(ClipChopError::config(format!(
                "unknown probe backend '{}' (expected native or libav)",
                other
            ))),
        }
    }
}

impl fmt::Display for ProbeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeBackend::Native => write!(f, "native"),
            ProbeBackend::Libav => write!(f, "libav"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub backend: ProbeBackend,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            backend: ProbeBackend::Native,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub ffmpeg_path: PathBuf,
    pub overwrite: bool,
    /// Prepended to the input file name when no output is given
    pub output_prefix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            overwrite: false,
            output_prefix: "Trimmed ".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub extensions: Vec<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["mp4".to_string(), "mkv".to_string()],
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub probe: ProbeConfig,
    pub export: ExportConfig,
    pub library: LibraryConfig,
}

impl AppConfig {
    /// Check merged values and normalize case
    pub fn validate(&mut self) -> ClipChopResult<()> {
        let level = self.logging.level.trim().to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ClipChopError::config(format!(
                "invalid log level '{}' (expected one of {})",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }
        self.logging.level = level;

        if self.export.ffmpeg_path.as_os_str().is_empty() {
            return Err(ClipChopError::config("export.ffmpeg_path must not be empty"));
        }

        if self.library.extensions.is_empty() {
            return Err(ClipChopError::config("library.extensions must not be empty"));
        }
        let mut extensions = Vec::with_capacity(self.library.extensions.len());
        for ext in &self.library.extensions {
            let ext = ext.trim().trim_start_matches('.').to_lowercase();
            if ext.is_empty() || ext.contains(['/', '\\', '.']) {
                return Err(ClipChopError::config(format!(
                    "invalid library extension '{}'",
                    ext
                )));
            }
            if !extensions.contains(&ext) {
                extensions.push(ext);
            }
        }
        self.library.extensions = extensions;

        Ok(())
    }
}

/// TOML configuration adapter
pub struct TomlConfigAdapter;

impl TomlConfigAdapter {
    /// Config file used when `--config` is not given
    ///
    /// `clipchop.toml` in the working directory wins over the per-user file.
    pub fn default_config_path() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.is_file() {
            return Some(local);
        }

        let user_dir = if let Some(appdata) = std::env::var_os("APPDATA") {
            PathBuf::from(appdata).join("clipchop")
        } else if let Some(config_home) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config_home).join("clipchop")
        } else {
            PathBuf::from(std::env::var_os("HOME")?).join(".config").join("clipchop")
        };
        let user = user_dir.join("config.toml");
        user.is_file().then_some(user)
    }

    /// Deserialize config from TOML string; missing keys keep their defaults
    pub fn parse(content: &str) -> ClipChopResult<AppConfig> {
        toml::from_str(content)
            .map_err(|e| ClipChopError::config(format!("Failed to parse TOML config: {}", e)))
    }

    pub fn load(path: &Path) -> ClipChopResult<AppConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClipChopError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn to_toml_string(config: &AppConfig) -> ClipChopResult<String> {
        toml::to_string_pretty(config)
            .map_err(|e| ClipChopError::config(format!("Failed to serialize config: {}", e)))
    }
}

// Ports - Interface definitions (contracts)

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::errors::DomainError;
use crate::domain::model::{ContainerInfo, KeyframeTimestamp, ResolvedTrim};
use crate::error::ClipChopResult;

/// Lazy, forward-only keyframe sequence of one opened container.
///
/// Dropping the stream closes the container; a fresh pass needs a fresh open.
pub trait KeyframeStream: Iterator<Item = Result<KeyframeTimestamp, DomainError>> {
    /// Metadata read while opening the container
    fn info(&self) -> &ContainerInfo;
}

/// Port for container probing
pub trait ProbePort: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Open a container and position a keyframe stream on its primary video stream
    fn open_keyframes(&self, path: &Path) -> Result<Box<dyn KeyframeStream>, DomainError>;
}

/// Result of a finished stream copy
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub output: PathBuf,
    pub command: Vec<String>,
    pub elapsed_ms: u64,
    pub output_size: Option<u64>,
}

/// Port for the external lossless stream-copy step
#[async_trait]
pub trait ExportPort: Send + Sync {
    /// Command line that `export` would run
    fn command_line(&self, trim: &ResolvedTrim, output: &Path) -> Vec<String>;

    /// Copy the resolved range into `output` without re-encoding
    async fn export(&self, trim: &ResolvedTrim, output: &Path) -> ClipChopResult<ExportReport>;
}

/// Port for file system queries
pub trait FsPort: Send + Sync {
    fn file_exists(&self, path: &Path) -> bool;

    /// Media files directly inside `dir` whose extension is in `extensions`
    fn list_media(&self, dir: &Path, extensions: &[String]) -> ClipChopResult<Vec<PathBuf>>;
}

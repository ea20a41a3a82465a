//! FFmpeg execution adapter
//!
//! Runs the external `ffmpeg` binary to copy a resolved range without
//! re-encoding.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::domain::model::ResolvedTrim;
use crate::error::{ClipChopError, ClipChopResult};
use crate::ports::{ExportPort, ExportReport};

const STDERR_TAIL_LINES: usize = 12;

/// FFmpeg-based stream-copy adapter
#[derive(Debug, Clone)]
pub struct FfmpegExportAdapter {
    ffmpeg_path: PathBuf,
    overwrite: bool,
}

impl FfmpegExportAdapter {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            overwrite,
        }
    }

    fn arguments(&self, trim: &ResolvedTrim, output: &Path) -> Vec<String> {
        // -ss before -i seeks the input; -to then counts from the seek point
        vec![
            "-ss".to_string(),
            trim.start.format_seek_arg(),
            "-i".to_string(),
            trim.source.to_string_lossy().to_string(),
            "-map_metadata".to_string(),
            "0".to_string(),
            "-to".to_string(),
            trim.copy_duration().format_seek_arg(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            "copy".to_string(),
            "-map".to_string(),
            "0".to_string(),
            if self.overwrite { "-y" } else { "-n" }.to_string(),
            output.to_string_lossy().to_string(),
        ]
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let skip = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[skip..].join("\n")
}

#[async_trait]
impl ExportPort for FfmpegExportAdapter {
    fn command_line(&self, trim: &ResolvedTrim, output: &Path) -> Vec<String> {
        let mut command = vec![self.ffmpeg_path.to_string_lossy().to_string()];
        command.extend(self.arguments(trim, output));
        command
    }

    async fn export(&self, trim: &ResolvedTrim, output: &Path) -> ClipChopResult<ExportReport> {
        let command = self.command_line(trim, output);
        info!(
            "Exporting {} from {} to {}",
            trim.copy_duration(),
            trim.start,
            output.display()
        );
        debug!("FFmpeg args: {:?}", command);

        let started = Instant::now();
        let result = Command::new(&self.ffmpeg_path)
            .args(self.arguments(trim, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                ClipChopError::export(format!(
                    "failed to run {}: {}",
                    self.ffmpeg_path.display(),
                    e
                ))
            })?;

        if !result.status.success() {
            return Err(ClipChopError::export(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                stderr_tail(&result.stderr)
            )));
        }

        let output_size = tokio::fs::metadata(output).await.ok().map(|m| m.len());
        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!("Export finished in {} ms", elapsed_ms);

        Ok(ExportReport {
            output: output.to_path_buf(),
            command,
            elapsed_ms,
            output_size,
        })
    }
}

// Inspect interactor - Keyframe listing, GOP summary and media library listing

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::domain::errors::DomainError;
use crate::domain::model::{ContainerInfo, KeyframeTimestamp, TimeSpec};
use crate::domain::rules::{GopSummary, KeyframeIndex};
use crate::error::{ClipChopError, ClipChopResult};
use crate::ports::{FsPort, ProbePort};

/// Output format of an inspection report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
    Yaml,
}

impl FromStr for ReportFormat {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            "yaml" | "yml" => Ok(ReportFormat::Yaml),
            other => Err(DomainError::BadArgs(format!(
                "unknown report format '{}' (expected text, json or yaml)",
                other
            ))),
        }
    }
}

/// Request for keyframe inspection
#[derive(Debug, Clone)]
pub struct InspectRequest {
    pub input: PathBuf,
    /// Stop after this many keyframes
    pub limit: Option<usize>,
    pub format: ReportFormat,
}

/// Keyframes of a container with their spacing statistics
#[derive(Debug, Clone, Serialize)]
pub struct KeyframeReport {
    pub container: ContainerInfo,
    pub keyframes: Vec<KeyframeTimestamp>,
    /// More keyframes exist past the limit
    pub truncated: bool,
    pub summary: GopSummary,
}

/// Response from keyframe inspection
#[derive(Debug, Clone)]
pub struct InspectResponse {
    pub report: KeyframeReport,
    pub rendered: String,
}

/// Interactor for inspection use cases
pub struct InspectInteractor {
    probe_port: Arc<dyn ProbePort>,
    fs_port: Arc<dyn FsPort>,
}

impl InspectInteractor {
    /// Create new inspect interactor with injected ports
    pub fn new(probe_port: Arc<dyn ProbePort>, fs_port: Arc<dyn FsPort>) -> Self {
        Self {
            probe_port,
            fs_port,
        }
    }

    /// Enumerate keyframes and render a report
    pub fn keyframes(&self, request: &InspectRequest) -> ClipChopResult<InspectResponse> {
        info!("Listing keyframes of {}", request.input.display());
        let report = collect_report(self.probe_port.as_ref(), &request.input, request.limit)?;
        info!(
            "Found {} keyframes{}",
            report.keyframes.len(),
            if report.truncated { " (limit reached)" } else { "" }
        );

        let rendered = render(&report, request.format)?;
        Ok(InspectResponse { report, rendered })
    }

    /// `keyframes` on the blocking thread pool
    pub async fn keyframes_blocking(&self, request: InspectRequest) -> ClipChopResult<InspectResponse> {
        let probe = Arc::clone(&self.probe_port);
        tokio::task::spawn_blocking(move || -> ClipChopResult<InspectResponse> {
            let report = collect_report(probe.as_ref(), &request.input, request.limit)?;
            let rendered = render(&report, request.format)?;
            Ok(InspectResponse { report, rendered })
        })
        .await
        .map_err(|e| ClipChopError::TaskFailed {
            message: e.to_string(),
        })?
    }

    /// Media files directly inside `dir`
    pub fn list_media(&self, dir: &Path, extensions: &[String]) -> ClipChopResult<Vec<PathBuf>> {
        info!("Listing media files in {}", dir.display());
        self.fs_port.list_media(dir, extensions)
    }
}

fn collect_report(probe: &dyn ProbePort, input: &Path, limit: Option<usize>) -> ClipChopResult<KeyframeReport> {
    let stream = probe.open_keyframes(input)?;
    let container = stream.info().clone();
    let index = KeyframeIndex::new(container.video_stream, stream);

    let mut keyframes = Vec::new();
    let mut truncated = false;
    for item in index {
        let keyframe = item?;
        if limit.is_some_and(|limit| keyframes.len() >= limit) {
            truncated = true;
            break;
        }
        keyframes.push(keyframe);
    }

    let summary = GopSummary::from_keyframes(&keyframes);
    Ok(KeyframeReport {
        container,
        keyframes,
        truncated,
        summary,
    })
}

fn render(report: &KeyframeReport, format: ReportFormat) -> ClipChopResult<String> {
    match format {
        ReportFormat::Json => serde_json::to_string_pretty(report)
            .map_err(|e| ClipChopError::serialization(format!("JSON serialization failed: {}", e))),
        ReportFormat::Yaml => serde_yaml::to_string(report)
            .map_err(|e| ClipChopError::serialization(format!("YAML serialization failed: {}", e))),
        ReportFormat::Text => Ok(format_as_text(report)),
    }
}

fn optional_time(time: Option<TimeSpec>) -> String {
    time.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Format a report as human-readable text
fn format_as_text(report: &KeyframeReport) -> String {
    let container = &report.container;
    let mut output = String::new();

    let _ = writeln!(output, "File: {}", container.path);
    let _ = writeln!(
        output,
        "Container: {} ({} streams)",
        container.format, container.stream_count
    );
    let _ = writeln!(
        output,
        "Video stream: {} ({})",
        container.video_stream,
        container.video_codec.as_deref().unwrap_or("unknown codec")
    );
    let _ = writeln!(output, "Duration: {}", optional_time(container.duration));

    let _ = writeln!(
        output,
        "\nKeyframes ({}{}):",
        report.keyframes.len(),
        if report.truncated { ", limit reached" } else { "" }
    );
    for (i, keyframe) in report.keyframes.iter().enumerate() {
        let _ = writeln!(
            output,
            "  #{:<5} {:>14}  pts {}",
            i,
            keyframe.time.to_string(),
            keyframe.pts
        );
    }

    let summary = &report.summary;
    let _ = writeln!(
        output,
        "\nGOP interval: min {}, mean {}, max {}",
        optional_time(summary.min_interval),
        optional_time(summary.mean_interval),
        optional_time(summary.max_interval)
    );
    if let Some(regularity) = summary.regularity {
        let _ = writeln!(output, "Regularity: {:.2}", regularity);
    }

    output
}

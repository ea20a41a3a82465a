// Trim interactor - Orchestrates keyframe resolution and stream-copy export

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::app::session::TrimSession;
use crate::domain::errors::DomainError;
use crate::domain::model::{ContainerInfo, ResolvedTrim, TimeSpec, TrimRequest};
use crate::domain::rules::{KeyframeIndex, KeyframeResolver};
use crate::error::{ClipChopError, ClipChopResult};
use crate::ports::{ExportPort, ExportReport, FsPort, KeyframeStream, ProbePort};

/// How export output paths are chosen and checked
#[derive(Debug, Clone)]
pub struct OutputPolicy {
    /// Prepended to the input file name for the default output
    pub prefix: String,
    /// Allowed output extensions, lowercase without dot
    pub extensions: Vec<String>,
    pub overwrite: bool,
}

/// A resolved trim and the command that will copy it
#[derive(Debug, Clone, Serialize)]
pub struct ExportPlan {
    pub trim: ResolvedTrim,
    pub output: PathBuf,
    pub command: Vec<String>,
}

/// Interactor for the resolve and export use cases
pub struct TrimInteractor {
    probe_port: Arc<dyn ProbePort>,
    export_port: Arc<dyn ExportPort>,
    fs_port: Arc<dyn FsPort>,
}

fn open_logged(probe: &dyn ProbePort, source: &Path) -> Result<Box<dyn KeyframeStream>, DomainError> {
    let stream = probe.open_keyframes(source)?;
    let info = stream.info();
    debug!(
        backend = probe.name(),
        format = %info.format,
        stream = info.video_stream,
        codec = ?info.video_codec,
        "Container opened"
    );
    Ok(stream)
}

/// Open, validate and resolve in one pass over the keyframe index
fn resolve_with(probe: &dyn ProbePort, request: &TrimRequest) -> Result<ResolvedTrim, DomainError> {
    let stream = open_logged(probe, request.source())?;
    resolve_stream(stream, request)
}

/// Load the file into a session, select the range, and resolve it on the same open container
fn resolve_selection_with(
    probe: &dyn ProbePort,
    source: &Path,
    start: TimeSpec,
    stop: Option<TimeSpec>,
) -> Result<ResolvedTrim, DomainError> {
    let stream = open_logged(probe, source)?;

    let mut session = TrimSession::new();
    session.load(source, stream.info().duration);
    session.set_start(start)?;
    if let Some(stop) = stop {
        session.set_stop(stop)?;
    }
    let request = session.trim_request()?;

    resolve_stream(stream, &request)
}

fn resolve_stream(stream: Box<dyn KeyframeStream>, request: &TrimRequest) -> Result<ResolvedTrim, DomainError> {
    info!(
        "Resolving keyframe at or before {} in {}",
        request.start,
        request.source.display()
    );
    let info = stream.info().clone();
    let stop = validate_against_duration(request, &info)?;
    let keyframes = KeyframeIndex::new(info.video_stream, stream);
    let keyframe = KeyframeResolver::resolve(request.start, keyframes)?;

    let resolved = ResolvedTrim {
        source: request.source.clone(),
        start: keyframe.time,
        requested_start: request.start,
        stop,
        keyframe,
    };
    info!(
        "Start {} snapped to keyframe {} (shift {})",
        resolved.requested_start,
        resolved.start,
        resolved.start_shift()
    );
    Ok(resolved)
}

/// Check the request against the container duration; returns the stop to use
fn validate_against_duration(request: &TrimRequest, info: &ContainerInfo) -> Result<TimeSpec, DomainError> {
    let Some(duration) = info.duration else {
        debug!("Duration unknown; skipping range checks");
        return Ok(request.stop);
    };

    if request.start >= duration {
        return Err(DomainError::InvalidRequest(format!(
            "start ({}) is not before the end of the file ({})",
            request.start, duration
        )));
    }
    if request.stop > duration {
        warn!(
            "Stop {} is past the end of the file; clamping to {}",
            request.stop, duration
        );
        return Ok(duration);
    }
    Ok(request.stop)
}

impl TrimInteractor {
    /// Create new trim interactor with injected ports
    pub fn new(
        probe_port: Arc<dyn ProbePort>,
        export_port: Arc<dyn ExportPort>,
        fs_port: Arc<dyn FsPort>,
    ) -> Self {
        Self {
            probe_port,
            export_port,
            fs_port,
        }
    }

    /// Container metadata without reading any keyframe
    pub fn container_info(&self, path: &Path) -> Result<ContainerInfo, DomainError> {
        let stream = self.probe_port.open_keyframes(path)?;
        Ok(stream.info().clone())
    }

    /// Snap the request's start to the keyframe at or before it
    pub fn resolve(&self, request: &TrimRequest) -> Result<ResolvedTrim, DomainError> {
        resolve_with(self.probe_port.as_ref(), request)
    }

    /// `resolve` on the blocking thread pool
    pub async fn resolve_blocking(&self, request: TrimRequest) -> ClipChopResult<ResolvedTrim> {
        let probe = Arc::clone(&self.probe_port);
        let resolved = tokio::task::spawn_blocking(move || resolve_with(probe.as_ref(), &request))
            .await
            .map_err(|e| ClipChopError::TaskFailed {
                message: e.to_string(),
            })??;
        Ok(resolved)
    }

    /// Select `start..stop` of a file (stop defaults to the end) and resolve it.
    ///
    /// The container is opened once: its duration bounds the selection and
    /// the same keyframe stream is then scanned.
    pub fn resolve_selection(
        &self,
        source: &Path,
        start: TimeSpec,
        stop: Option<TimeSpec>,
    ) -> Result<ResolvedTrim, DomainError> {
        resolve_selection_with(self.probe_port.as_ref(), source, start, stop)
    }

    /// `resolve_selection` on the blocking thread pool
    pub async fn resolve_selection_blocking(
        &self,
        source: PathBuf,
        start: TimeSpec,
        stop: Option<TimeSpec>,
    ) -> ClipChopResult<ResolvedTrim> {
        let probe = Arc::clone(&self.probe_port);
        let resolved = tokio::task::spawn_blocking(move || {
            resolve_selection_with(probe.as_ref(), &source, start, stop)
        })
        .await
        .map_err(|e| ClipChopError::TaskFailed {
            message: e.to_string(),
        })??;
        Ok(resolved)
    }

    /// Default output: the prefixed input file name next to the input
    pub fn default_output_path(source: &Path, prefix: &str) -> PathBuf {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let file_name = format!("{}{}", prefix, name);
        match source.parent() {
            Some(parent) => parent.join(file_name),
            None => PathBuf::from(file_name),
        }
    }

    /// Choose and check the output path, and build the export command
    pub fn plan_export(
        &self,
        trim: ResolvedTrim,
        output: Option<PathBuf>,
        policy: &OutputPolicy,
    ) -> ClipChopResult<ExportPlan> {
        let output = output.unwrap_or_else(|| Self::default_output_path(&trim.source, &policy.prefix));

        let extension = output
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if !policy.extensions.contains(&extension) {
            return Err(ClipChopError::export(format!(
                "output {} must have one of the extensions: {}",
                output.display(),
                policy.extensions.join(", ")
            )));
        }

        if same_file(&output, &trim.source) {
            return Err(ClipChopError::export(format!(
                "output {} would overwrite the input",
                output.display()
            )));
        }
        if self.fs_port.file_exists(&output) && !policy.overwrite {
            return Err(ClipChopError::export(format!(
                "output {} already exists (use --overwrite to replace it)",
                output.display()
            )));
        }

        let command = self.export_port.command_line(&trim, &output);
        Ok(ExportPlan {
            trim,
            output,
            command,
        })
    }

    /// Run the stream copy for a plan
    pub async fn export(&self, plan: &ExportPlan) -> ClipChopResult<ExportReport> {
        info!(
            "Starting export of {} to {}",
            plan.trim.source.display(),
            plan.output.display()
        );
        self.export_port.export(&plan.trim, &plan.output).await
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

use std::sync::Arc;

use tracing::debug;

use crate::adapters::{AppConfig, FfmpegExportAdapter, LocalFsAdapter, NativeProbeAdapter, ProbeBackend};
#[cfg(feature = "libav")]
use crate::adapters::ProbeLibavAdapter;
use crate::app::{inspect_interactor::InspectInteractor, trim_interactor::TrimInteractor};
use crate::error::{ClipChopError, ClipChopResult};
use crate::ports::{ExportPort, FsPort, ProbePort};

pub trait AppContainer: Send + Sync {
    fn trim_interactor(&self) -> Arc<TrimInteractor>;
    fn inspect_interactor(&self) -> Arc<InspectInteractor>;
}

pub struct DefaultAppContainer {
    trim_interactor: Arc<TrimInteractor>,
    inspect_interactor: Arc<InspectInteractor>,
}

/// Probe adapter for the configured backend
pub fn probe_port_for(backend: ProbeBackend) -> ClipChopResult<Arc<dyn ProbePort>> {
    match backend {
        ProbeBackend::Native => Ok(Arc::new(NativeProbeAdapter::new())),
        #[cfg(feature = "libav")]
        ProbeBackend::Libav => Ok(Arc::new(ProbeLibavAdapter::new()?)),
        #[cfg(not(feature = "libav"))]
        ProbeBackend::Libav => Err(ClipChopError::config(
            "the libav probe backend needs a build with the `libav` feature",
        )),
    }
}

impl DefaultAppContainer {
    /// Wire adapters from a merged and validated configuration
    pub fn new(config: &AppConfig) -> ClipChopResult<Self> {
        let probe_port = probe_port_for(config.probe.backend)?;
        let export_port: Arc<dyn ExportPort> = Arc::new(FfmpegExportAdapter::new(
            config.export.ffmpeg_path.clone(),
            config.export.overwrite,
        ));
        let fs_port: Arc<dyn FsPort> = Arc::new(LocalFsAdapter::new());

        debug!(
            "Wired probe backend {} and ffmpeg at {}",
            probe_port.name(),
            config.export.ffmpeg_path.display()
        );
        Ok(Self::with_ports(probe_port, export_port, fs_port))
    }

    pub fn with_ports(
        probe_port: Arc<dyn ProbePort>,
        export_port: Arc<dyn ExportPort>,
        fs_port: Arc<dyn FsPort>,
    ) -> Self {
        let trim_interactor = Arc::new(TrimInteractor::new(
            Arc::clone(&probe_port),
            export_port,
            Arc::clone(&fs_port),
        ));
        let inspect_interactor = Arc::new(InspectInteractor::new(probe_port, fs_port));

        Self {
            trim_interactor,
            inspect_interactor,
        }
    }
}

impl AppContainer for DefaultAppContainer {
    fn trim_interactor(&self) -> Arc<TrimInteractor> {
        Arc::clone(&self.trim_interactor)
    }

    fn inspect_interactor(&self) -> Arc<InspectInteractor> {
        Arc::clone(&self.inspect_interactor)
    }
}

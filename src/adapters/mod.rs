// Adapters - External system implementations

pub mod exec_ffmpeg;
pub mod fs_local;
#[cfg(feature = "libav")]
pub mod probe_libav;
pub mod probe_native;
pub mod toml_config;

// Re-export adapters
pub use exec_ffmpeg::FfmpegExportAdapter;
pub use fs_local::LocalFsAdapter;
#[cfg(feature = "libav")]
pub use probe_libav::ProbeLibavAdapter;
pub use probe_native::NativeProbeAdapter;
pub use toml_config::{AppConfig, LogFormat, ProbeBackend, TomlConfigAdapter};

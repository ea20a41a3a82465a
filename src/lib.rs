//! clipchop library
//!
//! Keyframe index and nearest-keyframe resolver for lossless, time-based
//! video trimming, with native MP4/Matroska probing and an ffmpeg
//! stream-copy export.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config_initialization;
pub mod domain;
pub mod error;
pub mod ports;
pub mod utils;

// Re-export commonly used types
pub use domain::errors::DomainError;
pub use domain::model::{ContainerInfo, KeyframeTimestamp, ResolvedTrim, TimeSpec, Timebase, TrimRequest};
pub use domain::rules::{GopSummary, KeyframeIndex, KeyframeResolver};
pub use error::{ClipChopError, ClipChopResult};

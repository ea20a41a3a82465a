//! CLI module for clipchop
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod args;
pub mod commands;

pub use args::{ExportArgs, KeyframesArgs, ListArgs, ResolveArgs};

/// clipchop - keyframe-accurate stream-copy trimming
///
/// Snaps a requested start time to the keyframe at or before it, so the
/// range can be copied out of the container without re-encoding.
#[derive(Parser, Debug)]
#[command(name = "clipchop")]
#[command(about = "Trim videos losslessly by snapping cuts to keyframes")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Configuration file (default: ./clipchop.toml, then the user config directory)
    #[arg(long, global = true, env = "CLIPCHOP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (pretty, compact, json)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Keyframe probing backend (native, libav)
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Find the keyframe a stream copy must start from
    Resolve(ResolveArgs),
    /// Copy a range into a new file without re-encoding
    Export(ExportArgs),
    /// List the keyframes of the primary video stream
    Keyframes(KeyframesArgs),
    /// List media files in a directory
    List(ListArgs),
}

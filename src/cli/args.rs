//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;

/// Arguments for the resolve command
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Requested start time (HH:MM:SS.ms, MM:SS.ms, or seconds)
    #[arg(short, long)]
    pub start: String,

    /// Requested stop time (default: end of file)
    #[arg(long)]
    pub stop: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Requested start time (HH:MM:SS.ms, MM:SS.ms, or seconds)
    #[arg(short, long)]
    pub start: String,

    /// Stop time (HH:MM:SS.ms, MM:SS.ms, or seconds)
    #[arg(long)]
    pub stop: String,

    /// Output file path (default: prefixed input name next to the input)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Replace an existing output file
    #[arg(long)]
    pub overwrite: bool,

    /// Print the ffmpeg command instead of running it
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the keyframes command
#[derive(Args, Debug)]
pub struct KeyframesArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Stop after this many keyframes
    #[arg(long)]
    pub limit: Option<usize>,

    /// Output format (text, json, yaml)
    #[arg(long, default_value = "text")]
    pub format: String,
}

/// Arguments for the list command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Directory to list
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,
}

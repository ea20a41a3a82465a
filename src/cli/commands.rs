//! Command implementations

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::adapters::toml_config::AppConfig;
use crate::app::{AppContainer, InspectRequest, OutputPolicy, TrimInteractor};
use crate::cli::args::{ExportArgs, KeyframesArgs, ListArgs, ResolveArgs};
use crate::cli::Commands;
use crate::domain::model::{ResolvedTrim, TimeSpec};

/// Dispatch a parsed command
pub async fn run(command: Commands, container: &dyn AppContainer, config: &AppConfig) -> Result<()> {
    match command {
        Commands::Resolve(args) => resolve(args, container).await,
        Commands::Export(args) => export(args, container, config).await,
        Commands::Keyframes(args) => keyframes(args, container).await,
        Commands::List(args) => list(args, container, config),
    }
}

fn parse_time(label: &str, value: &str) -> Result<TimeSpec> {
    TimeSpec::parse(value).with_context(|| format!("Invalid {} time '{}'", label, value))
}

/// Parse the times and resolve them against one open of the input
async fn resolve_times(
    trim: &TrimInteractor,
    input: &Path,
    start: &str,
    stop: Option<&str>,
) -> Result<ResolvedTrim> {
    let start = parse_time("start", start)?;
    let stop = stop.map(|s| parse_time("stop", s)).transpose()?;

    let resolved = trim
        .resolve_selection_blocking(input.to_path_buf(), start, stop)
        .await
        .with_context(|| format!("Failed to resolve a keyframe in {}", input.display()))?;
    Ok(resolved)
}

fn print_resolved(resolved: &ResolvedTrim) {
    println!("Requested start: {}", resolved.requested_start);
    println!(
        "Keyframe start:  {} (pts {}, stream {})",
        resolved.start, resolved.keyframe.pts, resolved.keyframe.stream
    );
    println!("Shift:           {}", resolved.start_shift());
    println!("Stop:            {}", resolved.stop);
    println!("Copy duration:   {}", resolved.copy_duration());
}

/// Quote arguments that a shell would split
fn shell_join(command: &[String]) -> String {
    command
        .iter()
        .map(|arg| {
            if arg.is_empty() || arg.contains(|c: char| c.is_whitespace() || c == '"' || c == '\'') {
                format!("\"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\""))
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Execute the resolve command
pub async fn resolve(args: ResolveArgs, container: &dyn AppContainer) -> Result<()> {
    info!("Starting resolve operation for {}", args.input.display());
    let trim = container.trim_interactor();

    let resolved = resolve_times(&trim, &args.input, &args.start, args.stop.as_deref()).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
    } else {
        print_resolved(&resolved);
    }
    Ok(())
}

/// Execute the export command
pub async fn export(args: ExportArgs, container: &dyn AppContainer, config: &AppConfig) -> Result<()> {
    info!("Starting export operation for {}", args.input.display());
    let trim = container.trim_interactor();

    let resolved = resolve_times(&trim, &args.input, &args.start, Some(&args.stop)).await?;

    let policy = OutputPolicy {
        prefix: config.export.output_prefix.clone(),
        extensions: config.library.extensions.clone(),
        overwrite: config.export.overwrite,
    };
    let plan = trim.plan_export(resolved, args.output, &policy)?;

    if args.dry_run {
        println!("{}", shell_join(&plan.command));
        return Ok(());
    }

    let report = trim.export(&plan).await.context("Export failed")?;
    match report.output_size {
        Some(size) => println!("Exported {} ({} bytes)", report.output.display(), size),
        None => println!("Exported {}", report.output.display()),
    }
    Ok(())
}

/// Execute the keyframes command
pub async fn keyframes(args: KeyframesArgs, container: &dyn AppContainer) -> Result<()> {
    info!("Starting keyframe listing for {}", args.input.display());
    let request = InspectRequest {
        input: args.input.clone(),
        limit: args.limit,
        format: args.format.parse()?,
    };

    let response = container
        .inspect_interactor()
        .keyframes_blocking(request)
        .await
        .with_context(|| format!("Failed to list keyframes of {}", args.input.display()))?;
    print!("{}", response.rendered);
    if !response.rendered.ends_with('\n') {
        println!();
    }
    Ok(())
}

/// Execute the list command
pub fn list(args: ListArgs, container: &dyn AppContainer, config: &AppConfig) -> Result<()> {
    let files = container
        .inspect_interactor()
        .list_media(&args.dir, &config.library.extensions)
        .with_context(|| format!("Failed to list {}", args.dir.display()))?;

    if files.is_empty() {
        info!("No media files found in {}", args.dir.display());
    }
    for file in files {
        println!("{}", file.display());
    }
    Ok(())
}

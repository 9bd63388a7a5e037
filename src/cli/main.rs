//! SmartCut command-line interface
//!
//! Opens the model once, then cuts out every input image and saves the
//! result beside it as `<stem>_nobg.png`.

use super::config::CliConfigBuilder;
use crate::{
    error::{ErrorKind, SmartCutError},
    processor::{BackgroundRemovalProcessor, Readiness},
    services::ConsoleProgressReporter,
    tracing_config::{TracingConfig, TracingFormat},
};
use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Cut the foreground out of photographs
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "smartcut")]
pub struct Cli {
    /// Input images or directories of images
    #[arg(value_name = "INPUT", required = true)]
    pub input: Vec<PathBuf>,

    /// Path to the ONNX segmentation model [default: <exe dir>/models/u2net.onnx]
    #[arg(short, long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Inference backend (onnx, tract)
    #[arg(short, long)]
    pub backend: Option<String>,

    /// Number of intra-op threads (0 = all cores)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Apply a sigmoid to raw model outputs before normalization
    #[arg(long)]
    pub sigmoid: bool,

    /// Resize filter (nearest, triangle, catmull-rom, gaussian, lanczos3)
    #[arg(long)]
    pub filter: Option<String>,

    /// Suffix appended to the file stem of each cutout
    #[arg(long)]
    pub suffix: Option<String>,

    /// JSON configuration file, flags override its values
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Emit JSON log lines
    #[cfg(feature = "tracing-json")]
    #[arg(long)]
    pub json_logs: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Status text shown for a failure of `kind`
#[must_use]
pub fn status_line(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::ModelMissing => "Model file missing",
        ErrorKind::ModelCorrupt => "Invalid model file",
        ErrorKind::SessionInitFailure => "Model loading failed",
        _ => "Processing error",
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli).context("Failed to initialize tracing")?;

    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    info!(
        "Model: {}, backend: {}",
        config.model_path.display(),
        config.backend
    );

    let processor = BackgroundRemovalProcessor::new(config)
        .with_progress_reporter(Arc::new(ConsoleProgressReporter::new(cli.verbose > 0)));

    if let Readiness::NotReady { kind, reason } = processor.readiness() {
        eprintln!("{}: {}", status_line(*kind), reason);
        anyhow::bail!("{}", status_line(*kind));
    }

    let files = collect_inputs(&cli.input, &processor.config().output_suffix)?;
    if files.is_empty() {
        warn!("No supported image files found in the provided inputs");
        return Ok(());
    }

    let failed = process_inputs(&processor, &files).await;
    if failed > 0 {
        anyhow::bail!("{} of {} image(s) failed", failed, files.len());
    }
    Ok(())
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let mut tracing = TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_format(log_format(cli));
    if let Ok(filter) = std::env::var("RUST_LOG") {
        tracing = tracing.with_env_filter(filter);
    }
    tracing.init()
}

#[cfg(feature = "tracing-json")]
fn log_format(cli: &Cli) -> TracingFormat {
    if cli.json_logs {
        TracingFormat::Json
    } else {
        TracingFormat::Console
    }
}

#[cfg(not(feature = "tracing-json"))]
fn log_format(_cli: &Cli) -> TracingFormat {
    TracingFormat::Console
}

/// Process `files` in order, returning the number of failures
async fn process_inputs(processor: &BackgroundRemovalProcessor, files: &[PathBuf]) -> usize {
    let progress = (files.len() > 1).then(|| {
        let pb = ProgressBar::new(files.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    });

    let batch_start = Instant::now();
    let mut failed = 0;

    for input in files {
        if let Some(pb) = &progress {
            pb.set_message(format!("Processing {}", input.display()));
        }

        match processor.remove_background_to_file_async(input).await {
            Ok(output) => {
                let message = format!("{} -> {}", input.display(), output.display());
                match &progress {
                    Some(pb) => pb.println(message),
                    None => println!("{}", message),
                }
            },
            Err(e) => {
                failed += 1;
                report_failure(input, &e);
            },
        }

        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        pb.finish_with_message(format!(
            "Done: {} succeeded, {} failed",
            files.len() - failed,
            failed
        ));
    }

    info!(
        "Processed {} image(s) in {:.2}s",
        files.len(),
        batch_start.elapsed().as_secs_f64()
    );
    failed
}

fn report_failure(input: &Path, err: &SmartCutError) {
    error!("Failed to process {}: {}", input.display(), err);
    eprintln!("{}: {} ({})", status_line(err.kind()), input.display(), err);
}

/// Expand directories one level deep and keep files with a supported extension,
/// in sorted order per directory
fn collect_inputs(inputs: &[PathBuf], suffix: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in inputs {
        if path.is_dir() {
            let mut found = Vec::new();
            for entry in std::fs::read_dir(path)
                .with_context(|| format!("Failed to read directory {}", path.display()))?
            {
                let entry = entry?;
                let candidate = entry.path();
                if candidate.is_file() && is_image_file(&candidate) && !is_cutout(&candidate, suffix) {
                    found.push(candidate);
                }
            }
            found.sort();
            files.extend(found);
        } else if path.is_file() {
            if is_image_file(path) {
                files.push(path.clone());
            } else {
                warn!("Skipping unsupported file: {}", path.display());
            }
        } else {
            anyhow::bail!(
                "Input path does not exist or is not accessible: {}",
                path.display()
            );
        }
    }

    Ok(files)
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Previous outputs found while scanning a directory are not reprocessed
fn is_cutout(path: &Path, suffix: &str) -> bool {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| stem.ends_with(suffix))
}

//! Conversion of command-line arguments into a `RemovalConfig`

use crate::cli::main_impl::Cli;
use crate::config::{BackendType, RemovalConfig, ResizeFilter};
use anyhow::{Context, Result};

/// Builds the removal configuration from CLI arguments
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Start from `--config` (or defaults) and apply explicit flags on top
    pub(crate) fn from_cli(cli: &Cli) -> Result<RemovalConfig> {
        let mut config = match &cli.config {
            Some(path) => RemovalConfig::from_json_file(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?,
            None => RemovalConfig::default(),
        };

        if let Some(model) = &cli.model {
            config.model_path.clone_from(model);
        }
        if let Some(backend) = &cli.backend {
            config.backend = backend
                .parse::<BackendType>()
                .with_context(|| format!("Invalid --backend '{}'", backend))?;
        }
        if let Some(filter) = &cli.filter {
            config.resize_filter = filter
                .parse::<ResizeFilter>()
                .with_context(|| format!("Invalid --filter '{}'", filter))?;
        }
        if let Some(threads) = cli.threads {
            config.intra_threads = threads;
        }
        if cli.sigmoid {
            config.apply_sigmoid = true;
        }
        if let Some(suffix) = &cli.suffix {
            config.output_suffix.clone_from(suffix);
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("smartcut").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = parse(&[
            "--model",
            "/opt/models/u2netp.onnx",
            "--backend",
            "tract",
            "--filter",
            "lanczos3",
            "--threads",
            "2",
            "--sigmoid",
            "photo.jpg",
        ]);
        let config = CliConfigBuilder::from_cli(&cli).unwrap();

        assert_eq!(config.model_path, PathBuf::from("/opt/models/u2netp.onnx"));
        assert_eq!(config.backend, BackendType::Tract);
        assert_eq!(config.resize_filter, ResizeFilter::Lanczos3);
        assert_eq!(config.intra_threads, 2);
        assert!(config.apply_sigmoid);
        assert_eq!(config.output_suffix, "_nobg");
    }

    #[test]
    fn test_config_file_is_base_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("smartcut.json");
        std::fs::write(&path, r#"{"output_suffix": "_cut", "intra_threads": 3}"#).unwrap();

        let cli = parse(&["--config", path.to_str().unwrap(), "--threads", "1", "a.png"]);
        let config = CliConfigBuilder::from_cli(&cli).unwrap();
        assert_eq!(config.output_suffix, "_cut");
        assert_eq!(config.intra_threads, 1);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let cli = parse(&["--backend", "cuda", "a.png"]);
        assert!(CliConfigBuilder::from_cli(&cli).is_err());

        let cli = parse(&["--suffix", "", "a.png"]);
        assert!(CliConfigBuilder::from_cli(&cli).is_err());
    }
}

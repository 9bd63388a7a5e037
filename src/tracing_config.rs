//! Tracing subscriber setup for the command-line front end
//!
//! The library only emits `tracing` spans and `log` records. Installing a
//! subscriber is left to the application; this module is what the `smartcut`
//! binary uses.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Output format of the subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Colored, compact human-readable output (default)
    Console,
    /// Uncolored compact output for CI logs
    Compact,
    /// JSON lines with span context
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Tracing configuration builder
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Verbosity level (number of `-v` flags)
    pub verbosity: u8,
    pub format: TracingFormat,
    /// Explicit filter directive, overrides `verbosity` when set
    pub env_filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            env_filter: None,
        }
    }
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter directive for the configured verbosity
    ///
    /// Quiet by default: only warnings and the crate's own info messages.
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "warn,smartcut=info",
            1 => "info,smartcut=debug",
            2 => "debug,smartcut=trace",
            _ => "trace",
        }
    }

    /// The filter this configuration installs
    ///
    /// # Errors
    /// - The explicit filter directive does not parse
    pub fn build_filter(&self) -> anyhow::Result<EnvFilter> {
        let directive = self
            .env_filter
            .as_deref()
            .unwrap_or_else(|| self.verbosity_to_filter());
        Ok(EnvFilter::try_new(directive)?)
    }

    /// Install the global subscriber
    ///
    /// `log` records from the library and its engines are bridged into the
    /// same subscriber.
    ///
    /// # Errors
    /// - Invalid filter directive
    /// - A global subscriber is already installed
    pub fn init(self) -> anyhow::Result<()> {
        let registry = Registry::default().with(self.build_filter()?);

        match self.format {
            TracingFormat::Console => {
                let fmt_layer = fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
            TracingFormat::Compact => {
                let fmt_layer = fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => {
                let fmt_layer = fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr);
                registry.with(fmt_layer).try_init()?;
            },
        }

        tracing::debug!(verbosity = self.verbosity, "Tracing initialized");
        Ok(())
    }
}

/// Initialize tracing with CLI defaults for `verbosity`
///
/// # Errors
/// - A global subscriber is already installed
pub fn init_cli_tracing(verbosity: u8) -> anyhow::Result<()> {
    TracingConfig::new().with_verbosity(verbosity).init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        let filters: Vec<_> = (0..5)
            .map(|v| TracingConfig::new().with_verbosity(v).verbosity_to_filter())
            .collect();
        assert_eq!(filters[0], "warn,smartcut=info");
        assert_eq!(filters[1], "info,smartcut=debug");
        assert_eq!(filters[3], "trace");
        assert_eq!(filters[4], "trace");
    }

    #[test]
    fn test_explicit_filter_overrides_verbosity() {
        let config = TracingConfig::new()
            .with_verbosity(3)
            .with_env_filter("smartcut::processor=debug");
        assert!(config.build_filter().is_ok());

        let config = TracingConfig::new().with_env_filter("smartcut=loud");
        assert!(config.build_filter().is_err());
    }
}

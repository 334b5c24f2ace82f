//! Logging initialization and configuration.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter used when neither the config nor `RUST_LOG` provides one.
const DEFAULT_FILTER: &str = "info,kiln=debug";

static INIT: Once = Once::new();

/// Options for [`init_logging`].
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Explicit filter directive. Takes precedence over `RUST_LOG`.
    pub filter: Option<String>,
    /// Include thread ids in every line.
    pub thread_ids: bool,
}

impl LoggingConfig {
    /// Sets an explicit filter directive such as `"warn,kiln_rhi=trace"`.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Enables or disables thread ids in the output.
    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.thread_ids = enabled;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        match &self.filter {
            Some(directive) => EnvFilter::try_new(directive)
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
            None => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        }
    }
}

/// Initialize the logging system with tracing.
///
/// This sets up tracing-subscriber with:
/// - The configured filter, else `RUST_LOG`, else `info,kiln=debug`
/// - A fmt layer printing targets (and thread ids when requested)
///
/// Only the first call installs a subscriber. Later calls, and calls made
/// after another subscriber was installed elsewhere, are ignored.
///
/// # Example
/// ```
/// kiln_core::init_logging(kiln_core::LoggingConfig::default());
/// tracing::info!("Renderer initialized");
/// ```
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let result = tracing_subscriber::registry()
            .with(config.env_filter())
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(config.thread_ids),
            )
            .try_init();

        if result.is_err() {
            tracing::debug!("A global subscriber was already installed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging(LoggingConfig::default());
        init_logging(LoggingConfig::default().with_filter("trace"));
    }

    #[test]
    fn test_invalid_filter_falls_back_to_default() {
        let config = LoggingConfig::default().with_filter("kiln=[[");
        // Must not panic; the default directive is used instead.
        let _ = config.env_filter();
    }
}

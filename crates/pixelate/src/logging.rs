//! Logging initialization and configuration.
//!
//! Uses the `tracing` ecosystem for structured logging with support for
//! both human-readable and JSON output formats. Pipeline workers run on
//! named threads (`pixelate-chunk-3`, ...), so thread names are included.

use pixelate_core::config::LoggingConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging subsystem.
///
/// - Log output goes to stderr (stdout is reserved for data output)
/// - The RUST_LOG environment variable overrides `level`
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_thread_names(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_names(true)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Initialize logging from the `[logging]` config section, with the CLI
/// `--verbose` and `--json-logs` flags taking precedence.
pub fn init_from_config(config: &LoggingConfig, verbose: bool, json_logs: bool) {
    let json_format = json_logs || config.format == "json";
    init(effective_level(&config.level, verbose), json_format);
}

/// `--verbose` raises the level to debug but never lowers it from trace.
fn effective_level(configured: &str, verbose: bool) -> &str {
    if verbose && !configured.eq_ignore_ascii_case("trace") {
        "debug"
    } else {
        configured
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_level() {
        assert_eq!(effective_level("info", false), "info");
        assert_eq!(effective_level("warn", true), "debug");
        assert_eq!(effective_level("trace", true), "trace");
    }
}

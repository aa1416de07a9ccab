//! # Observability
//!
//! Logging setup shared by the Campus client crates.
//!
//! Library crates never install a subscriber. They use the standard `tracing`
//! macros and leave the decision of where logs go to the binary, which calls
//! `observability::init()` (or `init_with_config`) once at startup.
//!
//! Two outputs are supported:
//!
//! - compact human-readable lines on stderr (the default)
//! - structured JSONL appended to a file, one object per event, when
//!   `LogConfig::log_path` is set
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "campus-cli".into(),
//!         default_level: "debug".into(),
//!         log_path: Some("/tmp/campus.jsonl".into()),
//!         also_stderr: true,
//!     });
//!     tracing::info!("ready");
//! }
//! ```

mod file;
mod json_layer;

use std::path::PathBuf;

pub use file::{default_log_path, CentralLogWriter};
pub use json_layer::LogEntry;

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "campus-cli").
    /// Included in every JSONL line for filtering.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// JSONL output file. When `None`, logs only go to stderr.
    pub log_path: Option<PathBuf>,

    /// Also emit compact logs to stderr when writing JSONL.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize logging with default settings (compact stderr output).
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with custom configuration.
///
/// Installing a second global subscriber is a no-op, so calling this twice
/// (e.g. from tests) is harmless.
pub fn init_with_config(config: LogConfig) {
    match &config.log_path {
        Some(path) => file::init_file_subscriber(&config, path),
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter(&config.default_level))
                .with_target(true)
                .with_writer(std::io::stderr)
                .compact()
                .try_init();
        }
    }
}

fn env_filter(default_level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level))
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;

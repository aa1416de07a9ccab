//! Logging initialization for client binaries.
//!
//! Thin wrapper over the observability crate. Library code only uses the
//! `tracing` macros; binaries call [`init_logging`] once at startup.

use observability::LogConfig;
use std::path::PathBuf;

/// Initialize logging for a client binary.
///
/// Logs go to stderr at `level` (overridable with `RUST_LOG`). When
/// `CAMPUS_LOG_JSON` is set to a truthy value, structured JSONL is also
/// appended to `log_file`.
///
/// ```ignore
/// init_logging("campus-cli", "warn", paths.log_file());
/// tracing::info!("started");
/// ```
pub fn init_logging(service_name: &str, level: &str, log_file: PathBuf) {
    let json_enabled = std::env::var("CAMPUS_LOG_JSON")
        .map(|value| is_truthy(&value))
        .unwrap_or(false);

    observability::init_with_config(LogConfig {
        service_name: service_name.into(),
        default_level: level.into(),
        log_path: json_enabled.then_some(log_file),
        also_stderr: true,
    });
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

//! File logging for the `dl` binary.
//!
//! The library only talks to the `log` facade; the binary calls
//! [`init_logging`] once and keeps the returned handle alive until exit.
//! Logs go to `<data-dir>/logs/daylist_*.log`, rotated by size.

use std::path::{Path, PathBuf};

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};

pub const LOG_ENV_VAR: &str = "DAYLIST_LOG";

const LOG_FILE_BASENAME: &str = "daylist";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 2 * 1024 * 1024;
const MAX_LOG_FILES: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("could not create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid log level `{level}`: {source}")]
    InvalidLevel {
        level: String,
        source: flexi_logger::FlexiLoggerError,
    },
    #[error("failed to start logger: {0}")]
    Start(#[from] flexi_logger::FlexiLoggerError),
}

pub fn log_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

/// The log filter actually used: a non-empty `DAYLIST_LOG` beats the config.
pub fn effective_level(configured: &str, env_override: Option<&str>) -> String {
    let raw = env_override
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(configured);
    normalize_level(raw)
}

/// Lowercase bare level names and accept `warning`. Module filters such as
/// `daylist::store=debug` pass through untouched.
fn normalize_level(level: &str) -> String {
    let trimmed = level.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        l @ ("trace" | "debug" | "info" | "warn" | "error" | "off") => l.to_string(),
        "" => "info".to_string(),
        _ => trimmed.to_string(),
    }
}

/// Start file logging under `<data_dir>/logs`.
pub fn init_logging(configured_level: &str, data_dir: &Path) -> Result<LoggerHandle, LoggingError> {
    let env_level = std::env::var(LOG_ENV_VAR).ok();
    let level = effective_level(configured_level, env_level.as_deref());
    let dir = log_dir(data_dir);
    std::fs::create_dir_all(&dir).map_err(|e| LoggingError::CreateDir {
        path: dir.clone(),
        source: e,
    })?;

    let logger = Logger::try_with_str(&level).map_err(|e| LoggingError::InvalidLevel {
        level: level.clone(),
        source: e,
    })?;
    let handle = logger
        .log_to_file(
            FileSpec::default()
                .directory(dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()?;

    log::debug!(
        "event=logging_init status=ok level={} log_dir={} version={}",
        level,
        dir.display(),
        env!("CARGO_PKG_VERSION")
    );
    Ok(handle)
}

//! Logging bootstrap shared by the server binary and tests.
//!
//! # Responsibility
//! - Initialize the `log` backend exactly once per process.
//! - Keep emitted events metadata-only (`event=... module=... status=...`).
//!
//! # Invariants
//! - Initialization is idempotent for the same level and destination.
//! - Re-initialization with a different level or destination is rejected.
//! - Initialization never panics.
//! - Record payloads are never logged, only keys, ids and counts.

use flexi_logger::{
    Cleanup, Criterion, FileSpec, LogSpecification, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const LOG_FILE_BASENAME: &str = "orders";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
const MAX_PANIC_MESSAGE_CHARS: usize = 160;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

struct LoggingState {
    level: LevelFilter,
    log_dir: Option<PathBuf>,
    _logger: LoggerHandle,
}

/// Initializes process logging.
///
/// With `log_dir = Some(dir)` logs go to size-rotated files under `dir`;
/// with `None` they go to stderr.
///
/// # Errors
/// - `level` is not one of `trace|debug|info|warn|error`.
/// - `log_dir` is empty, relative, or cannot be created.
/// - Logging is already active with a different level or destination.
/// - The logger backend fails to start.
pub fn init_logging(level: &str, log_dir: Option<&str>) -> Result<(), String> {
    let level = parse_level(level)?;
    let log_dir = log_dir.map(resolve_log_dir).transpose()?;

    let state = LOGGING_STATE.get_or_try_init(|| -> Result<LoggingState, String> {
        let logger = start_logger(level, log_dir.as_deref())?;
        PANIC_HOOK.get_or_init(install_panic_hook);

        info!(
            "event=app_start module=core status=ok platform={} debug_build={} version={}",
            std::env::consts::OS,
            cfg!(debug_assertions),
            env!("CARGO_PKG_VERSION")
        );
        info!(
            "event=logging_init module=core status=ok level={} destination={}",
            level,
            destination(log_dir.as_deref())
        );

        Ok(LoggingState {
            level,
            log_dir: log_dir.clone(),
            _logger: logger,
        })
    })?;

    if state.level != level || state.log_dir != log_dir {
        return Err(format!(
            "logging already initialized with level `{}` at `{}`; refusing to switch to `{}` at `{}`",
            state.level,
            destination(state.log_dir.as_deref()),
            level,
            destination(log_dir.as_deref())
        ));
    }
    Ok(())
}

/// Returns `(level, log_dir)` when logging is active.
pub fn logging_status() -> Option<(LevelFilter, Option<PathBuf>)> {
    LOGGING_STATE
        .get()
        .map(|state| (state.level, state.log_dir.clone()))
}

/// `debug` for debug builds, `info` for release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start_logger(level: LevelFilter, log_dir: Option<&Path>) -> Result<LoggerHandle, String> {
    let logger = Logger::with(LogSpecification::builder().default(level).build());

    let logger = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|err| {
                format!("failed to create log directory `{}`: {err}", dir.display())
            })?;
            logger
                .log_to_file(FileSpec::default().directory(dir).basename(LOG_FILE_BASENAME))
                .rotate(
                    Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
                    Naming::Numbers,
                    Cleanup::KeepLogFiles(MAX_LOG_FILES),
                )
                .write_mode(WriteMode::BufferAndFlush)
                .append()
                .format_for_files(flexi_logger::detailed_format)
        }
        None => logger
            .log_to_stderr()
            .format_for_stderr(flexi_logger::detailed_format),
    };

    logger
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))
}

fn destination(log_dir: Option<&Path>) -> String {
    log_dir.map_or_else(|| "stderr".to_string(), |dir| dir.display().to_string())
}

/// Accepts the `log` level names case-insensitively; `off` is refused.
fn parse_level(raw: &str) -> Result<LevelFilter, String> {
    match LevelFilter::from_str(raw.trim()) {
        Ok(LevelFilter::Off) | Err(_) => Err(format!(
            "unsupported log level `{}`; expected trace|debug|info|warn|error",
            raw.trim()
        )),
        Ok(level) => Ok(level),
    }
}

fn resolve_log_dir(raw: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(raw.trim());
    if path.as_os_str().is_empty() || !path.is_absolute() {
        return Err(format!("LOG_DIR must be an absolute path, got `{raw}`"));
    }
    Ok(path)
}

fn install_panic_hook() {
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map_or_else(|| "unknown".to_string(), |loc| format!("{}:{}", loc.file(), loc.line()));
        error!(
            "event=panic_captured module=core status=error location={} message={}",
            location,
            panic_message(panic_info.payload())
        );
        previous_hook(panic_info);
    }));
}

/// Panic payloads may echo request data: keep one capped line.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    let text = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    one_line(text, MAX_PANIC_MESSAGE_CHARS)
}

fn one_line(text: &str, max_chars: usize) -> String {
    let mut line: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(max_chars)
        .collect();
    if text.chars().nth(max_chars).is_some() {
        line.push_str("...");
    }
    line
}

//! Process-wide logging bootstrap.
//!
//! Library code only uses the `log` macros; the binary calls [`init_logging`]
//! once, which routes everything to stderr through `flexi_logger`.
//! Initialization is idempotent for the same level and never panics.

use flexi_logger::{LogSpecification, Logger, LoggerHandle};
use log::info;
use once_cell::sync::OnceCell;

pub const DEFAULT_LOG_LEVEL: &str = "info";
const SUPPORTED_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();

struct LoggingState {
    level: String,
    _logger: LoggerHandle,
}

/// Level to use when the caller gave none: `TEXTPIPE_LOG`, then the default.
pub fn resolve_level(explicit: Option<&str>) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var("TEXTPIPE_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

/// Accepts a bare level (`warn`) or a module spec such as `textpipe=debug,rayon=warn`.
pub fn normalize_level(level: &str) -> Result<String, String> {
    let trimmed = level.trim();
    if trimmed.contains('=') {
        return LogSpecification::parse(trimmed)
            .map(|_| trimmed.to_string())
            .map_err(|err| format!("invalid log spec `{}`: {}", level, err));
    }

    let normalized = trimmed.to_ascii_lowercase();
    if SUPPORTED_LEVELS.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(format!(
            "unsupported log level `{}`; expected one of {} or a module spec",
            level,
            SUPPORTED_LEVELS.join(", ")
        ))
    }
}

/// Starts stderr logging at `level`.
///
/// Repeating the call with the same level is a no-op; a different level is rejected.
pub fn init_logging(level: &str) -> Result<(), String> {
    let level = normalize_level(level)?;

    if let Some(state) = LOGGING_STATE.get() {
        if state.level == level {
            return Ok(());
        }
        return Err(format!(
            "logging already initialized with level `{}`; refusing to switch to `{}`",
            state.level, level
        ));
    }

    let init_level = level.clone();
    let state = LOGGING_STATE.get_or_try_init(|| -> Result<LoggingState, String> {
        let logger = Logger::try_with_str(&init_level)
            .map_err(|err| format!("invalid log level `{init_level}`: {err}"))?
            .log_to_stderr()
            .format_for_stderr(flexi_logger::detailed_format)
            .start()
            .map_err(|err| format!("failed to start logger: {err}"))?;

        info!(
            "event=app_start level={} version={}",
            init_level,
            env!("CARGO_PKG_VERSION")
        );

        Ok(LoggingState {
            level: init_level,
            _logger: logger,
        })
    })?;

    if state.level == level {
        Ok(())
    } else {
        Err(format!(
            "logging already initialized with level `{}`; refusing to switch to `{}`",
            state.level, level
        ))
    }
}

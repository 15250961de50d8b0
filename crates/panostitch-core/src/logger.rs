//! Stderr logger for the stitching pipeline.
//!
//! Lines look like `[  1.234s  INFO panostitch_blend::engine] message`. The
//! module target is kept because stage boundaries are easiest to follow by
//! crate. Use [`init_with_level`] once at startup, or [`init_from_env`] to take
//! the level from `PANOSTITCH_LOG`.

use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable read by [`init_from_env`].
pub const LOG_ENV_VAR: &str = "PANOSTITCH_LOG";

struct StageLogger {
    level: LevelFilter,
    started: Instant,
}

impl Log for StageLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:8.3}s {:>5} {}] {}",
            elapsed,
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StageLogger> = OnceLock::new();

/// Install the stderr logger with the provided level filter.
///
/// Repeated calls are no-ops after the first successful initialization.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| StageLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Parse a level name such as `debug` or `off`, falling back to `fallback`.
pub fn parse_level(value: Option<&str>, fallback: LevelFilter) -> LevelFilter {
    value
        .and_then(|v| LevelFilter::from_str(v.trim()).ok())
        .unwrap_or(fallback)
}

/// Install the logger using the level named by `PANOSTITCH_LOG` (default `info`).
pub fn init_from_env() -> Result<(), log::SetLoggerError> {
    let value = std::env::var(LOG_ENV_VAR).ok();
    init_with_level(parse_level(value.as_deref(), LevelFilter::Info))
}

/// Filter for [`init_tracing`]: `directives` when they parse, else
/// `PANOSTITCH_LOG`, then `RUST_LOG`, then `info`.
#[cfg(feature = "tracing")]
pub fn tracing_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d.trim()).ok())
        .or_else(|| EnvFilter::try_from_env(LOG_ENV_VAR).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Install a `tracing` subscriber; span close events carry stage timings.
///
/// `directives` (e.g. `debug` or `panostitch_blend=trace`) take precedence
/// over the environment.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool, directives: Option<&str>) {
    let filter = tracing_filter(directives);
    if json {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .flatten_event(true)
            .finish()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_parse_case_insensitively() {
        assert_eq!(parse_level(Some("DEBUG"), LevelFilter::Info), LevelFilter::Debug);
        assert_eq!(parse_level(Some(" warn "), LevelFilter::Info), LevelFilter::Warn);
        assert_eq!(parse_level(Some("off"), LevelFilter::Info), LevelFilter::Off);
    }

    #[test]
    fn unknown_or_missing_levels_fall_back() {
        assert_eq!(parse_level(Some("loud"), LevelFilter::Info), LevelFilter::Info);
        assert_eq!(parse_level(None, LevelFilter::Error), LevelFilter::Error);
    }

    #[cfg(feature = "tracing")]
    #[test]
    fn explicit_directives_win_over_the_environment() {
        use tracing_subscriber::filter::LevelFilter as TraceLevel;

        assert_eq!(tracing_filter(Some("debug")).max_level_hint(), Some(TraceLevel::DEBUG));
        assert_eq!(tracing_filter(Some(" warn ")).max_level_hint(), Some(TraceLevel::WARN));
        assert_eq!(tracing_filter(Some("off")).max_level_hint(), Some(TraceLevel::OFF));
    }
}

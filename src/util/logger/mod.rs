//! Logger module for tsrepl
//!
//! `[LEVEL] message` lines on stderr, so log output never interleaves with
//! what the REPL prints on stdout. The level comes from the caller, or from
//! `TSREPL_LOG` for [`init_from_env`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use tsrepl::util::logger;
//!
//! logger::init();
//! tracing::info!("Hello, {}", "world");
//! ```

use std::str::FromStr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

/// Environment variable overriding the session log level
pub const LOG_ENV: &str = "TSREPL_LOG";

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level `{other}`")),
        }
    }
}

/// Initialize logger with default configuration (INFO level)
pub fn init() {
    init_with_level(LogLevel::Info);
}

/// Initialize logger with custom level
pub fn init_with_level(level: LogLevel) {
    let filter = tracing_subscriber::filter::LevelFilter::from_level(level.into());

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .with_level(true)
        .with_ansi(false)
        .compact()
        .with_filter(filter);

    // An embedding application may have installed its own subscriber
    let _ = Registry::default().with(layer).try_init();
}

/// Initialize logger for CLI use (WARN level keeps the prompt clean)
pub fn init_cli() {
    init_with_level(LogLevel::Warn);
}

/// Initialize logger for debug use (DEBUG level)
pub fn init_debug() {
    init_with_level(LogLevel::Debug);
}

/// Initialize logger from `TSREPL_LOG`, falling back to `default`
pub fn init_from_env(default: LogLevel) {
    init_with_level(level_from(std::env::var(LOG_ENV).ok().as_deref(), default));
}

fn level_from(
    value: Option<&str>,
    default: LogLevel,
) -> LogLevel {
    match value.map(str::parse::<LogLevel>) {
        Some(Ok(level)) => level,
        Some(Err(message)) => {
            eprintln!("[WARN] {LOG_ENV}: {message}");
            default
        }
        None => default,
    }
}

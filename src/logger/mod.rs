//! Logger module
//!
//! A logging system based on `tracing-subscriber` with support for:
//! - Console output with color control
//! - File output via `tracing-appender` daily-rolling non-blocking writers
//! - Full, compact, and JSON formats

pub mod config;

pub use self::config::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig};

use std::io::IsTerminal;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Keeps the non-blocking file writer alive for the life of the process.
///
/// Dropping the handle flushes and stops the background writer thread, so
/// `main` must hold it until exit.
pub struct LoggerHandle {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the global logger with the given configuration.
pub fn init_logger(config: LoggerConfig) -> anyhow::Result<LoggerHandle> {
    if !config.console.enabled && !config.file.enabled {
        anyhow::bail!("At least one log output (console or file) must be enabled");
    }

    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    let mut file_guard = None;

    if config.console.enabled {
        let use_ansi = config.console.colored && std::io::stdout().is_terminal();
        let layer = fmt::layer()
            .with_ansi(use_ansi)
            .with_target(true)
            .with_level(true);

        layers.push(match config.console.format {
            LogFormat::Full => layer.boxed(),
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Json => layer.json().boxed(),
        });
    }

    if config.file.enabled {
        let appender =
            tracing_appender::rolling::daily(&config.file.directory, &config.file.prefix);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);

        let layer = fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(writer);

        layers.push(match config.file.format {
            LogFormat::Full => layer.boxed(),
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Json => layer.json().boxed(),
        });
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .init();

    Ok(LoggerHandle {
        _file_guard: file_guard,
    })
}

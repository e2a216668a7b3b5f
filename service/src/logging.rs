//! Terminal logging for the hub process.

use crate::config::Config;
use log::{LevelFilter, SetLoggerError};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

/// HTTP and WebSocket plumbing whose records drown out connection events below Trace.
const NOISY_DEPENDENCIES: &[&str] = &["tower", "tracing", "hyper", "axum", "tungstenite"];

pub struct Logger {}

impl Logger {
    /// Installs the global terminal logger at `config.log_level_filter`.
    ///
    /// Fails when a global logger is already installed.
    pub fn init_logger(config: &Config) -> Result<(), SetLoggerError> {
        let level = config.log_level_filter;
        TermLogger::init(
            level,
            Self::log_config(level),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        )
    }

    fn log_config(level: LevelFilter) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();
        for module in Self::muted_modules(level).iter().copied() {
            builder.add_filter_ignore_str(module);
        }
        builder.build()
    }

    /// Dependencies muted at `level`. Trace shows everything.
    fn muted_modules(level: LevelFilter) -> &'static [&'static str] {
        match level {
            LevelFilter::Trace => &[],
            _ => NOISY_DEPENDENCIES,
        }
    }
}

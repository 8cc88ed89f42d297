//! `tracing` subscriber setup for the `bfdr` binary.
//!
//! Logs go to stderr so CSV written to stdout stays clean. `RUST_LOG`, when
//! set, replaces the level chosen from `-v`.

use clap::ValueEnum;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
}

impl LogConfig {
    /// 0 → info, 1 → debug, 2+ → trace.
    pub fn from_verbosity(verbosity: u8, format: LogFormat) -> Self {
        let level = match verbosity {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self { level, format }
    }
}

pub fn init_logging(config: &LogConfig) {
    let filter = build_env_filter(config.level);
    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .without_time(),
            )
            .init(),
    }
}

fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Dependencies stay at warn.
        EnvFilter::new(format!(
            "warn,bfdr={level},bfdr_core={level},bfdr_fhir={level},bfdr_collect={level}",
            level = level.as_str().to_lowercase()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_level() {
        assert_eq!(LogConfig::from_verbosity(0, LogFormat::Pretty).level, Level::INFO);
        assert_eq!(LogConfig::from_verbosity(1, LogFormat::Pretty).level, Level::DEBUG);
        assert_eq!(LogConfig::from_verbosity(5, LogFormat::Json).level, Level::TRACE);
    }
}

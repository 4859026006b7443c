//! `tracing` subscriber setup for the `warden` binary.
//!
//! Level comes from `--log-level`, else `WARDEN_LOG_LEVEL`, else `info`.
//! `--log-json` or `WARDEN_LOG_JSON=true` switches to JSON lines. `RUST_LOG`
//! directives still apply on top.

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

const WARDEN_CRATES: [&str; 8] = [
    "warden", "common", "anatomist", "oracle", "gauntlet", "shadow", "lazarus", "reaper",
];

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub use_json: bool,
    /// Include the module target (e.g. `reaper::pipeline`).
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
        }
    }
}

impl LoggingConfig {
    /// Merges command-line flags with the `WARDEN_LOG_*` environment.
    pub fn resolve(level_flag: Option<&str>, json_flag: bool) -> Self {
        let level = level_flag
            .map(str::to_string)
            .or_else(|| env::var("WARDEN_LOG_LEVEL").ok())
            .map(|l| parse_level(&l))
            .unwrap_or(Level::INFO);
        let use_json = json_flag
            || env::var("WARDEN_LOG_JSON")
                .ok()
                .and_then(|v| v.parse::<bool>().ok())
                .unwrap_or(false);
        Self {
            level,
            use_json,
            ..Default::default()
        }
    }
}

/// Case-insensitive; anything unknown falls back to `INFO`.
pub fn parse_level(level_str: &str) -> Level {
    match level_str.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

fn build_filter(level: Level) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env();
    for krate in WARDEN_CRATES {
        if let Ok(directive) = format!("{krate}={level}").parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

/// Installs the global subscriber. Later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level);
        // stdout is reserved for command summaries.
        if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target),
                )
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(config.include_target),
                )
                .init();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("Debug"), Level::DEBUG);
        assert_eq!(parse_level("WARN"), Level::WARN);
        assert_eq!(parse_level("warning"), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level("loud"), Level::INFO);
    }

    #[test]
    fn test_flags_win_over_defaults() {
        let config = LoggingConfig::resolve(Some("debug"), true);
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.use_json);
        assert!(config.include_target);
    }

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.use_json);
    }
}

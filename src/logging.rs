//! Tracing subscriber setup. Logs go to stderr so stdout stays machine
//! readable for `--format json` and `batch` output.

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Used when `RUST_LOG` is unset.
    pub level: Level,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            include_target: false,
        }
    }
}

impl LoggingConfig {
    /// Maps the CLI `-v` count onto a level: warn, info, debug, trace.
    pub fn from_verbosity(verbose: u8) -> Self {
        let level = match verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };
        Self {
            level,
            include_target: verbose >= 2,
        }
    }
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_ascii_lowercase()));
        let result = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(config.include_target)
            .with_writer(std::io::stderr)
            .try_init();
        if let Err(err) = result {
            eprintln!("mcpscan: Warning: logging already initialized: {err}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(LoggingConfig::from_verbosity(0).level, Level::WARN);
        assert_eq!(LoggingConfig::from_verbosity(1).level, Level::INFO);
        assert_eq!(LoggingConfig::from_verbosity(2).level, Level::DEBUG);
        assert_eq!(LoggingConfig::from_verbosity(9).level, Level::TRACE);
        assert!(!LoggingConfig::default().include_target);
    }

    #[test]
    fn init_is_idempotent() {
        init_logging(LoggingConfig::default());
        init_logging(LoggingConfig::from_verbosity(3));
    }
}

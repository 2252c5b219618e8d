// Configuration module for mcpscan
// Reads from environment variables with sensible defaults

use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Hard limit for one repository clone in seconds (MCPSCAN_CLONE_TIMEOUT_SECS)
    pub clone_timeout_secs: u64,

    /// Batch worker threads (MCPSCAN_WORKERS)
    pub workers: usize,

    /// Files larger than this are not scanned (MCPSCAN_MAX_FILE_BYTES)
    pub max_file_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clone_timeout_secs: 180,
            workers: 4,
            max_file_bytes: 2 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let mut config = Config::default();
        override_from_env("MCPSCAN_CLONE_TIMEOUT_SECS", &mut config.clone_timeout_secs);
        override_from_env("MCPSCAN_WORKERS", &mut config.workers);
        override_from_env("MCPSCAN_MAX_FILE_BYTES", &mut config.max_file_bytes);
        if config.workers == 0 {
            eprintln!("mcpscan: Warning: MCPSCAN_WORKERS must be at least 1, using 1");
            config.workers = 1;
        }
        config
    }

    /// Get the global configuration instance
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::from_env)
    }

    pub fn clone_timeout(&self) -> Duration {
        Duration::from_secs(self.clone_timeout_secs)
    }
}

fn override_from_env<T>(key: &str, slot: &mut T)
where
    T: FromStr + std::fmt::Display,
{
    if let Ok(val) = env::var(key) {
        apply_value(key, &val, slot);
    }
}

fn apply_value<T>(key: &str, val: &str, slot: &mut T)
where
    T: FromStr + std::fmt::Display,
{
    if let Ok(parsed) = val.trim().parse() {
        *slot = parsed;
    } else {
        eprintln!(
            "mcpscan: Warning: Invalid {} value: {}, using default: {}",
            key, val, slot
        );
    }
}

//! Store configuration from the environment and command-line flags.

use std::time::Duration;

use courier_application::StoreConfig;

/// Environment variable overriding the debounce window, in milliseconds.
pub const DEBOUNCE_ENV: &str = "COURIER_DEBOUNCE_MS";

/// Environment variable overriding the self-write settle window, in
/// milliseconds.
pub const SETTLE_ENV: &str = "COURIER_SETTLE_MS";

/// A configuration value that could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("{key} must be a number of milliseconds, got {value:?}")]
pub struct ConfigError {
    /// Variable name.
    pub key: &'static str,
    /// Offending value.
    pub value: String,
}

/// Builds the store configuration.
///
/// Flags win over environment variables, which win over the defaults.
///
/// # Errors
///
/// Returns an error if an environment variable is not a number.
pub fn store_config(
    lookup: impl Fn(&str) -> Option<String>,
    debounce_ms: Option<u64>,
    settle_ms: Option<u64>,
) -> Result<StoreConfig, ConfigError> {
    let mut config = StoreConfig::default();

    let debounce = debounce_ms.map_or_else(|| millis(&lookup, DEBOUNCE_ENV), |ms| Ok(Some(ms)))?;
    if let Some(ms) = debounce {
        config = config.with_debounce(Duration::from_millis(ms));
    }
    if let Some(ms) = settle_ms.map_or_else(|| millis(&lookup, SETTLE_ENV), |ms| Ok(Some(ms)))? {
        config = config.with_settle_window(Duration::from_millis(ms));
    }

    Ok(config)
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u64>, ConfigError> {
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError { key, value })
        })
        .transpose()
}

//! Tunables for the mock keys client.

use std::collections::HashMap;
use std::time::Duration;

use super::error::{MockKeysError, Result};

const DEFAULT_FEED_SCAN_INTERVAL: Duration = Duration::from_micros(500);

const ENV_FEED_SCAN_INTERVAL_MICROS: &str = "COORDKV_MOCK_FEED_SCAN_INTERVAL_MICROS";
const ENV_FEED_MODE: &str = "COORDKV_MOCK_FEED_MODE";

/// How a change feed treats read expectations it has already published.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedMode {
    /// Publish every read expectation at most once.
    #[default]
    Drain,
    /// Publish every outstanding read expectation on every scan, until it is consumed.
    LevelTriggered,
}

impl std::str::FromStr for FeedMode {
    type Err = MockKeysError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "drain" => Ok(FeedMode::Drain),
            "level" | "level-triggered" => Ok(FeedMode::LevelTriggered),
            other => Err(MockKeysError::Config(format!(
                "unknown feed mode {other:?}, expected \"drain\" or \"level\""
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockConfig {
    /// How often a change feed rescans the read expectations.
    pub feed_scan_interval: Duration,
    pub feed_mode: FeedMode,
}

impl Default for MockConfig {
    fn default() -> Self {
        MockConfig {
            feed_scan_interval: DEFAULT_FEED_SCAN_INTERVAL,
            feed_mode: FeedMode::default(),
        }
    }
}

impl MockConfig {
    pub fn with_feed_scan_interval(mut self, interval: Duration) -> Self {
        self.feed_scan_interval = interval;
        self
    }

    pub fn with_feed_mode(mut self, mode: FeedMode) -> Self {
        self.feed_mode = mode;
        self
    }

    /// Build a config from environment variables, falling back to the defaults for
    /// anything unset. Typically called with `std::env::vars()`.
    pub fn load(
        env_vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Result<Self> {
        let env_vars: HashMap<String, String> = env_vars
            .into_iter()
            .map(|(key, val)| (key.into(), val.into()))
            .filter(|(key, _val)| {
                [ENV_FEED_SCAN_INTERVAL_MICROS, ENV_FEED_MODE].contains(&key.as_str())
            })
            .collect();

        let mut config = MockConfig::default();

        if let Some(micros) = env_vars.get(ENV_FEED_SCAN_INTERVAL_MICROS) {
            let micros: u64 = micros.trim().parse().map_err(|e| {
                MockKeysError::Config(format!(
                    "Environment variable {ENV_FEED_SCAN_INTERVAL_MICROS} is not a number: {e}"
                ))
            })?;
            if micros == 0 {
                return Err(MockKeysError::Config(format!(
                    "Environment variable {ENV_FEED_SCAN_INTERVAL_MICROS} must be greater than zero"
                )));
            }
            config.feed_scan_interval = Duration::from_micros(micros);
        }

        if let Some(mode) = env_vars.get(ENV_FEED_MODE) {
            config.feed_mode = mode.parse()?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MockConfig::default();
        assert_eq!(config.feed_scan_interval, Duration::from_micros(500));
        assert_eq!(config.feed_mode, FeedMode::Drain);
    }

    #[test]
    fn test_load_from_env() {
        let env_vars = [
            (ENV_FEED_SCAN_INTERVAL_MICROS, "2000"),
            (ENV_FEED_MODE, "level"),
            ("UNRELATED", "ignored"),
        ];
        let config = MockConfig::load(env_vars).unwrap();
        assert_eq!(config.feed_scan_interval, Duration::from_millis(2));
        assert_eq!(config.feed_mode, FeedMode::LevelTriggered);
    }

    #[test]
    fn test_load_empty_env_uses_defaults() {
        let env_vars: Vec<(String, String)> = Vec::new();
        assert_eq!(MockConfig::load(env_vars).unwrap(), MockConfig::default());
    }

    #[test]
    fn test_load_rejects_bad_values() {
        let result = MockConfig::load([(ENV_FEED_SCAN_INTERVAL_MICROS, "soon")]);
        assert!(matches!(result, Err(MockKeysError::Config(_))));

        let result = MockConfig::load([(ENV_FEED_SCAN_INTERVAL_MICROS, "0")]);
        assert!(matches!(result, Err(MockKeysError::Config(_))));

        let result = MockConfig::load([(ENV_FEED_MODE, "sometimes")]);
        assert!(matches!(result, Err(MockKeysError::Config(_))));
    }

    #[test]
    fn test_builder_setters() {
        let config = MockConfig::default()
            .with_feed_scan_interval(Duration::from_millis(5))
            .with_feed_mode(FeedMode::LevelTriggered);
        assert_eq!(config.feed_scan_interval, Duration::from_millis(5));
        assert_eq!(config.feed_mode, FeedMode::LevelTriggered);
    }
}

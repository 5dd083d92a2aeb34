//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config.toml
//! structure. Validation failures here are fatal: a misconfigured engine
//! must refuse to start rather than trade on unstable thresholds.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use chrono::NaiveTime;

use crate::domain::state_machine::{ThresholdError, Thresholds};
use crate::engine::coordinator::FailureRetry;
use crate::engine::cycle::PairSettings;

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub pair: PairSection,
    pub engine: EngineSection,
    pub replay: ReplaySection,
    pub account: AccountSection,
    #[serde(default)]
    pub ledger: LedgerSection,
    pub logging: LoggingSection,
}

/// Pair configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct PairSection {
    /// Leg A instrument symbol
    pub symbol_a: String,
    /// Leg B instrument symbol
    pub symbol_b: String,
    /// Leg-B shares per leg-A share; fixed, never re-estimated by the engine
    pub hedge_ratio: f64,
    /// Days of spread history behind the Z-score
    pub lookback_period: usize,
    /// Z-score magnitude that opens a position
    pub entry_threshold: f64,
    /// Z-score magnitude that closes it (must be below entry_threshold)
    pub exit_threshold: f64,
    /// Hard cap on leg-A shares
    pub max_position_size: u64,
}

/// Engine configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Only the designated coordinator instance acts on daily triggers
    pub coordinator: bool,
    /// What a collaborator failure means for the rest of the day
    #[serde(default)]
    pub retry_after_failure: FailureRetry,
    /// Wall-clock time (UTC, HH:MM) the daily trigger fires in run mode
    pub fire_time: String,
}

/// Replay feed configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct ReplaySection {
    /// JSONL dump of daily closes per symbol
    pub dump_file: String,
    /// Simulated fill slippage applied by the paper gateway
    #[serde(default)]
    pub slippage_bps: u32,
}

/// Account configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct AccountSection {
    /// Buying power reported by the simulated account
    pub paper_buying_power: f64,
}

/// Ledger configuration section (optional)
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSection {
    /// Completed round trips append here; empty disables the ledger
    #[serde(default)]
    pub path: String,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            path: "data/trades.csv".to_string(),
        }
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error(transparent)]
    Thresholds(#[from] ThresholdError),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pair.symbol_a.is_empty() || self.pair.symbol_b.is_empty() {
            return Err(ConfigError::ValidationError(
                "both leg symbols must be set".to_string(),
            ));
        }

        if self.pair.symbol_a == self.pair.symbol_b {
            return Err(ConfigError::ValidationError(format!(
                "legs must differ, got {} for both",
                self.pair.symbol_a
            )));
        }

        if self.pair.hedge_ratio <= 0.0 || !self.pair.hedge_ratio.is_finite() {
            return Err(ConfigError::ValidationError(format!(
                "hedge_ratio must be a positive real, got {}",
                self.pair.hedge_ratio
            )));
        }

        // Sample deviation divides by n - 1
        if self.pair.lookback_period < 2 {
            return Err(ConfigError::ValidationError(format!(
                "lookback_period must be >= 2, got {}",
                self.pair.lookback_period
            )));
        }

        if self.pair.max_position_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_position_size must be > 0".to_string(),
            ));
        }

        // entry > exit >= 0; the thresholds type owns the check
        Thresholds::new(self.pair.entry_threshold, self.pair.exit_threshold)?;

        self.fire_time()?;

        if self.replay.dump_file.is_empty() {
            return Err(ConfigError::ValidationError(
                "dump_file cannot be empty".to_string(),
            ));
        }

        if self.account.paper_buying_power < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "paper_buying_power must be non-negative, got {}",
                self.account.paper_buying_power
            )));
        }

        Ok(())
    }

    /// Parsed daily fire time (UTC)
    pub fn fire_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(&self.engine.fire_time, "%H:%M").map_err(|e| {
            ConfigError::ValidationError(format!(
                "fire_time must be HH:MM, got '{}': {}",
                self.engine.fire_time, e
            ))
        })
    }

    /// Thresholds are pre-validated; this re-derives the typed form.
    pub fn thresholds(&self) -> Result<Thresholds, ConfigError> {
        Ok(Thresholds::new(
            self.pair.entry_threshold,
            self.pair.exit_threshold,
        )?)
    }
}

// Conversion from Config to the engine's pair settings
impl TryFrom<&Config> for PairSettings {
    type Error = ConfigError;

    fn try_from(config: &Config) -> Result<Self, Self::Error> {
        Ok(PairSettings {
            symbol_a: config.pair.symbol_a.clone(),
            symbol_b: config.pair.symbol_b.clone(),
            hedge_ratio: config.pair.hedge_ratio,
            lookback: config.pair.lookback_period,
            thresholds: config.thresholds()?,
            max_position_size: config.pair.max_position_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> String {
        r#"
[pair]
symbol_a = "UMAC"
symbol_b = "RCAT"
hedge_ratio = 1.389508
lookback_period = 20
entry_threshold = 1.4
exit_threshold = 0.2
max_position_size = 1000

[engine]
coordinator = true
retry_after_failure = "next-day"
fire_time = "19:59"

[replay]
dump_file = "data/bars.jsonl"
slippage_bps = 5

[account]
paper_buying_power = 100000.0

[ledger]
path = "data/trades.csv"

[logging]
level = "info"
"#
        .to_string()
    }

    fn load_from_str(contents: &str) -> Result<Config, ConfigError> {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        load_config(file.path())
    }

    #[test]
    fn test_load_valid_config() {
        let config = load_from_str(&create_valid_config()).unwrap();

        assert_eq!(config.pair.symbol_a, "UMAC");
        assert_eq!(config.pair.lookback_period, 20);
        assert_eq!(config.pair.entry_threshold, 1.4);
        assert!(config.engine.coordinator);
        assert_eq!(config.engine.retry_after_failure, FailureRetry::NextDay);
        assert_eq!(
            config.fire_time().unwrap(),
            NaiveTime::from_hms_opt(19, 59, 0).unwrap()
        );
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/path/config.toml");
        assert!(matches!(result.unwrap_err(), ConfigError::IoError(_)));
    }

    #[test]
    fn test_entry_must_exceed_exit() {
        let contents = create_valid_config().replace("entry_threshold = 1.4", "entry_threshold = 0.1");
        let result = load_from_str(&contents);
        assert!(matches!(result.unwrap_err(), ConfigError::Thresholds(_)));
    }

    #[test]
    fn test_negative_exit_threshold_rejected() {
        let contents = create_valid_config().replace("exit_threshold = 0.2", "exit_threshold = -0.2");
        assert!(load_from_str(&contents).is_err());
    }

    #[test]
    fn test_non_positive_hedge_ratio_rejected() {
        let contents = create_valid_config().replace("hedge_ratio = 1.389508", "hedge_ratio = 0.0");
        let result = load_from_str(&contents);
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_zero_max_position_rejected() {
        let contents =
            create_valid_config().replace("max_position_size = 1000", "max_position_size = 0");
        let result = load_from_str(&contents);
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_identical_legs_rejected() {
        let contents = create_valid_config().replace("symbol_b = \"RCAT\"", "symbol_b = \"UMAC\"");
        let result = load_from_str(&contents);
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_bad_fire_time_rejected() {
        let contents = create_valid_config().replace("fire_time = \"19:59\"", "fire_time = \"7pm\"");
        let result = load_from_str(&contents);
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_retry_policy_defaults_to_next_day() {
        let contents = create_valid_config().replace("retry_after_failure = \"next-day\"\n", "");
        let config = load_from_str(&contents).unwrap();
        assert_eq!(config.engine.retry_after_failure, FailureRetry::NextDay);
    }

    #[test]
    fn test_same_day_retry_parses() {
        let contents = create_valid_config()
            .replace("retry_after_failure = \"next-day\"", "retry_after_failure = \"same-day\"");
        let config = load_from_str(&contents).unwrap();
        assert_eq!(config.engine.retry_after_failure, FailureRetry::SameDay);
    }

    #[test]
    fn test_config_to_pair_settings() {
        let config = load_from_str(&create_valid_config()).unwrap();
        let settings = PairSettings::try_from(&config).unwrap();

        assert_eq!(settings.symbol_a, "UMAC");
        assert_eq!(settings.symbol_b, "RCAT");
        assert_eq!(settings.hedge_ratio, 1.389508);
        assert_eq!(settings.lookback, 20);
        assert_eq!(settings.thresholds.entry(), 1.4);
        assert_eq!(settings.thresholds.exit(), 0.2);
        assert_eq!(settings.max_position_size, 1000);
    }
}

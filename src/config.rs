use serde::Deserialize;

use std::fmt;
use std::path::PathBuf;

const ENV_PREFIX: &str = "CYCLE_BOXES";

#[derive(Debug)]
pub enum ConfigError {
    FilePathIntoString,
    SettingsInit(String),
    Deserialize(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FilePathIntoString => write!(f, "config path is not valid UTF-8"),
            ConfigError::SettingsInit(err) => write!(f, "failed to read settings: {err}"),
            ConfigError::Deserialize(err) => write!(f, "failed to deserialize settings: {err}"),
            ConfigError::Invalid(err) => write!(f, "invalid settings: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Bear-market scan: trough -> rally -> breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct BearConfig {
    /// Minimum rise (in rate points) from a low that defines a box.
    pub rise_threshold: f64,

    /// Percentage below the box low that closes the box.
    pub break_threshold: f64,

    pub min_duration_days: i64,

    /// Rows scanned after the box low before the box is force-closed.
    /// Also the last `days_since_peak` kept by the series filter.
    pub max_duration_days: usize,

    /// A new low must sit at least this far under the previous box peak.
    pub min_drop_from_prev_high: f64,

    /// Cycles with fewer rows (after filtering) produce no boxes.
    pub min_series_len: usize,
}

impl Default for BearConfig {
    fn default() -> Self {
        Self {
            rise_threshold: 5.0,
            break_threshold: 2.0,
            min_duration_days: 1,
            max_duration_days: 420,
            min_drop_from_prev_high: 3.0,
            min_series_len: 50,
        }
    }
}

/// Bull-market scan: peak -> pullback -> breakout.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct BullConfig {
    /// Minimum drop (in rate points) from a significant high that defines a box.
    pub drop_threshold: f64,

    /// Percentage above the box high that closes the box.
    pub break_threshold: f64,

    pub min_duration_days: i64,

    /// Half-width of the window a high must dominate to count as significant.
    pub lookback_days: usize,

    /// First `days_since_peak` kept by the series filter.
    pub min_days_from_peak: i64,

    pub min_series_len: usize,
}

impl Default for BullConfig {
    fn default() -> Self {
        Self {
            drop_threshold: 5.0,
            break_threshold: 2.0,
            min_duration_days: 1,
            lookback_days: 10,
            min_days_from_peak: 420,
            min_series_len: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Long-format cycle CSV (cycle_number,days_since_peak,timestamp,close_rate,low_rate,high_rate)
    pub input: PathBuf,

    /// Directory receiving box tables and chart annotations
    pub output_dir: PathBuf,

    pub bear: BearConfig,
    pub bull: BullConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/cycles.csv"),
            output_dir: PathBuf::from("out"),
            bear: BearConfig::default(),
            bull: BullConfig::default(),
        }
    }
}

impl AppConfig {
    /// Layers the optional config file and `CYCLE_BOXES__*` environment
    /// variables over the built-in defaults.
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            let filename = path
                .into_os_string()
                .into_string()
                .map_err(|_| ConfigError::FilePathIntoString)?;
            builder = builder.add_source(config::File::with_name(&filename));
        }
        let config: AppConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|err| ConfigError::SettingsInit(err.to_string()))?
            .try_deserialize()
            .map_err(|err| ConfigError::Deserialize(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let move_thresholds = [
            ("bear.rise_threshold", self.bear.rise_threshold),
            ("bull.drop_threshold", self.bull.drop_threshold),
        ];
        for (name, value) in move_thresholds {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        let thresholds = [
            ("bear.rise_threshold", self.bear.rise_threshold),
            ("bear.break_threshold", self.bear.break_threshold),
            ("bear.min_drop_from_prev_high", self.bear.min_drop_from_prev_high),
            ("bull.drop_threshold", self.bull.drop_threshold),
            ("bull.break_threshold", self.bull.break_threshold),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.bear.max_duration_days == 0 {
            return Err(ConfigError::Invalid(
                "bear.max_duration_days must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    #[test]
    fn test_defaults_match_reference_thresholds() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.bear.rise_threshold, 5.0);
        assert_eq!(cfg.bear.max_duration_days, 420);
        assert_eq!(cfg.bear.min_series_len, 50);
        assert_eq!(cfg.bull.lookback_days, 10);
        assert_eq!(cfg.bull.min_days_from_peak, 420);
        assert_eq!(cfg.bull.min_series_len, 20);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_threshold() {
        let mut cfg = AppConfig::default();
        cfg.bull.drop_threshold = -1.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_zero_move_threshold() {
        let mut cfg = AppConfig::default();
        cfg.bear.rise_threshold = 0.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        let mut cfg = AppConfig::default();
        cfg.bull.drop_threshold = 0.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        let mut cfg = AppConfig::default();
        cfg.bear.break_threshold = 0.0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_horizon() {
        let mut cfg = AppConfig::default();
        cfg.bear.max_duration_days = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_file_overrides_only_given_keys() {
        let dir = std::env::temp_dir().join(format!("cycle_boxes_cfg_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.toml");
        fs::write(
            &path,
            "input = \"cycles.csv\"\n\n[bear]\nrise_threshold = 7.5\n\n[bull]\nlookback_days = 5\n",
        )
        .unwrap();

        let cfg = AppConfig::load(Some(path)).unwrap();
        assert_eq!(cfg.input, PathBuf::from("cycles.csv"));
        assert_eq!(cfg.bear.rise_threshold, 7.5);
        assert_eq!(cfg.bear.break_threshold, 2.0);
        assert_eq!(cfg.bull.lookback_days, 5);
        assert_eq!(cfg.bull.drop_threshold, 5.0);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_missing_file_is_settings_error() {
        let path = PathBuf::from("/definitely/not/here/settings.toml");
        assert!(matches!(
            AppConfig::load(Some(path)),
            Err(ConfigError::SettingsInit(_))
        ));
    }
}

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::Timestamp;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraderConfig {
    /// Width of every sliding window, in seconds.
    pub window_width: Timestamp,
    pub good_rate_min: u32,
    pub good_rate_max: u32,
    /// Face existence at or below this share of frames is "low".
    pub low_existence: f64,
    /// REAL_TIME spans grading below this are dropped.
    pub min_real_time_grade: f64,
    /// Stand-in body ratio when no posture tick fell inside a span.
    pub default_body_ratio: f64,
    /// Pixels of mean face-center spread that map to deviation 1.0.
    pub center_deviation_scale: f64,
    pub cluster_bandwidth: f64,
    /// Pending candidates above this count are reported as a backlog.
    pub heap_warn_len: usize,
    pub tick_interval_ms: u64,
    /// JSON array of graded intervals written by the service.
    pub log_path: PathBuf,
    /// `EnvFilter` directive for `logging::init_tracing`.
    pub log_level: String,
    /// Adds a daily rolling file under `log_dir` next to stdout.
    pub file_logs: bool,
    pub log_dir: PathBuf,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            window_width: 60,
            good_rate_min: 15,
            good_rate_max: 25,
            low_existence: 0.66,
            min_real_time_grade: 0.6,
            default_body_ratio: 0.5,
            center_deviation_scale: 80.0,
            cluster_bandwidth: 30.0,
            heap_warn_len: 64,
            tick_interval_ms: 1000,
            log_path: PathBuf::from("concentration_intervals.json"),
            log_level: "info".to_string(),
            file_logs: false,
            log_dir: PathBuf::from("./logs"),
        }
    }
}

impl GraderConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            window_width: env_or("GRADER_WINDOW_WIDTH", defaults.window_width),
            good_rate_min: env_or("GRADER_GOOD_RATE_MIN", defaults.good_rate_min),
            good_rate_max: env_or("GRADER_GOOD_RATE_MAX", defaults.good_rate_max),
            low_existence: env_or("GRADER_LOW_EXISTENCE", defaults.low_existence),
            min_real_time_grade: env_or("GRADER_MIN_REAL_TIME_GRADE", defaults.min_real_time_grade),
            default_body_ratio: env_or("GRADER_DEFAULT_BODY_RATIO", defaults.default_body_ratio),
            center_deviation_scale: env_or(
                "GRADER_CENTER_DEVIATION_SCALE",
                defaults.center_deviation_scale,
            ),
            cluster_bandwidth: env_or("GRADER_CLUSTER_BANDWIDTH", defaults.cluster_bandwidth),
            heap_warn_len: env_or("GRADER_HEAP_WARN_LEN", defaults.heap_warn_len),
            tick_interval_ms: env_or("GRADER_TICK_INTERVAL_MS", defaults.tick_interval_ms),
            log_path: std::env::var("GRADER_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_path),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            file_logs: std::env::var("ENABLE_FILE_LOGS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.file_logs),
            log_dir: std::env::var("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_width <= 0 {
            return Err(ConfigError::NonPositiveWidth(self.window_width));
        }
        if self.good_rate_min > self.good_rate_max {
            return Err(ConfigError::EmptyRateRange {
                min: self.good_rate_min,
                max: self.good_rate_max,
            });
        }
        for (name, value) in [
            ("low_existence", self.low_existence),
            ("min_real_time_grade", self.min_real_time_grade),
            ("default_body_ratio", self.default_body_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::RatioOutOfRange { name, value });
            }
        }
        for (name, value) in [
            ("center_deviation_scale", self.center_deviation_scale),
            ("cluster_bandwidth", self.cluster_bandwidth),
            ("tick_interval_ms", self.tick_interval_ms as f64),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        Ok(())
    }

    pub fn good_rate_range(&self) -> RangeInclusive<u32> {
        self.good_rate_min..=self.good_rate_max
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GraderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.good_rate_range(), 15..=25);
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_rejects_inverted_rate_range() {
        let config = GraderConfig {
            good_rate_min: 30,
            good_rate_max: 20,
            ..GraderConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyRateRange { min: 30, max: 20 })
        ));
    }

    #[test]
    fn test_rejects_bad_width_and_ratios() {
        let config = GraderConfig {
            window_width: 0,
            ..GraderConfig::default()
        };
        assert!(config.validate().is_err());

        let config = GraderConfig {
            low_existence: 1.5,
            ..GraderConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RatioOutOfRange { name: "low_existence", .. })
        ));

        let config = GraderConfig {
            tick_interval_ms: 0,
            ..GraderConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: GraderConfig =
            serde_json::from_str(r#"{"good_rate_min": 12, "log_level": "debug"}"#).unwrap();
        assert_eq!(config.good_rate_min, 12);
        assert_eq!(config.good_rate_max, 25);
        assert_eq!(config.log_level, "debug");
    }
}

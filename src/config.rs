use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::PipeBurstError;
use crate::store::{Coordinate, DEFAULT_NOMINAL_PRESSURE};

pub const ENV_STORAGE_KEY: &str = "PIPE_BURST_STORAGE_KEY";
pub const ENV_THRESHOLD: &str = "PIPE_BURST_THRESHOLD_M";
pub const ENV_DEFAULT_PRESSURE: &str = "PIPE_BURST_DEFAULT_PRESSURE";
pub const ENV_DATA_DIR: &str = "PIPE_BURST_DATA_DIR";

/// Application settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Key of the persisted slot holding every line.
    pub storage_key: String,
    /// Maximum click-to-vertex distance, in meters, for a burst report to match.
    pub detection_threshold_m: f64,
    pub default_pressure: f64,
    pub map_center: Coordinate,
    pub initial_zoom: u8,
    pub data_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_key: "pipe-burst.lines".to_string(),
            detection_threshold_m: 40.0,
            default_pressure: DEFAULT_NOMINAL_PRESSURE,
            map_center: Coordinate::new(-17.6435490000631, -40.18241647057885),
            initial_zoom: 16,
            data_dir: PathBuf::from(".pipe-burst"),
        }
    }
}

impl AppConfig {
    /// Defaults overridden by any `PIPE_BURST_*` environment variables that are set.
    pub fn from_env() -> Result<Self, PipeBurstError> {
        let mut config = Self::default();

        if let Ok(key) = env::var(ENV_STORAGE_KEY) {
            config = config.with_storage_key(key);
        }
        if let Some(threshold) = parse_env::<f64>(ENV_THRESHOLD)? {
            config = config.with_detection_threshold(threshold);
        }
        if let Some(pressure) = parse_env::<f64>(ENV_DEFAULT_PRESSURE)? {
            config = config.with_default_pressure(pressure);
        }
        if let Ok(dir) = env::var(ENV_DATA_DIR) {
            config = config.with_data_dir(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Sets the persisted slot key.
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Sets the burst detection radius in meters.
    pub fn with_detection_threshold(mut self, meters: f64) -> Self {
        self.detection_threshold_m = meters;
        self
    }

    /// Sets the pressure given to lines created without one.
    pub fn with_default_pressure(mut self, pressure: f64) -> Self {
        self.default_pressure = pressure;
        self
    }

    pub fn with_map_center(mut self, center: Coordinate) -> Self {
        self.map_center = center;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn validate(&self) -> Result<(), PipeBurstError> {
        if self.storage_key.trim().is_empty() {
            return Err(PipeBurstError::Config("storage key must not be empty".into()));
        }
        if !(self.detection_threshold_m.is_finite() && self.detection_threshold_m > 0.0) {
            return Err(PipeBurstError::Config(format!(
                "detection threshold must be positive, got {}",
                self.detection_threshold_m
            )));
        }
        if !(self.default_pressure.is_finite() && self.default_pressure > 0.0) {
            return Err(PipeBurstError::Config(format!(
                "default pressure must be positive, got {}",
                self.default_pressure
            )));
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>, PipeBurstError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| PipeBurstError::Config(format!("{} has invalid value '{}'", name, raw))),
        Err(_) => Ok(None),
    }
}

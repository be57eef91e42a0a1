use crate::lot::{self, Spot, SpotSpec};
use crate::occupancy::DetectionFilter;
use crate::pricing::PricingConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8765;
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_CYCLE_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_STORE_PATH: &str = "parking_lot.db";
pub const DEFAULT_DETECTOR_SOURCE: &str = "stub";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub detector: Option<DetectorSection>,
    #[serde(default)]
    pub storage: Option<StorageSection>,
    #[serde(default)]
    pub pricing: Option<PricingSection>,
    #[serde(default)]
    pub spots: Vec<SpotSpec>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8765)
    pub port: Option<u16>,
    /// Broadcast cadence in seconds for connected subscribers (default: 1)
    pub tick_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectorSection {
    /// Detector backend: "stub" or "replay" (default: "stub")
    pub source: Option<String>,
    /// Recorded detections for the replay backend
    pub replay_path: Option<PathBuf>,
    /// Class ids accepted as vehicles (default: [0, 1])
    pub class_ids: Option<Vec<u32>>,
    /// Strict lower confidence bound (default: 0.5)
    pub min_confidence: Option<f32>,
    /// Detection cycle interval in seconds (default: 1)
    pub cycle_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSection {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingSection {
    pub base_price: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid spot configuration: {0}")]
    Lot(#[from] lot::LotConfigError),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

impl Config {
    /// Validated spot list in config order.
    pub fn spots(&self) -> Result<Vec<Spot>, ConfigError> {
        Ok(lot::build_spots(&self.spots)?)
    }

    /// Returns the server port (default: 8765)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|section| section.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    /// Broadcast cadence per subscriber (default: 1s, never zero)
    pub fn tick_interval(&self) -> Duration {
        let secs = self
            .server
            .as_ref()
            .and_then(|section| section.tick_interval_secs)
            .unwrap_or(DEFAULT_TICK_INTERVAL_SECS);
        Duration::from_secs(secs.max(1))
    }

    /// Detection cycle interval (default: 1s, never zero)
    pub fn cycle_interval(&self) -> Duration {
        let secs = self
            .detector
            .as_ref()
            .and_then(|section| section.cycle_interval_secs)
            .unwrap_or(DEFAULT_CYCLE_INTERVAL_SECS);
        Duration::from_secs(secs.max(1))
    }

    pub fn storage_path(&self) -> PathBuf {
        self.storage
            .as_ref()
            .and_then(|section| section.path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH))
    }

    pub fn detector_source(&self) -> &str {
        self.detector
            .as_ref()
            .and_then(|section| section.source.as_deref())
            .unwrap_or(DEFAULT_DETECTOR_SOURCE)
    }

    /// Replay file for the replay backend; an empty path counts as missing.
    pub fn replay_path(&self) -> Option<&Path> {
        let path = self.detector.as_ref()?.replay_path.as_deref()?;
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    }

    pub fn detection_filter(&self) -> DetectionFilter {
        let defaults = DetectionFilter::default();
        let section = self.detector.as_ref();
        DetectionFilter {
            class_ids: section
                .and_then(|section| section.class_ids.clone())
                .unwrap_or(defaults.class_ids),
            min_confidence: section
                .and_then(|section| section.min_confidence)
                .unwrap_or(defaults.min_confidence),
        }
    }

    pub fn pricing(&self) -> PricingConfig {
        let defaults = PricingConfig::default();
        let section = self.pricing.as_ref();
        PricingConfig {
            base_price: section
                .and_then(|section| section.base_price)
                .unwrap_or(defaults.base_price),
            min_price: section
                .and_then(|section| section.min_price)
                .unwrap_or(defaults.min_price),
            max_price: section
                .and_then(|section| section.max_price)
                .unwrap_or(defaults.max_price),
        }
    }
}

//! Top-level configuration, loaded from JSON.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::integration::PublishConfig;
use crate::settings::{CAMERA_SECTION, CameraTuning, DetectParams, Settings, SettingsError};
use crate::tracker::{Calibration, DedupConfig, TrackerConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} out of range: {value}")]
    OutOfRange { name: &'static str, value: f64 },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything the vision loop needs, resolved before the first frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub calibration: Calibration,
    pub tracker: TrackerConfig,
    pub dedup: DedupConfig,
    pub detect: DetectParams,
    pub publish: PublishConfig,
    /// Cap on detections processed per frame
    pub max_detections: usize,
    /// Where camera tuning values are persisted
    pub settings_path: Option<PathBuf>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            calibration: Calibration::default(),
            tracker: TrackerConfig::default(),
            dedup: DedupConfig::default(),
            detect: DetectParams::default(),
            publish: PublishConfig::default(),
            max_detections: 10,
            settings_path: None,
        }
    }
}

impl VisionConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: VisionConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.calibration.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "invalid calibration {:?}",
                self.calibration
            )));
        }
        self.tracker.validate()?;
        self.dedup.validate()?;
        self.detect.validate()?;
        if self.max_detections == 0 {
            return Err(ConfigError::Invalid("max_detections must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.publish.min_ratio) {
            return Err(ConfigError::OutOfRange {
                name: "publish.min_ratio",
                value: self.publish.min_ratio,
            });
        }
        Ok(())
    }

    /// Camera tuning persisted at `settings_path`, or the defaults when there is none.
    pub fn camera_tuning(&self) -> Result<CameraTuning, SettingsError> {
        let mut tuning = CameraTuning::default();
        if let Some(path) = &self.settings_path {
            tuning.load_from(&Settings::open(path)?, CAMERA_SECTION);
        }
        Ok(tuning)
    }

    /// Match the calibration and detector size limits to the actual frame width.
    pub fn with_frame_width(mut self, frame_width: usize) -> Self {
        self.calibration.frame_width = frame_width as f64;
        self.detect = self.detect.for_frame_width(frame_width);
        self
    }
}

//! Persisted camera tuning and detector parameters.
//!
//! Settings are plain integers grouped by section, stored as JSON:
//!
//! ```json
//! { "camera": { "brightness": 2, "contrast": 6 } }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("settings have no backing file")]
    NoPath,
}

/// Section name used for camera tuning values.
pub const CAMERA_SECTION: &str = "camera";

/// Key to integer settings grouped by section, optionally backed by a file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    sections: BTreeMap<String, BTreeMap<String, i64>>,
    path: Option<PathBuf>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from `path`. A missing file yields empty settings bound to that path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let sections = match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, starting empty");
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            sections,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get_int(&self, section: &str, key: &str) -> Option<i64> {
        self.sections.get(section)?.get(key).copied()
    }

    pub fn set_int(&mut self, section: &str, key: &str, value: i64) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Write back to the file this was opened from.
    pub fn save(&self) -> Result<(), SettingsError> {
        let path = self.path.as_ref().ok_or(SettingsError::NoPath)?;
        self.save_to(path)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        fs::write(path, serde_json::to_string_pretty(&self.sections)?)?;
        Ok(())
    }
}

/// How a tuning value is handed to the camera driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlValue {
    Automatic,
    Manual(i32),
}

impl ControlValue {
    /// Slider position 0 means automatic; position n sets the driver value n - 1.
    pub fn from_slider(value: i32) -> Self {
        if value <= 0 {
            ControlValue::Automatic
        } else {
            ControlValue::Manual(value - 1)
        }
    }
}

/// Camera image controls, as slider positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraTuning {
    brightness: i32,
    contrast: i32,
    hue: i32,
    saturation: i32,
    gain: i32,
    exposure: i32,
}

impl Default for CameraTuning {
    fn default() -> Self {
        Self {
            brightness: 2,
            contrast: 6,
            hue: 7,
            saturation: 4,
            gain: 1,
            exposure: 0,
        }
    }
}

macro_rules! tuning_field {
    ($get:ident, $set:ident, $max:expr) => {
        pub fn $get(&self) -> i32 {
            self.$get
        }

        /// Set the slider position, clamped to its range. Returns the stored value.
        pub fn $set(&mut self, value: i32) -> i32 {
            self.$get = value.clamp(0, $max);
            self.$get
        }
    };
}

impl CameraTuning {
    tuning_field!(brightness, set_brightness, 9);
    tuning_field!(contrast, set_contrast, 9);
    tuning_field!(hue, set_hue, 12);
    tuning_field!(saturation, set_saturation, 9);
    tuning_field!(gain, set_gain, 9);
    tuning_field!(exposure, set_exposure, 100);

    fn fields_mut(&mut self) -> [(&'static str, &mut i32); 6] {
        [
            ("brightness", &mut self.brightness),
            ("contrast", &mut self.contrast),
            ("hue", &mut self.hue),
            ("saturation", &mut self.saturation),
            ("gain", &mut self.gain),
            ("exposure", &mut self.exposure),
        ]
    }

    /// Name and slider position of every control.
    pub fn fields(&self) -> [(&'static str, i32); 6] {
        [
            ("brightness", self.brightness),
            ("contrast", self.contrast),
            ("hue", self.hue),
            ("saturation", self.saturation),
            ("gain", self.gain),
            ("exposure", self.exposure),
        ]
    }

    /// Read values present in `section`; missing keys keep their current value.
    pub fn load_from(&mut self, settings: &Settings, section: &str) {
        let mut loaded = *self;
        for (key, field) in loaded.fields_mut() {
            if let Some(v) = settings.get_int(section, key) {
                match i32::try_from(v) {
                    Ok(v) => *field = v,
                    Err(_) => warn!(section, key, value = v, "tuning value out of range"),
                }
            }
        }
        // Route through the setters so persisted values get clamped
        self.set_brightness(loaded.brightness);
        self.set_contrast(loaded.contrast);
        self.set_hue(loaded.hue);
        self.set_saturation(loaded.saturation);
        self.set_gain(loaded.gain);
        self.set_exposure(loaded.exposure);
    }

    pub fn save_to(&self, settings: &mut Settings, section: &str) {
        for (key, value) in self.fields() {
            settings.set_int(section, key, value as i64);
        }
    }
}

/// Detector tuning knobs, passed to the detector every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectParams {
    /// Pyramid step in percent above 1.0 (10 means a 1.10 scale factor)
    scale: u32,
    /// Neighbouring hits required to accept a detection
    neighbors: u32,
    /// Smallest box size in pixels
    min_detect_size: u32,
    /// Largest box size in pixels
    max_detect_size: u32,
    /// Downscale percent applied to frames on the GPU path
    gpu_scale: u32,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            scale: 10,
            neighbors: 4,
            min_detect_size: 20,
            max_detect_size: 450,
            gpu_scale: 14,
        }
    }
}

impl DetectParams {
    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn scale_factor(&self) -> f64 {
        1.0 + self.scale.max(1) as f64 / 100.0
    }

    pub fn set_scale(&mut self, value: u32) {
        self.scale = value.min(50);
    }

    pub fn neighbors(&self) -> u32 {
        self.neighbors
    }

    pub fn set_neighbors(&mut self, value: u32) {
        self.neighbors = value.min(50);
    }

    pub fn min_detect_size(&self) -> u32 {
        self.min_detect_size
    }

    pub fn max_detect_size(&self) -> u32 {
        self.max_detect_size
    }

    /// Set the largest accepted box; never below the smallest.
    pub fn set_max_detect_size(&mut self, value: u32) {
        self.max_detect_size = value.min(1000).max(self.min_detect_size);
    }

    pub fn gpu_scale(&self) -> u32 {
        self.gpu_scale
    }

    pub fn set_gpu_scale(&mut self, value: u32) {
        self.gpu_scale = value.min(100);
    }

    /// A bin at about 30 feet spans roughly 5% of the frame width.
    pub fn for_frame_width(mut self, frame_width: usize) -> Self {
        self.min_detect_size = (frame_width as f64 * 0.05) as u32;
        self.max_detect_size = self.max_detect_size.max(self.min_detect_size);
        self
    }

    /// Size limits must admit some box; percentages stay within their setter ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_detect_size == 0 || self.min_detect_size > self.max_detect_size {
            return Err(ConfigError::Invalid(format!(
                "detect size limits {}..={} accept no box",
                self.min_detect_size, self.max_detect_size
            )));
        }
        for (name, value, max) in [
            ("detect.scale", self.scale, 50),
            ("detect.neighbors", self.neighbors, 50),
            ("detect.gpu_scale", self.gpu_scale, 100),
        ] {
            if value > max {
                return Err(ConfigError::OutOfRange {
                    name,
                    value: value as f64,
                });
            }
        }
        Ok(())
    }

    /// Whether a box of this size is within the configured limits.
    pub fn accepts(&self, width: f32, height: f32) -> bool {
        let size = width.max(height);
        size >= self.min_detect_size as f32 && size <= self.max_detect_size as f32
    }
}

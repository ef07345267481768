//! Merging of split detections within a single frame.
//!
//! The cascade detector tends to report a bin's body and lid as two separate,
//! overlapping boxes of similar size. This pass is a heuristic, not a
//! clustering algorithm: occasional false merges and missed merges are
//! expected, and the tracker smooths both out over following frames.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::tracker::detection::Detection;

/// Thresholds for the duplicate test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Maximum absolute difference in pixel area between the two boxes
    pub max_area_difference: f32,
    /// Upper bound (exclusive) on the whole part of the intersection's width / height
    pub max_intersection_aspect: f32,
}

impl DedupConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("dedup.max_area_difference", self.max_area_difference),
            ("dedup.max_intersection_aspect", self.max_intersection_aspect),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::OutOfRange {
                    name,
                    value: value as f64,
                });
            }
        }
        Ok(())
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            max_area_difference: 2000.0,
            max_intersection_aspect: 5.0,
        }
    }
}

/// Removes duplicate splits, keeping the box nearer the bottom of the frame.
///
/// A pair is a split when the boxes start at different heights, intersect,
/// differ in area by less than `max_area_difference`, and the whole part of
/// the intersection's width / height lies in `(0, max_intersection_aspect)`.
/// The box with the smaller `y` is dropped. Boxes at the same height are
/// neighbours, never splits, and an overlap taller than it is wide never
/// merges. Survivors keep their relative order.
pub fn dedup_detections(detections: &[Detection], config: &DedupConfig) -> Vec<Detection> {
    let mut dropped = vec![false; detections.len()];

    for i in 0..detections.len() {
        if dropped[i] {
            continue;
        }
        for j in (i + 1)..detections.len() {
            if dropped[j] || dropped[i] {
                continue;
            }
            let a = &detections[i].rect;
            let b = &detections[j].rect;
            if a.y == b.y {
                continue;
            }

            let Some(inter) = a.intersection(b) else {
                continue;
            };
            if (a.area() - b.area()).abs() >= config.max_area_difference {
                continue;
            }
            let aspect = (inter.width / inter.height).floor();
            if !(aspect > 0.0 && aspect < config.max_intersection_aspect) {
                continue;
            }

            if b.y > a.y {
                dropped[i] = true;
            } else {
                dropped[j] = true;
            }
        }
    }

    detections
        .iter()
        .zip(dropped)
        .filter(|(_, d)| !d)
        .map(|(det, _)| *det)
        .collect()
}

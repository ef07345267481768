//! Output to the robot controller's key/value table.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tracker::{DisplayRecord, Rect};

/// Key the track array is published under.
pub const VISION_ARRAY_KEY: &str = "VisionArray";

/// Tracks the array can hold.
pub const VISION_SLOTS: usize = 7;

/// Value written to every field of an unused slot.
pub const UNUSED_SLOT: f64 = -1.0;

/// Vertical strips the frame is split into in driver-station mode.
pub const BIN_STRIPS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Tracks below this confidence are not published
    pub min_ratio: f64,
    /// Publish per-strip `BinN` flags instead of the track array
    pub driver_station: bool,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            min_ratio: 0.15,
            driver_station: false,
        }
    }
}

/// Fixed-size table of (ratio, distance, angle) triples sent to the robot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisionArray {
    slots: [[f64; 3]; VISION_SLOTS],
}

impl Default for VisionArray {
    fn default() -> Self {
        Self {
            slots: [[UNUSED_SLOT; 3]; VISION_SLOTS],
        }
    }
}

impl VisionArray {
    /// Fill slots with the records whose ratio is at least `min_ratio`, in list order.
    ///
    /// Records past the last slot are left out.
    pub fn from_display(records: &[DisplayRecord], min_ratio: f64) -> Self {
        let mut array = Self::default();
        let eligible = records.iter().filter(|r| r.ratio >= min_ratio);
        for (slot, record) in array.slots.iter_mut().zip(eligible) {
            *slot = [record.ratio, record.distance, record.angle];
        }
        array
    }

    /// Number of slots holding a track.
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s[0] != UNUSED_SLOT).count()
    }

    /// `(ratio, distance, angle)` of slot `index`, or `None` if unused or out of range.
    pub fn slot(&self, index: usize) -> Option<[f64; 3]> {
        self.slots.get(index).copied().filter(|s| s[0] != UNUSED_SLOT)
    }

    /// Flattened as the table expects: `ratio0, distance0, angle0, ratio1, ...`.
    pub fn to_vec(&self) -> Vec<f64> {
        self.slots.iter().flatten().copied().collect()
    }
}

/// Name of the flag for strip `index` (0-based): `Bin1` .. `Bin4`.
pub fn bin_key(index: usize) -> String {
    format!("Bin{}", index + 1)
}

/// For each vertical strip, whether a confident track lies entirely inside it.
pub fn bin_hits(
    records: &[DisplayRecord],
    frame_width: usize,
    frame_height: usize,
    min_ratio: f64,
) -> [bool; BIN_STRIPS] {
    let strip_width = frame_width / BIN_STRIPS;
    std::array::from_fn(|i| {
        let strip = Rect::new(
            (i * strip_width) as f32,
            0.0,
            strip_width as f32,
            frame_height as f32,
        );
        records
            .iter()
            .any(|r| r.ratio > min_ratio && strip.contains(&r.rect))
    })
}

/// Key/value table shared with the robot controller.
pub trait Publisher {
    type Error: fmt::Display;

    fn put_number_array(&mut self, key: &str, values: &[f64]) -> Result<(), Self::Error>;

    fn put_boolean(&mut self, key: &str, value: bool) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    NumberArray(Vec<f64>),
    Boolean(bool),
}

/// In-process table, for replay and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryPublisher {
    values: BTreeMap<String, Value>,
    writes: usize,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn number_array(&self, key: &str) -> Option<&[f64]> {
        match self.values.get(key)? {
            Value::NumberArray(v) => Some(v),
            Value::Boolean(_) => None,
        }
    }

    pub fn boolean(&self, key: &str) -> Option<bool> {
        match self.values.get(key)? {
            Value::Boolean(b) => Some(*b),
            Value::NumberArray(_) => None,
        }
    }

    /// Total puts since creation.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl Publisher for MemoryPublisher {
    type Error = Infallible;

    fn put_number_array(&mut self, key: &str, values: &[f64]) -> Result<(), Self::Error> {
        self.values
            .insert(key.to_string(), Value::NumberArray(values.to_vec()));
        self.writes += 1;
        Ok(())
    }

    fn put_boolean(&mut self, key: &str, value: bool) -> Result<(), Self::Error> {
        self.values.insert(key.to_string(), Value::Boolean(value));
        self.writes += 1;
        Ok(())
    }
}

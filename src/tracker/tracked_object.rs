//! A single bin tracked across frames.

use std::fmt;
use std::time::Instant;

use nalgebra::{UnitComplex, Vector2};
use serde::Serialize;

use crate::tracker::projection::Calibration;
use crate::tracker::rect::Rect;
use crate::tracker::track_state::TrackState;

/// Stable identifier of a track, shown to drivers as a letter (`A`, `B`, ..., `Z`, `AA`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TrackId(pub u32);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Bijective base-26
        let mut n = self.0 as u64 + 1;
        let mut letters = Vec::new();
        while n > 0 {
            n -= 1;
            letters.push(b'A' + (n % 26) as u8);
            n /= 26;
        }
        letters.reverse();
        f.write_str(&String::from_utf8_lossy(&letters))
    }
}

/// Read-only snapshot of a track for the publish and render collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DisplayRecord {
    pub id: TrackId,
    pub rect: Rect,
    /// Confidence in [0, 1]
    pub ratio: f64,
    pub distance: f64,
    /// Bearing in degrees, wrapped to (-180, 180]
    pub angle: f64,
}

/// One physical bin tracked over time.
#[derive(Debug, Clone)]
pub struct TrackedObject {
    id: TrackId,
    state: TrackState,
    rect: Rect,
    distance: f64,
    /// Bearing in the robot frame, kept as a rotation so ego-motion composes without wrapping bugs
    bearing: UnitComplex<f64>,
    /// Robot-frame velocity in distance units per frame
    velocity: Vector2<f64>,
    confidence: f64,
    /// Frames since creation
    age: u32,
    /// Consecutive frames without a matching detection
    miss_count: u32,
    hit_this_frame: bool,
    last_update: Instant,
}

impl TrackedObject {
    /// Start a track from an unmatched detection.
    pub fn new(id: TrackId, rect: Rect, calibration: &Calibration, seed_confidence: f64) -> Self {
        Self {
            id,
            state: TrackState::New,
            rect,
            distance: calibration.distance(&rect),
            bearing: UnitComplex::new(calibration.angle(&rect).to_radians()),
            velocity: Vector2::zeros(),
            confidence: seed_confidence.clamp(0.0, 1.0),
            age: 0,
            miss_count: 0,
            hit_this_frame: true,
            last_update: Instant::now(),
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Bearing in degrees, wrapped to (-180, 180].
    pub fn angle(&self) -> f64 {
        self.bearing.angle().to_degrees()
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn velocity(&self) -> Vector2<f64> {
        self.velocity
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn miss_count(&self) -> u32 {
        self.miss_count
    }

    pub fn last_update(&self) -> Instant {
        self.last_update
    }

    pub fn hit_this_frame(&self) -> bool {
        self.hit_this_frame
    }

    /// Position in the robot frame: x along the optical axis, y toward positive angles.
    pub fn position(&self) -> Vector2<f64> {
        self.bearing * Vector2::new(self.distance, 0.0)
    }

    /// Enter the list. A new track counts as matched by the detection that created it.
    pub fn activate(&mut self) {
        if self.state == TrackState::New {
            self.state = TrackState::Tracked;
        }
    }

    /// Fold a matching detection into the track.
    pub fn update(&mut self, rect: Rect, calibration: &Calibration, gain: f64, smoothing: f64) {
        let previous = self.position();
        let frames = (self.miss_count + 1) as f64;

        self.rect = rect;
        self.distance = calibration.distance(&rect);
        self.bearing = UnitComplex::new(calibration.angle(&rect).to_radians());

        let measured = (self.position() - previous) / frames;
        self.velocity = self.velocity * smoothing + measured * (1.0 - smoothing);

        self.confidence = (self.confidence + gain * (1.0 - self.confidence)).clamp(0.0, 1.0);
        self.miss_count = 0;
        self.hit_this_frame = true;
        self.state = TrackState::Tracked;
        self.last_update = Instant::now();
    }

    /// Rotate bearing and velocity by the platform's turn since the last frame.
    pub fn rotate(&mut self, delta_degrees: f64) {
        let rotation = UnitComplex::new(delta_degrees.to_radians());
        self.bearing = rotation * self.bearing;
        self.velocity = rotation * self.velocity;
    }

    /// Advance one frame. Returns `false` once the track has run out of confidence or misses.
    pub fn advance(&mut self, decay: f64, min_confidence: f64, max_miss: u32) -> bool {
        self.age = self.age.saturating_add(1);

        if self.hit_this_frame {
            self.state = TrackState::Tracked;
        } else {
            self.confidence = (self.confidence * decay).clamp(0.0, 1.0);
            self.miss_count += 1;
            self.state = TrackState::Stale;
        }
        self.hit_this_frame = false;

        if self.confidence < min_confidence || self.miss_count >= max_miss {
            self.state = TrackState::Removed;
            return false;
        }
        true
    }

    pub fn display(&self) -> DisplayRecord {
        DisplayRecord {
            id: self.id,
            rect: self.rect,
            ratio: self.confidence,
            distance: self.distance,
            angle: self.angle(),
        }
    }

    #[cfg(test)]
    pub(crate) fn set_confidence(&mut self, confidence: f64) {
        self.confidence = confidence;
    }
}

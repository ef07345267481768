//! Recycling bin tracking core for an FRC vision pipeline.
//!
//! Per-frame detections are deduplicated, associated with persistent tracks
//! in a [`TrackedObjectList`], and published to the robot as a fixed-size
//! [`VisionArray`](integration::VisionArray). Frame acquisition goes through
//! the [`FrameSource`](source::FrameSource) capability trait, with
//! [`AsyncSource`](source::AsyncSource) running hardware producers on a
//! background thread.

pub mod config;
pub mod integration;
pub mod settings;
pub mod source;
pub mod tracker;

pub use config::{ConfigError, VisionConfig};
pub use integration::{Detector, Publisher, VisionArray, VisionPipeline};
pub use source::{Frame, FrameSource};
pub use tracker::{
    Calibration, Detection, DisplayRecord, Direction, Rect, TrackError, TrackId, TrackState,
    TrackedObject, TrackedObjectList, TrackerConfig,
};

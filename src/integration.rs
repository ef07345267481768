//! Glue between frame sources, an external detector, the tracker and the
//! robot-side key/value table.

mod builder;
mod detector;
mod pipeline;
mod publish;

pub use builder::DetectionBuilder;
pub use detector::Detector;
pub use pipeline::{FrameReport, FrameTimer, VisionPipeline};
pub use publish::{
    BIN_STRIPS, MemoryPublisher, PublishConfig, Publisher, UNUSED_SLOT, VISION_ARRAY_KEY,
    VISION_SLOTS, Value, VisionArray, bin_hits, bin_key,
};

mod dedup;
mod detection;
mod error;
mod matching;
mod projection;
mod rect;
mod track_state;
mod tracked_object;
mod tracked_object_list;

pub use dedup::{DedupConfig, dedup_detections};
pub use detection::{Detection, Direction};
pub use error::TrackError;
pub use matching::{AssignmentResult, GATED, Similarity, linear_assignment, similarity_cost};
pub use projection::Calibration;
pub use rect::Rect;
pub use track_state::TrackState;
pub use tracked_object::{DisplayRecord, TrackId, TrackedObject};
pub use tracked_object_list::{Association, TrackedObjectList, TrackerConfig};

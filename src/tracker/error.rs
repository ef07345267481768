use thiserror::Error;

/// Rejected tracker input. The track list is left untouched whenever one of these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackError {
    #[error("invalid detection rectangle ({x}, {y}, {width}x{height})")]
    InvalidRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    #[error("non-finite {0}")]
    NonFinite(&'static str),
}

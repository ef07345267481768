//! The seam to the external bin detector.

use crate::settings::DetectParams;
use crate::source::Frame;
use crate::tracker::Detection;

/// Finds candidate bins in a frame.
///
/// The detection model itself (cascade classifier, network, ...) lives behind
/// this trait. Implementations should honour the size limits and scale in
/// `params`; the pipeline re-applies the size limits regardless.
///
/// ```ignore
/// struct Cascade { /* model handle */ }
///
/// impl Detector for Cascade {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, frame: &Frame, params: &DetectParams) -> Result<Vec<Detection>, Self::Error> {
///         Ok(vec![])
///     }
/// }
/// ```
pub trait Detector {
    type Error;

    fn detect(&mut self, frame: &Frame, params: &DetectParams) -> Result<Vec<Detection>, Self::Error>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    type Error = D::Error;

    fn detect(&mut self, frame: &Frame, params: &DetectParams) -> Result<Vec<Detection>, Self::Error> {
        (**self).detect(frame, params)
    }
}

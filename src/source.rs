//! Frame acquisition.
//!
//! Every input (still image, recorded clip, live or stereo camera) implements
//! [`FrameSource`]. Hardware cameras implement [`FrameProducer`] instead and
//! are wrapped in an [`AsyncSource`], which runs them on a background thread.

mod async_source;
mod image;
mod latest;
mod sequence;

use std::time::Instant;

use ndarray::{Array2, Array3};
use thiserror::Error;

pub use async_source::{AsyncOptions, AsyncSource, FrameProducer, Grab};
pub use image::ImageSource;
pub use latest::{DeliveryMode, LatestFrame};
pub use sequence::SequenceSource;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("source has no frames")]
    Empty,

    #[error("frame {index} is {got:?}, expected {expected:?}")]
    ShapeMismatch {
        index: usize,
        expected: (usize, usize),
        got: (usize, usize),
    },
}

/// One captured frame: an image of shape (height, width, channels) and optional per-pixel depth.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: Array3<u8>,
    /// Depth in millimetres, shape (height, width)
    pub depth: Option<Array2<f32>>,
    pub frame_number: u64,
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(image: Array3<u8>, frame_number: u64) -> Self {
        Self {
            image,
            depth: None,
            frame_number,
            timestamp: Instant::now(),
        }
    }

    pub fn with_depth(mut self, depth: Array2<f32>) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn width(&self) -> usize {
        self.image.dim().1
    }

    pub fn height(&self) -> usize {
        self.image.dim().0
    }

    /// Depth at pixel `(x, y)`, if this frame carries depth and the pixel is in range.
    pub fn depth_at(&self, x: usize, y: usize) -> Option<f32> {
        self.depth
            .as_ref()?
            .get((y, x))
            .copied()
            .filter(|d| d.is_finite())
    }
}

/// Common capability of every frame input.
pub trait FrameSource {
    /// Next frame, or `None` when the source is exhausted or disconnected.
    ///
    /// While `pause` is set the previously delivered frame is returned again.
    fn next_frame(&mut self, pause: bool) -> Option<Frame>;

    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// Number of the most recently delivered frame.
    fn frame_number(&self) -> u64;

    /// Total frames, when the source has a known length.
    fn frame_count(&self) -> Option<u64> {
        None
    }

    /// Reposition a seekable source. Returns `false` if the source cannot seek there.
    fn seek(&mut self, _frame_number: u64) -> bool {
        false
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self, pause: bool) -> Option<Frame> {
        (**self).next_frame(pause)
    }

    fn width(&self) -> usize {
        (**self).width()
    }

    fn height(&self) -> usize {
        (**self).height()
    }

    fn frame_number(&self) -> u64 {
        (**self).frame_number()
    }

    fn frame_count(&self) -> Option<u64> {
        (**self).frame_count()
    }

    fn seek(&mut self, frame_number: u64) -> bool {
        (**self).seek(frame_number)
    }
}

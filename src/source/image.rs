use ndarray::Array3;

use crate::source::{Frame, FrameSource};

/// Replays a single still image forever.
#[derive(Debug, Clone)]
pub struct ImageSource {
    image: Array3<u8>,
    frame_number: u64,
}

impl ImageSource {
    pub fn new(image: Array3<u8>) -> Self {
        Self {
            image,
            frame_number: 0,
        }
    }

    /// A black three-channel image.
    pub fn blank(width: usize, height: usize) -> Self {
        Self::new(Array3::zeros((height, width, 3)))
    }
}

impl FrameSource for ImageSource {
    fn next_frame(&mut self, _pause: bool) -> Option<Frame> {
        Some(Frame::new(self.image.clone(), self.frame_number))
    }

    fn width(&self) -> usize {
        self.image.dim().1
    }

    fn height(&self) -> usize {
        self.image.dim().0
    }

    fn frame_number(&self) -> u64 {
        self.frame_number
    }

    fn frame_count(&self) -> Option<u64> {
        Some(1)
    }
}

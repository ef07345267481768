use ndarray::Array3;

use crate::source::{Frame, FrameSource, SourceError};

/// A recorded clip held in memory. Delivers every frame once, in order.
#[derive(Debug, Clone)]
pub struct SequenceSource {
    frames: Vec<Array3<u8>>,
    position: usize,
    last: Option<Frame>,
}

impl SequenceSource {
    /// All frames must share the first frame's width and height.
    pub fn new(frames: Vec<Array3<u8>>) -> Result<Self, SourceError> {
        let first = frames.first().ok_or(SourceError::Empty)?;
        let expected = (first.dim().1, first.dim().0);
        for (index, frame) in frames.iter().enumerate() {
            let got = (frame.dim().1, frame.dim().0);
            if got != expected {
                return Err(SourceError::ShapeMismatch {
                    index,
                    expected,
                    got,
                });
            }
        }
        Ok(Self {
            frames,
            position: 0,
            last: None,
        })
    }

    pub fn remaining(&self) -> usize {
        self.frames.len() - self.position
    }
}

impl FrameSource for SequenceSource {
    fn next_frame(&mut self, pause: bool) -> Option<Frame> {
        if pause {
            if let Some(frame) = &self.last {
                return Some(frame.clone());
            }
        }
        let image = self.frames.get(self.position)?.clone();
        let frame = Frame::new(image, self.position as u64);
        self.position += 1;
        self.last = Some(frame.clone());
        Some(frame)
    }

    fn width(&self) -> usize {
        self.frames[0].dim().1
    }

    fn height(&self) -> usize {
        self.frames[0].dim().0
    }

    fn frame_number(&self) -> u64 {
        self.last.as_ref().map_or(0, |f| f.frame_number)
    }

    fn frame_count(&self) -> Option<u64> {
        Some(self.frames.len() as u64)
    }

    fn seek(&mut self, frame_number: u64) -> bool {
        match usize::try_from(frame_number) {
            Ok(n) if n < self.frames.len() => {
                self.position = n;
                true
            }
            _ => false,
        }
    }
}

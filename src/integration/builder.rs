//! Builder for [`Detection`]s from the box layouts detectors commonly emit.

use crate::tracker::{Detection, Direction, Rect, TrackError};

#[derive(Debug, Clone, Copy, Default)]
pub struct DetectionBuilder {
    rect: Rect,
    direction: Direction,
}

impl DetectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Corners: left, top, right, bottom.
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.rect = Rect::from_tlbr(x1, y1, x2, y2);
        self
    }

    /// Center plus size.
    pub fn xywh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.rect = Rect::from_center(cx, cy, w, h);
        self
    }

    /// Top-left corner plus size.
    pub fn tlwh(mut self, x: f32, y: f32, w: f32, h: f32) -> Self {
        self.rect = Rect::new(x, y, w, h);
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn build(self) -> Detection {
        Detection::new(self.rect, self.direction)
    }

    /// Like [`build`](Self::build), but rejects empty or non-finite boxes.
    pub fn try_build(self) -> Result<Detection, TrackError> {
        if !self.rect.is_valid() {
            let Rect {
                x,
                y,
                width,
                height,
            } = self.rect;
            return Err(TrackError::InvalidRect {
                x,
                y,
                width,
                height,
            });
        }
        Ok(self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts_agree() {
        let a = DetectionBuilder::new().tlbr(10.0, 20.0, 50.0, 80.0).build();
        let b = DetectionBuilder::new().xywh(30.0, 50.0, 40.0, 60.0).build();
        let c = DetectionBuilder::new().tlwh(10.0, 20.0, 40.0, 60.0).build();
        assert_eq!(a.rect, c.rect);
        assert_eq!(b.rect, c.rect);
    }

    #[test]
    fn test_direction() {
        let det = DetectionBuilder::new()
            .tlwh(0.0, 0.0, 10.0, 10.0)
            .direction(Direction::West)
            .build();
        assert_eq!(det.direction, Direction::West);
    }

    #[test]
    fn test_try_build_rejects_empty() {
        assert!(DetectionBuilder::new().try_build().is_err());
        assert!(
            DetectionBuilder::new()
                .tlwh(0.0, 0.0, f32::NAN, 5.0)
                .try_build()
                .is_err()
        );
        assert!(
            DetectionBuilder::new()
                .tlwh(0.0, 0.0, 5.0, 5.0)
                .try_build()
                .is_ok()
        );
    }
}

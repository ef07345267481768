//! Pinhole projection between screen rectangles and (distance, angle).

use serde::{Deserialize, Serialize};

use crate::tracker::rect::Rect;

/// Camera and target constants used to turn a bounding box into a range and bearing.
///
/// These are resolved configuration inputs. The field of view in particular is
/// not calibrated, so only the monotonic relationship between pixel width and
/// distance should be relied on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// Physical width of the target (distance is reported in the same unit)
    pub target_width: f64,
    /// Width of the processed frame in pixels
    pub frame_width: f64,
    /// Horizontal field of view of the camera, in degrees
    pub horizontal_fov_degrees: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            // Recycling bins are 24" wide
            target_width: 24.0,
            frame_width: 640.0,
            horizontal_fov_degrees: 69.0,
        }
    }
}

impl Calibration {
    pub fn new(target_width: f64, frame_width: f64, horizontal_fov_degrees: f64) -> Self {
        Self {
            target_width,
            frame_width,
            horizontal_fov_degrees,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.target_width.is_finite()
            && self.target_width > 0.0
            && self.frame_width.is_finite()
            && self.frame_width > 0.0
            && self.horizontal_fov_degrees > 0.0
            && self.horizontal_fov_degrees < 180.0
    }

    fn half_fov_tan(&self) -> f64 {
        (self.horizontal_fov_degrees.to_radians() / 2.0).tan()
    }

    fn degrees_per_pixel(&self) -> f64 {
        self.horizontal_fov_degrees / self.frame_width
    }

    /// Range to a target whose on-screen width is `rect.width`.
    pub fn distance(&self, rect: &Rect) -> f64 {
        let pixel_width = rect.width as f64;
        self.target_width * self.frame_width / (2.0 * pixel_width * self.half_fov_tan())
    }

    /// Bearing in degrees from the optical axis; positive is right of center.
    pub fn angle(&self, rect: &Rect) -> f64 {
        let (cx, _) = rect.center();
        (cx as f64 - self.frame_width / 2.0) * self.degrees_per_pixel()
    }

    /// On-screen width of a target at `distance`.
    pub fn width_for_distance(&self, distance: f64) -> f64 {
        self.target_width * self.frame_width / (2.0 * distance * self.half_fov_tan())
    }

    /// Horizontal pixel center of a target seen at `angle_degrees`.
    pub fn center_x_for_angle(&self, angle_degrees: f64) -> f64 {
        angle_degrees / self.degrees_per_pixel() + self.frame_width / 2.0
    }

    /// Rebuild a screen rectangle from a range and bearing.
    ///
    /// Vertical placement is not observable from (distance, angle), so the
    /// caller supplies the vertical center and the height/width aspect.
    pub fn project(&self, distance: f64, angle_degrees: f64, center_y: f64, aspect: f64) -> Rect {
        let width = self.width_for_distance(distance);
        let cx = self.center_x_for_angle(angle_degrees);
        Rect::from_center(cx as f32, center_y as f32, width as f32, (width * aspect) as f32)
    }
}

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in pixel coordinates (rows/columns, inclusive
/// corner coordinates as produced by rectangle tools in the calibration UI).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

impl Roi {
    pub fn new(top: f64, left: f64, bottom: f64, right: f64) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Signed area; non-positive for degenerate or inverted rectangles.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn is_finite(&self) -> bool {
        [self.top, self.left, self.bottom, self.right]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Center of the rectangle (`x = column`, `y = row`).
    pub fn centroid(&self) -> Point2<f64> {
        Point2::new(
            0.5 * (self.left + self.right),
            0.5 * (self.top + self.bottom),
        )
    }

    /// True if the rectangle lies inside a `width x height` image.
    pub fn fits_within(&self, width: usize, height: usize) -> bool {
        self.top >= 0.0
            && self.left >= 0.0
            && self.bottom <= height as f64 - 1.0
            && self.right <= width as f64 - 1.0
    }

    /// The same rectangle expressed in pyramid level `level` coordinates.
    pub fn at_level(&self, level: usize) -> Roi {
        let s = (1u32 << level) as f64;
        let f = |v: f64| (v + 0.5) / s - 0.5;
        Roi::new(f(self.top), f(self.left), f(self.bottom), f(self.right))
    }
}

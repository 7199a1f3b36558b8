//! Sobel gradient field.
//!
//! Raw Sobel responses are stored as `i16`; accessors return them divided by
//! 4 so that a step edge of height `h` gray values has magnitude `~h`.

use planar_locator_core::GrayImageView;

use crate::error::ShapeError;

#[derive(Clone, Debug, Default)]
pub(crate) struct GradientField {
    pub width: usize,
    pub height: usize,
    gx: Vec<i16>,
    gy: Vec<i16>,
}

impl GradientField {
    pub(crate) fn from_view(img: &GrayImageView<'_>) -> Result<Self, ShapeError> {
        let mut g = Self::default();
        g.compute(img)?;
        Ok(g)
    }

    /// Recompute for `img`, reusing the allocation when possible.
    pub(crate) fn compute(&mut self, img: &GrayImageView<'_>) -> Result<(), ShapeError> {
        let (w, h) = (img.width, img.height);
        let n = w * h;
        self.gx.clear();
        self.gy.clear();
        self.gx.try_reserve_exact(n)?;
        self.gy.try_reserve_exact(n)?;
        self.gx.resize(n, 0);
        self.gy.resize(n, 0);
        self.width = w;
        self.height = h;
        if w < 3 || h < 3 {
            return Ok(());
        }

        let d = img.data;
        for y in 1..h - 1 {
            let up = (y - 1) * w;
            let mid = y * w;
            let dn = (y + 1) * w;
            for x in 1..w - 1 {
                let p = |row: usize, dx: usize| d[row + x + dx - 1] as i32;
                let gx = (p(up, 2) + 2 * p(mid, 2) + p(dn, 2)) - (p(up, 0) + 2 * p(mid, 0) + p(dn, 0));
                let gy = (p(dn, 0) + 2 * p(dn, 1) + p(dn, 2)) - (p(up, 0) + 2 * p(up, 1) + p(up, 2));
                self.gx[mid + x] = gx as i16;
                self.gy[mid + x] = gy as i16;
            }
        }
        Ok(())
    }

    /// Gradient at an integer pixel, zero outside the field.
    #[inline]
    pub(crate) fn at(&self, x: i32, y: i32) -> (f32, f32) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return (0.0, 0.0);
        }
        let i = y as usize * self.width + x as usize;
        (self.gx[i] as f32 * 0.25, self.gy[i] as f32 * 0.25)
    }

    #[inline]
    pub(crate) fn magnitude(&self, x: i32, y: i32) -> f32 {
        let (gx, gy) = self.at(x, y);
        (gx * gx + gy * gy).sqrt()
    }

    /// Bilinearly interpolated gradient magnitude.
    pub(crate) fn magnitude_bilinear(&self, x: f64, y: f64) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = (x - x0) as f32;
        let fy = (y - y0) as f32;
        let (x0, y0) = (x0 as i32, y0 as i32);
        let m00 = self.magnitude(x0, y0);
        let m10 = self.magnitude(x0 + 1, y0);
        let m01 = self.magnitude(x0, y0 + 1);
        let m11 = self.magnitude(x0 + 1, y0 + 1);
        let a = m00 + fx * (m10 - m00);
        let b = m01 + fx * (m11 - m01);
        a + fy * (b - a)
    }
}

/// Vertex offset of a parabola through `(−1, a)`, `(0, b)`, `(1, c)`,
/// clamped to `[-0.5, 0.5]`; zero when `b` is not a strict peak.
#[inline]
pub(crate) fn parabola_peak(a: f32, b: f32, c: f32) -> f32 {
    let denom = a - 2.0 * b + c;
    if denom >= -1e-6 {
        return 0.0;
    }
    (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use planar_locator_core::GrayImage;

    fn step_image() -> GrayImage {
        let mut img = GrayImage::filled(8, 8, 0);
        for y in 0..8 {
            for x in 4..8 {
                img.set(x, y, 200);
            }
        }
        img
    }

    #[test]
    fn step_edge_has_its_height_as_magnitude() {
        let g = GradientField::from_view(&step_image().view()).expect("alloc");
        let (gx, gy) = g.at(3, 4);
        assert!((gx - 200.0).abs() < 1e-3, "gx = {gx}");
        assert_eq!(gy, 0.0);
        // left of the step, two pixels away
        assert_eq!(g.magnitude(1, 4), 0.0);
        // borders are zero
        assert_eq!(g.magnitude(0, 4), 0.0);
    }

    #[test]
    fn parabola_peak_is_symmetric() {
        assert_eq!(parabola_peak(1.0, 2.0, 1.0), 0.0);
        assert!(parabola_peak(1.0, 2.0, 1.5) > 0.0);
        assert!(parabola_peak(1.5, 2.0, 1.0) < 0.0);
        assert_eq!(parabola_peak(3.0, 2.0, 1.0), 0.0);
    }
}

//! Mean image pyramid with reusable buffers.

use planar_locator_core::{GrayImage, GrayImageView};

use crate::error::ShapeError;

/// Halve an image with 2x2 box averaging. Odd trailing rows/columns are
/// dropped.
pub(crate) fn downsample2_into(src: &GrayImageView<'_>, dst: &mut GrayImage) -> Result<(), ShapeError> {
    let w = src.width / 2;
    let h = src.height / 2;
    dst.data.clear();
    dst.data.try_reserve_exact(w * h)?;
    for y in 0..h {
        let r0 = &src.data[(2 * y) * src.width..(2 * y + 1) * src.width];
        let r1 = &src.data[(2 * y + 1) * src.width..(2 * y + 2) * src.width];
        for x in 0..w {
            let sum = r0[2 * x] as u32 + r0[2 * x + 1] as u32 + r1[2 * x] as u32 + r1[2 * x + 1] as u32;
            dst.data.push(((sum + 2) / 4) as u8);
        }
    }
    dst.width = w;
    dst.height = h;
    Ok(())
}

/// Pyramid levels `1..n`; level 0 is the caller's image and is not copied.
#[derive(Clone, Debug, Default)]
pub(crate) struct Pyramid {
    upper: Vec<GrayImage>,
}

impl Pyramid {
    /// Rebuild in place, reusing previously allocated level buffers.
    pub(crate) fn rebuild(&mut self, base: &GrayImageView<'_>, levels: usize) -> Result<(), ShapeError> {
        let extra = levels.saturating_sub(1);
        self.upper.resize_with(extra, || GrayImage::filled(0, 0, 0));
        for l in 0..extra {
            let (done, rest) = self.upper.split_at_mut(l);
            let src = if l == 0 { *base } else { done[l - 1].view() };
            downsample2_into(&src, &mut rest[0])?;
        }
        Ok(())
    }

    pub(crate) fn level<'a>(&'a self, base: &GrayImageView<'a>, level: usize) -> GrayImageView<'a> {
        if level == 0 {
            *base
        } else {
            self.upper[level - 1].view()
        }
    }

    /// Number of levels usable for a template of the given level count:
    /// levels must stay at least 3x3 for the gradient operator.
    pub(crate) fn usable_levels(width: usize, height: usize, requested: usize) -> usize {
        let mut n = 1;
        while n < requested && (width >> n) >= 3 && (height >> n) >= 3 {
            n += 1;
        }
        n
    }
}

/// Map a level-0 coordinate to pyramid level `level`.
#[inline]
pub(crate) fn to_level(v: f64, level: usize) -> f64 {
    (v + 0.5) / (1u32 << level) as f64 - 0.5
}

/// Map a level coordinate back to level 0.
#[cfg(test)]
pub(crate) fn from_level(v: f64, level: usize) -> f64 {
    (v + 0.5) * (1u32 << level) as f64 - 0.5
}

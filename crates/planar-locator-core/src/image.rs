/// Borrowed 8-bit grayscale image, row-major.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    /// Row-major, `width * height` bytes.
    pub data: &'a [u8],
}

impl<'a> GrayImageView<'a> {
    /// Wrap a buffer, returning `None` when `data.len() != width * height`.
    pub fn new(width: usize, height: usize, data: &'a [u8]) -> Option<Self> {
        let expected = width.checked_mul(height)?;
        (data.len() == expected).then_some(Self {
            width,
            height,
            data,
        })
    }
}

/// Owned 8-bit grayscale image, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    /// Uniform image filled with `value`.
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_rejects_short_buffers() {
        let data = [0u8; 5];
        assert!(GrayImageView::new(2, 3, &data).is_none());
        assert!(GrayImageView::new(5, 1, &data).is_some());
    }

    #[test]
    fn set_ignores_out_of_range_pixels() {
        let mut img = GrayImage::filled(3, 2, 7);
        img.set(2, 1, 200);
        img.set(3, 0, 99);
        img.set(0, 2, 99);
        assert_eq!(img.data, vec![7, 7, 7, 7, 7, 200]);
    }
}

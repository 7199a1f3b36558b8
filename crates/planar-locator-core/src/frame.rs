use serde::{Deserialize, Serialize};

use crate::image::GrayImageView;

/// Pixel layout of an incoming frame buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Mono8,
    Rgb8,
    Bgr8,
    Rgba8,
    Mono16,
}

/// Acquisition time of a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Stamp {
    pub secs: i64,
    pub nanos: u32,
}

impl Stamp {
    pub fn new(secs: i64, nanos: u32) -> Self {
        Self { secs, nanos }
    }
}

/// Frame metadata carried unchanged into every detection of that frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    pub stamp: Stamp,
    pub frame_id: String,
}

/// Externally supplied image buffer, borrowed for one detection cycle.
#[derive(Clone, Copy, Debug)]
pub struct FrameImage<'a> {
    pub format: PixelFormat,
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8],
}

impl<'a> FrameImage<'a> {
    pub fn mono8(view: GrayImageView<'a>) -> Self {
        Self {
            format: PixelFormat::Mono8,
            width: view.width,
            height: view.height,
            data: view.data,
        }
    }

    /// Grayscale view of a `Mono8` frame with a consistent buffer length.
    pub fn gray_view(&self) -> Option<GrayImageView<'a>> {
        match self.format {
            PixelFormat::Mono8 => GrayImageView::new(self.width, self.height, self.data),
            _ => None,
        }
    }
}

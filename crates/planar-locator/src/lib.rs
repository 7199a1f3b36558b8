//! Calibrated planar marker localization.
//!
//! A template is learned once from a reference image region, then every
//! incoming frame is searched for instances of it. Matches are lifted onto
//! the calibrated world plane and reported as metric positions in the camera
//! frame, with identity orientation.
//!
//! ## Quickstart
//!
//! ```no_run
//! use planar_locator::{io, FrameHeader, FrameImage};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (_config, processor) = io::start_from_config_file("locator.json")?;
//! let frame = io::load_gray_image("frame.png")?;
//! let out = processor.process_frame(&FrameImage::mono8(frame.view()), &FrameHeader::default());
//! for record in &out.records {
//!     println!("{:.3} at {:?}", record.score, record.position);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - [`ModelBuilder`] / [`TemplateModel`]: template plus metric scale, origin
//!   offset and overlay contours.
//! - [`Detector`]: per-frame search producing [`RawMatch`] poses.
//! - [`PoseExtractor`]: position-only [`DetectionMatch`].
//! - [`FrameProcessor`]: serialized detection cycles that never fail.
//! - [`emit`]: output records, visualization markers and emitters.
//! - `io` (feature `image`): image files and config-driven startup.

mod config;
mod detector;
pub mod emit;
mod error;
mod model;
mod pipeline;
mod pose;

#[cfg(feature = "image")]
pub mod io;

#[cfg(test)]
mod testutil;

pub use planar_locator_core as core;
pub use planar_locator_shape as shape;

pub use config::{LocatorConfig, SearchConfig, MAX_LEVELS};
pub use detector::{Detector, RawMatch};
pub use emit::{
    DetectionRecord, FrameOutput, JsonLinesEmitter, MarkerShape, ResultEmitter,
    VisualizationMarker,
};
pub use error::{ErrorKind, LocatorError, StartupError, StartupStep};
pub use model::{image_to_metric_scale, ModelBuilder, TemplateModel};
pub use pipeline::{start, start_with_engine, FrameProcessor};
pub use pose::{DetectionMatch, PoseExtractor};

pub use planar_locator_core::{
    CalibrationSource, CalibrationStore, FrameHeader, FrameImage, GrayImage, GrayImageView,
    PixelFormat, Roi, Stamp,
};
pub use planar_locator_shape::{EdgeShapeEngine, MatchingEngine, Polarity, PointReduction, SearchRange};

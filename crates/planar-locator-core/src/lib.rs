//! Core types for calibrated planar marker localization.
//!
//! This crate is intentionally small and purely geometric: grayscale image
//! views, incoming frame descriptors, validated camera calibration and the
//! projection math between pixels, the camera frame and the calibrated world
//! plane. It does *not* depend on any concrete matching engine.
//!
//! ```
//! use nalgebra::Point2;
//! use planar_locator_core::{CalibrationStore, CameraIntrinsics, CameraPose};
//!
//! let intrinsics = CameraIntrinsics::division(
//!     0.0164374, -102.241, 3.45033e-6, 3.45e-6, 2082.16, 1392.79, 4096, 3000,
//! )?;
//! let pose = CameraPose::from_tuple([0.019, -0.012, 0.631, 356.4, 359.4, 269.6], 0)?;
//! let calib = CalibrationStore::new(intrinsics, pose);
//! let world = calib.pixel_to_world_plane(Point2::new(2765.0, 1483.0));
//! assert!(world.is_some());
//! # Ok::<(), planar_locator_core::CalibrationError>(())
//! ```

mod calibration;
mod frame;
mod image;
mod logger;
mod projection;
mod roi;

pub use calibration::{
    CalibrationError, CalibrationSource, CalibrationStore, CameraIntrinsics, CameraPose,
    DistortionModel, IntrinsicsSource, PoseSource, PoseType, RotationOrder,
};
pub use frame::{FrameHeader, FrameImage, PixelFormat, Stamp};
pub use image::{GrayImage, GrayImageView};
pub use roi::Roi;

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;

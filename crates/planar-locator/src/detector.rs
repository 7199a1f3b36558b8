//! Per-frame calibrated search.

use std::fmt;

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
use planar_locator_core::{CalibrationStore, CameraPose, FrameImage, PixelFormat, PoseType};
use planar_locator_shape::{EdgeShapeEngine, MatchingEngine, SearchParams, ShapeMatch};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::error::LocatorError;
use crate::model::TemplateModel;

/// Metric pose of one template instance in the camera frame, with its score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawMatch {
    pub pose: CameraPose,
    pub score: f64,
}

impl RawMatch {
    /// `[tx, ty, tz, alpha, beta, gamma, type]`.
    pub fn pose_tuple(&self) -> [f64; 7] {
        self.pose.to_tuple()
    }
}

/// Runs the engine on frames and lifts matches onto the calibrated plane.
///
/// Owns the engine and the model for its whole lifetime; `detect` needs
/// `&mut self` because the engine reuses its search buffers.
pub struct Detector<E: MatchingEngine = EdgeShapeEngine> {
    engine: E,
    calibration: CalibrationStore,
    model: TemplateModel<E::Template>,
    params: SearchParams,
}

impl<E: MatchingEngine> fmt::Debug for Detector<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detector")
            .field("roi", self.model.roi())
            .field("image_scale", &self.model.image_scale())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl<E: MatchingEngine> Detector<E> {
    pub fn new(engine: E, calibration: CalibrationStore, model: TemplateModel<E::Template>) -> Self {
        let params = model.search_config().search_params();
        Self {
            engine,
            calibration,
            model,
            params,
        }
    }

    pub fn model(&self) -> &TemplateModel<E::Template> {
        &self.model
    }

    pub fn calibration(&self) -> &CalibrationStore {
        &self.calibration
    }

    /// Metric pose of an engine match: the reference point back-projected
    /// onto the world plane, rotated in-plane by the match angle.
    pub fn lift(&self, m: &ShapeMatch) -> Option<RawMatch> {
        let world = self.calibration.pixel_to_world_plane(m.position)?;
        let plane = self.calibration.pose().to_isometry();
        let p_cam: Point3<f64> = plane.transform_point(&Point3::new(world.x, world.y, 0.0));
        let rotation = plane.rotation * UnitQuaternion::from_axis_angle(&Vector3::z_axis(), m.angle);
        let iso = Isometry3::from_parts(Translation3::from(p_cam.coords), rotation);
        Some(RawMatch {
            pose: CameraPose::from_isometry(&iso, PoseType::GBA),
            score: m.score,
        })
    }

    /// Search `frame` for template instances, best first.
    ///
    /// At most `max_matches` results, each scoring at least `min_score`.
    /// Unsupported formats and sizes fail with a detection error.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(width = frame.width, height = frame.height))
    )]
    pub fn detect(&mut self, frame: &FrameImage<'_>) -> Result<Vec<RawMatch>, LocatorError> {
        if frame.format != PixelFormat::Mono8 {
            return Err(LocatorError::Detection(format!(
                "unsupported pixel format {:?}, expected mono8",
                frame.format
            )));
        }
        let k = self.calibration.intrinsics();
        let (w, h) = (k.width() as usize, k.height() as usize);
        if (frame.width, frame.height) != (w, h) {
            return Err(LocatorError::Detection(format!(
                "frame is {}x{}, calibration expects {w}x{h}",
                frame.width, frame.height
            )));
        }
        let view = frame.gray_view().ok_or_else(|| {
            LocatorError::Detection(format!(
                "frame buffer holds {} bytes, expected {}",
                frame.data.len(),
                w * h
            ))
        })?;

        let matches = self
            .engine
            .search(self.model.template(), &view, &self.params)
            .map_err(LocatorError::from_search)?;

        let raw: Vec<RawMatch> = matches
            .iter()
            .filter_map(|m| {
                let lifted = self.lift(m);
                if lifted.is_none() {
                    log::debug!(
                        "detect: match at ({:.1}, {:.1}) does not hit the world plane",
                        m.position.x,
                        m.position.y
                    );
                }
                lifted
            })
            .take(self.params.max_matches)
            .collect();
        log::debug!("detect: {} matches", raw.len());
        Ok(raw)
    }
}

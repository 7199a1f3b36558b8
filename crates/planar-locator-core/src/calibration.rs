//! Camera calibration value objects and their validation.
//!
//! Intrinsics follow the area-scan division model used by the calibration
//! toolchain: focal length and pixel pitch in meters, a single radial
//! distortion coefficient `kappa` (1/m²) applied on the sensor plane, and the
//! principal point in pixels. The extrinsic pose maps world-plane coordinates
//! into camera coordinates; rotation angles are stored in degrees.

use nalgebra::{Isometry3, Matrix3, Rotation3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Calibration validation failures. Each variant names the offending field.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("calibration field `{field}` must be finite")]
    NonFinite { field: &'static str },
    #[error("calibration field `{field}` must be > 0 (got {value})")]
    NonPositive { field: &'static str, value: f64 },
    #[error("sensor dimension `{field}` must be a positive integer (got {value})")]
    InvalidSensorSize { field: &'static str, value: i64 },
    #[error("unknown distortion model `{0}`")]
    UnknownDistortionModel(String),
    #[error("unsupported pose type code {0}")]
    UnsupportedPoseType(u32),
}

/// Lens distortion parameterization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistortionModel {
    /// Single-coefficient division model.
    #[serde(alias = "area_scan_division")]
    Division,
    /// Distortion-free pinhole; `kappa` is ignored.
    #[serde(alias = "area_scan_pinhole")]
    Pinhole,
}

impl DistortionModel {
    pub fn from_tag(tag: &str) -> Result<Self, CalibrationError> {
        match tag {
            "division" | "area_scan_division" => Ok(Self::Division),
            "pinhole" | "area_scan_pinhole" => Ok(Self::Pinhole),
            other => Err(CalibrationError::UnknownDistortionModel(other.to_string())),
        }
    }
}

/// Serialized form of [`CameraIntrinsics`]. Sensor dimensions are signed so
/// that negative values surface as validation errors rather than parse errors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicsSource {
    pub model: String,
    pub focus: f64,
    #[serde(default)]
    pub kappa: f64,
    pub sx: f64,
    pub sy: f64,
    /// Principal point column; defaults to the sensor center.
    #[serde(default)]
    pub cx: Option<f64>,
    /// Principal point row; defaults to the sensor center.
    #[serde(default)]
    pub cy: Option<f64>,
    pub width: i64,
    pub height: i64,
}

/// Validated camera intrinsics. Immutable once constructed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IntrinsicsSource", into = "IntrinsicsSource")]
pub struct CameraIntrinsics {
    model: DistortionModel,
    focus: f64,
    kappa: f64,
    sx: f64,
    sy: f64,
    cx: f64,
    cy: f64,
    width: u32,
    height: u32,
}

fn finite(field: &'static str, value: f64) -> Result<f64, CalibrationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CalibrationError::NonFinite { field })
    }
}

fn positive(field: &'static str, value: f64) -> Result<f64, CalibrationError> {
    let value = finite(field, value)?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(CalibrationError::NonPositive { field, value })
    }
}

fn sensor_dim(field: &'static str, value: i64) -> Result<u32, CalibrationError> {
    match u32::try_from(value) {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(CalibrationError::InvalidSensorSize { field, value }),
    }
}

impl TryFrom<IntrinsicsSource> for CameraIntrinsics {
    type Error = CalibrationError;

    fn try_from(src: IntrinsicsSource) -> Result<Self, Self::Error> {
        let model = DistortionModel::from_tag(&src.model)?;
        let width = sensor_dim("width", src.width)?;
        let height = sensor_dim("height", src.height)?;
        let kappa = match model {
            DistortionModel::Division => finite("kappa", src.kappa)?,
            DistortionModel::Pinhole => 0.0,
        };
        Ok(Self {
            model,
            focus: positive("focus", src.focus)?,
            kappa,
            sx: positive("sx", src.sx)?,
            sy: positive("sy", src.sy)?,
            cx: finite("cx", src.cx.unwrap_or(width as f64 / 2.0))?,
            cy: finite("cy", src.cy.unwrap_or(height as f64 / 2.0))?,
            width,
            height,
        })
    }
}

impl From<CameraIntrinsics> for IntrinsicsSource {
    fn from(k: CameraIntrinsics) -> Self {
        let model = match k.model {
            DistortionModel::Division => "division",
            DistortionModel::Pinhole => "pinhole",
        };
        Self {
            model: model.to_string(),
            focus: k.focus,
            kappa: k.kappa,
            sx: k.sx,
            sy: k.sy,
            cx: Some(k.cx),
            cy: Some(k.cy),
            width: k.width as i64,
            height: k.height as i64,
        }
    }
}

impl CameraIntrinsics {
    /// Validate and build division-model intrinsics.
    #[allow(clippy::too_many_arguments)]
    pub fn division(
        focus: f64,
        kappa: f64,
        sx: f64,
        sy: f64,
        cx: f64,
        cy: f64,
        width: u32,
        height: u32,
    ) -> Result<Self, CalibrationError> {
        Self::try_from(IntrinsicsSource {
            model: "division".to_string(),
            focus,
            kappa,
            sx,
            sy,
            cx: Some(cx),
            cy: Some(cy),
            width: width as i64,
            height: height as i64,
        })
    }

    #[inline]
    pub fn model(&self) -> DistortionModel {
        self.model
    }
    /// Focal length in meters.
    #[inline]
    pub fn focus(&self) -> f64 {
        self.focus
    }
    /// Division distortion coefficient (1/m²).
    #[inline]
    pub fn kappa(&self) -> f64 {
        self.kappa
    }
    /// Pixel pitch `(sx, sy)` in meters.
    #[inline]
    pub fn pixel_pitch(&self) -> (f64, f64) {
        (self.sx, self.sy)
    }
    /// Principal point `(cx, cy)` in pixels (column, row).
    #[inline]
    pub fn principal_point(&self) -> (f64, f64) {
        (self.cx, self.cy)
    }
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Rotation convention of a [`PoseType`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationOrder {
    /// `R = Rx(alpha) * Ry(beta) * Rz(gamma)`.
    Gba,
    /// `R = Rz(gamma) * Ry(beta) * Rx(alpha)`.
    Abg,
}

/// Pose-type tag: rotation order plus whether the translation is applied
/// before (`R(p - T)`) or after (`Rp + T`) the rotation.
///
/// Serialized as the numeric code used by calibration files: `0` and `2` for
/// `Rp + T` with gba/abg order, `8` and `10` for the `R(p - T)` variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct PoseType {
    pub order: RotationOrder,
    pub translate_first: bool,
}

impl PoseType {
    pub const GBA: PoseType = PoseType {
        order: RotationOrder::Gba,
        translate_first: false,
    };

    pub fn from_code(code: u32) -> Result<Self, CalibrationError> {
        let order = match code & !8 {
            0 => RotationOrder::Gba,
            2 => RotationOrder::Abg,
            _ => return Err(CalibrationError::UnsupportedPoseType(code)),
        };
        Ok(Self {
            order,
            translate_first: code & 8 != 0,
        })
    }

    pub fn code(self) -> u32 {
        let base = match self.order {
            RotationOrder::Gba => 0,
            RotationOrder::Abg => 2,
        };
        if self.translate_first {
            base | 8
        } else {
            base
        }
    }
}

impl TryFrom<u32> for PoseType {
    type Error = CalibrationError;
    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

impl From<PoseType> for u32 {
    fn from(t: PoseType) -> Self {
        t.code()
    }
}

/// Serialized form of [`CameraPose`]: `[tx, ty, tz, alpha, beta, gamma, type]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseSource {
    /// Translation in meters.
    pub translation: [f64; 3],
    /// Rotation angles in degrees.
    pub rotation_deg: [f64; 3],
    #[serde(default)]
    pub pose_type: u32,
}

/// Validated 3D pose (six parameters plus type tag). Maps world coordinates
/// into camera coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PoseSource", into = "PoseSource")]
pub struct CameraPose {
    translation: [f64; 3],
    rotation_deg: [f64; 3],
    pose_type: PoseType,
}

impl TryFrom<PoseSource> for CameraPose {
    type Error = CalibrationError;

    fn try_from(src: PoseSource) -> Result<Self, Self::Error> {
        const T: [&str; 3] = ["tx", "ty", "tz"];
        const R: [&str; 3] = ["alpha", "beta", "gamma"];
        for (field, v) in T.iter().zip(src.translation) {
            finite(field, v)?;
        }
        for (field, v) in R.iter().zip(src.rotation_deg) {
            finite(field, v)?;
        }
        Ok(Self {
            translation: src.translation,
            rotation_deg: src.rotation_deg,
            pose_type: PoseType::from_code(src.pose_type)?,
        })
    }
}

impl From<CameraPose> for PoseSource {
    fn from(p: CameraPose) -> Self {
        Self {
            translation: p.translation,
            rotation_deg: p.rotation_deg,
            pose_type: p.pose_type.code(),
        }
    }
}

impl CameraPose {
    /// Validate and build a pose from the 7-value tuple layout.
    pub fn from_tuple(values: [f64; 6], pose_type: u32) -> Result<Self, CalibrationError> {
        Self::try_from(PoseSource {
            translation: [values[0], values[1], values[2]],
            rotation_deg: [values[3], values[4], values[5]],
            pose_type,
        })
    }

    /// Express a rigid transform in the given pose convention.
    pub fn from_isometry(iso: &Isometry3<f64>, pose_type: PoseType) -> Self {
        let r = iso.rotation.to_rotation_matrix().into_inner();
        let t = iso.translation.vector;
        let rotation_deg = match pose_type.order {
            RotationOrder::Gba => {
                let beta = r[(0, 2)].clamp(-1.0, 1.0).asin();
                let alpha = (-r[(1, 2)]).atan2(r[(2, 2)]);
                let gamma = (-r[(0, 1)]).atan2(r[(0, 0)]);
                [alpha, beta, gamma]
            }
            RotationOrder::Abg => {
                let beta = (-r[(2, 0)]).clamp(-1.0, 1.0).asin();
                let alpha = r[(2, 1)].atan2(r[(2, 2)]);
                let gamma = r[(1, 0)].atan2(r[(0, 0)]);
                [alpha, beta, gamma]
            }
        }
        .map(|a| a.to_degrees().rem_euclid(360.0));
        let translation = if pose_type.translate_first {
            -(r.transpose() * t)
        } else {
            t
        };
        Self {
            translation: [translation.x, translation.y, translation.z],
            rotation_deg,
            pose_type,
        }
    }

    #[inline]
    pub fn translation(&self) -> [f64; 3] {
        self.translation
    }
    #[inline]
    pub fn rotation_deg(&self) -> [f64; 3] {
        self.rotation_deg
    }
    #[inline]
    pub fn pose_type(&self) -> PoseType {
        self.pose_type
    }

    /// Six parameters plus the numeric type tag.
    pub fn to_tuple(&self) -> [f64; 7] {
        let [tx, ty, tz] = self.translation;
        let [a, b, g] = self.rotation_deg;
        [tx, ty, tz, a, b, g, self.pose_type.code() as f64]
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        let [a, b, g] = self.rotation_deg.map(f64::to_radians);
        let rx = Rotation3::from_axis_angle(&Vector3::x_axis(), a);
        let ry = Rotation3::from_axis_angle(&Vector3::y_axis(), b);
        let rz = Rotation3::from_axis_angle(&Vector3::z_axis(), g);
        match self.pose_type.order {
            RotationOrder::Gba => (rx * ry * rz).into_inner(),
            RotationOrder::Abg => (rz * ry * rx).into_inner(),
        }
    }

    /// Rigid transform `p_cam = R * p_world + t`.
    pub fn to_isometry(&self) -> Isometry3<f64> {
        let r = self.rotation_matrix();
        let v = Vector3::from(self.translation);
        let t = if self.pose_type.translate_first {
            -(r * v)
        } else {
            v
        };
        let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r));
        Isometry3::from_parts(Translation3::from(t), rotation)
    }
}

/// Serialized calibration: intrinsics plus extrinsic pose.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSource {
    pub intrinsics: IntrinsicsSource,
    pub pose: PoseSource,
}

/// Validated, read-only calibration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationStore {
    intrinsics: CameraIntrinsics,
    pose: CameraPose,
}

impl CalibrationStore {
    /// Validate a calibration source.
    pub fn load(source: CalibrationSource) -> Result<Self, CalibrationError> {
        let intrinsics = CameraIntrinsics::try_from(source.intrinsics)?;
        let pose = CameraPose::try_from(source.pose)?;
        log::debug!(
            "calibration loaded: {:?} {}x{}, pose type {}",
            intrinsics.model(),
            intrinsics.width(),
            intrinsics.height(),
            pose.pose_type().code()
        );
        Ok(Self { intrinsics, pose })
    }

    pub fn new(intrinsics: CameraIntrinsics, pose: CameraPose) -> Self {
        Self { intrinsics, pose }
    }

    #[inline]
    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    #[inline]
    pub fn pose(&self) -> &CameraPose {
        &self.pose
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn source() -> IntrinsicsSource {
        IntrinsicsSource {
            model: "area_scan_division".to_string(),
            focus: 0.0164374,
            kappa: -102.241,
            sx: 3.45033e-6,
            sy: 3.45e-6,
            cx: None,
            cy: None,
            width: 4096,
            height: 3000,
        }
    }

    #[test]
    fn principal_point_defaults_to_sensor_center() {
        let k = CameraIntrinsics::try_from(source()).expect("valid");
        assert_eq!(k.principal_point(), (2048.0, 1500.0));
        assert_eq!(k.model(), DistortionModel::Division);
    }

    #[test]
    fn rejects_bad_fields() {
        let mut s = source();
        s.focus = 0.0;
        assert!(matches!(
            CameraIntrinsics::try_from(s),
            Err(CalibrationError::NonPositive { field: "focus", .. })
        ));

        let mut s = source();
        s.sy = f64::NAN;
        assert!(matches!(
            CameraIntrinsics::try_from(s),
            Err(CalibrationError::NonFinite { field: "sy" })
        ));

        let mut s = source();
        s.height = 0;
        assert!(matches!(
            CameraIntrinsics::try_from(s),
            Err(CalibrationError::InvalidSensorSize { field: "height", .. })
        ));

        let mut s = source();
        s.model = "fisheye".to_string();
        assert!(matches!(
            CameraIntrinsics::try_from(s),
            Err(CalibrationError::UnknownDistortionModel(_))
        ));
    }

    #[test]
    fn pose_type_codes() {
        assert_eq!(PoseType::from_code(0).expect("gba"), PoseType::GBA);
        assert_eq!(PoseType::from_code(10).expect("abg").code(), 10);
        assert!(PoseType::from_code(4).is_err());
    }

    #[test]
    fn pose_isometry_round_trips_through_angles() {
        for code in [0, 2, 8, 10] {
            let pose =
                CameraPose::from_tuple([0.0188459, -0.0116134, 0.631195, 356.449, 359.438, 269.594], code)
                    .expect("pose");
            let iso = pose.to_isometry();
            let back = CameraPose::from_isometry(&iso, pose.pose_type());
            let iso_back = back.to_isometry();
            assert_relative_eq!(iso.to_homogeneous(), iso_back.to_homogeneous(), epsilon = 1e-9);
        }
    }

    #[test]
    fn calibration_deserializes_from_json() {
        let json = r#"{
            "intrinsics": {"model": "division", "focus": 0.0164374, "kappa": -102.241,
                           "sx": 3.45033e-6, "sy": 3.45e-6, "cx": 2082.16, "cy": 1392.79,
                           "width": 4096, "height": 3000},
            "pose": {"translation": [0.0188459, -0.0116134, 0.631195],
                     "rotation_deg": [356.449, 359.438, 269.594], "pose_type": 0}
        }"#;
        let src: CalibrationSource = serde_json::from_str(json).expect("parse");
        let store = CalibrationStore::load(src).expect("valid");
        assert_eq!(store.intrinsics().width(), 4096);
        assert_relative_eq!(store.pose().translation()[2], 0.631195);
    }
}

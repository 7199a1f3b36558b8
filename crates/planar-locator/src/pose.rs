use nalgebra::{Point3, UnitQuaternion};
use planar_locator_core::FrameHeader;
use serde::{Deserialize, Serialize};

use crate::detector::RawMatch;

/// Metric detection handed to the result emitter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionMatch {
    pub score: f64,
    /// Position in meters, camera frame.
    pub position: Point3<f64>,
    /// Always identity: only the position is reported.
    pub orientation: UnitQuaternion<f64>,
    pub header: FrameHeader,
}

/// Reduces raw matches to position-only detections.
#[derive(Clone, Copy, Debug, Default)]
pub struct PoseExtractor;

impl PoseExtractor {
    /// Position from the first three pose components, identity orientation.
    /// The rotation components and the pose type are discarded.
    pub fn extract(&self, raw: &RawMatch, header: &FrameHeader) -> DetectionMatch {
        let [x, y, z, ..] = raw.pose_tuple();
        DetectionMatch {
            score: raw.score,
            position: Point3::new(x, y, z),
            orientation: UnitQuaternion::identity(),
            header: header.clone(),
        }
    }

    pub fn extract_all(&self, raw: &[RawMatch], header: &FrameHeader) -> Vec<DetectionMatch> {
        raw.iter().map(|m| self.extract(m, header)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planar_locator_core::{CameraPose, Stamp};

    #[test]
    fn orientation_is_always_identity() {
        let header = FrameHeader {
            stamp: Stamp::new(12, 500),
            frame_id: "camera".into(),
        };
        for code in [0u32, 2, 8, 10] {
            for rot in [[0.0, 0.0, 0.0], [10.0, 200.0, 359.0], [356.4, 359.4, 269.6]] {
                let raw = RawMatch {
                    pose: CameraPose::from_tuple([0.1, -0.2, 0.6, rot[0], rot[1], rot[2]], code)
                        .expect("pose"),
                    score: 0.75,
                };
                let m = PoseExtractor.extract(&raw, &header);
                assert_eq!(m.orientation, UnitQuaternion::identity());
                assert_eq!(m.position, Point3::new(0.1, -0.2, 0.6));
                assert_eq!(m.score, 0.75);
                assert_eq!(m.header, header);
            }
        }
    }
}

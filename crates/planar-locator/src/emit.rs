//! Per-frame output records and the emitter boundary.

use std::io::Write;

use planar_locator_core::{FrameHeader, Stamp};
use serde::{Deserialize, Serialize};

use crate::error::LocatorError;
use crate::pose::DetectionMatch;

/// Edge lengths of the visualization box, meters.
pub const MARKER_SIZE: [f64; 3] = [0.01, 0.01, 0.005];
/// RGBA color of the visualization box.
pub const MARKER_COLOR: [f32; 4] = [0.0, 1.0, 0.0, 1.0];
/// Display lifetime of a visualization box, seconds.
pub const MARKER_LIFETIME_SECS: f64 = 1.0;

/// Structured detection record, one per match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub score: f64,
    /// `[x, y, z]`, meters.
    pub position: [f64; 3],
    /// Quaternion `[x, y, z, w]`.
    pub orientation: [f64; 4],
    pub frame_id: String,
    pub stamp: Stamp,
}

impl From<&DetectionMatch> for DetectionRecord {
    fn from(m: &DetectionMatch) -> Self {
        let q = m.orientation.quaternion();
        Self {
            score: m.score,
            position: [m.position.x, m.position.y, m.position.z],
            orientation: [q.i, q.j, q.k, q.w],
            frame_id: m.header.frame_id.clone(),
            stamp: m.header.stamp,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerShape {
    Box,
}

/// Transient visualization primitive for one detection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisualizationMarker {
    /// Index of the detection within its frame.
    pub id: usize,
    pub shape: MarkerShape,
    pub size: [f64; 3],
    pub color: [f32; 4],
    pub lifetime_secs: f64,
    pub position: [f64; 3],
    pub orientation: [f64; 4],
    pub frame_id: String,
    pub stamp: Stamp,
}

impl VisualizationMarker {
    pub fn for_record(id: usize, record: &DetectionRecord) -> Self {
        Self {
            id,
            shape: MarkerShape::Box,
            size: MARKER_SIZE,
            color: MARKER_COLOR,
            lifetime_secs: MARKER_LIFETIME_SECS,
            position: record.position,
            orientation: record.orientation,
            frame_id: record.frame_id.clone(),
            stamp: record.stamp,
        }
    }
}

/// Everything emitted for one frame; `records` and `markers` are parallel.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameOutput {
    pub header: FrameHeader,
    pub records: Vec<DetectionRecord>,
    pub markers: Vec<VisualizationMarker>,
}

impl FrameOutput {
    /// Output with no detections.
    pub fn empty(header: FrameHeader) -> Self {
        Self {
            header,
            records: Vec::new(),
            markers: Vec::new(),
        }
    }

    /// Records and markers in match order.
    pub fn from_matches(header: FrameHeader, matches: &[DetectionMatch]) -> Self {
        let records: Vec<DetectionRecord> = matches.iter().map(DetectionRecord::from).collect();
        let markers = records
            .iter()
            .enumerate()
            .map(|(id, r)| VisualizationMarker::for_record(id, r))
            .collect();
        Self {
            header,
            records,
            markers,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Consumer of per-frame output (transport, files, in-memory collection).
pub trait ResultEmitter {
    fn emit(&mut self, output: &FrameOutput) -> Result<(), LocatorError>;
}

impl ResultEmitter for Vec<FrameOutput> {
    fn emit(&mut self, output: &FrameOutput) -> Result<(), LocatorError> {
        self.push(output.clone());
        Ok(())
    }
}

/// Writes one compact JSON object per frame, newline separated.
#[derive(Debug)]
pub struct JsonLinesEmitter<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResultEmitter for JsonLinesEmitter<W> {
    fn emit(&mut self, output: &FrameOutput) -> Result<(), LocatorError> {
        serde_json::to_writer(&mut self.writer, output)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, UnitQuaternion};

    fn header() -> FrameHeader {
        FrameHeader {
            stamp: Stamp::new(3, 14),
            frame_id: "cam0".into(),
        }
    }

    fn detection(score: f64, x: f64) -> DetectionMatch {
        DetectionMatch {
            score,
            position: Point3::new(x, 0.02, 0.6),
            orientation: UnitQuaternion::identity(),
            header: header(),
        }
    }

    #[test]
    fn records_and_markers_follow_match_order() {
        let out = FrameOutput::from_matches(header(), &[detection(0.9, 0.1), detection(0.7, -0.1)]);
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.markers.len(), 2);
        assert_eq!(out.records[0].score, 0.9);
        assert_eq!(out.records[1].position, [-0.1, 0.02, 0.6]);
        assert_eq!(out.records[0].orientation, [0.0, 0.0, 0.0, 1.0]);
        for (i, m) in out.markers.iter().enumerate() {
            assert_eq!(m.id, i);
            assert_eq!(m.shape, MarkerShape::Box);
            assert_eq!(m.size, [0.01, 0.01, 0.005]);
            assert_eq!(m.color, [0.0, 1.0, 0.0, 1.0]);
            assert_eq!(m.lifetime_secs, 1.0);
            assert_eq!(m.position, out.records[i].position);
            assert_eq!(m.frame_id, "cam0");
        }
    }

    #[test]
    fn json_lines_writes_one_line_per_frame() {
        let mut emitter = JsonLinesEmitter::new(Vec::new());
        emitter
            .emit(&FrameOutput::from_matches(header(), &[detection(0.8, 0.0)]))
            .expect("emit");
        emitter.emit(&FrameOutput::empty(header())).expect("emit");
        let text = String::from_utf8(emitter.into_inner()).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: FrameOutput = serde_json::from_str(lines[0]).expect("json");
        assert_eq!(first.records.len(), 1);
        let second: FrameOutput = serde_json::from_str(lines[1]).expect("json");
        assert!(second.is_empty() && second.markers.is_empty());
    }
}

//! Synthetic calibrated scenes shared by unit tests.

use planar_locator_core::{
    CalibrationSource, CalibrationStore, GrayImage, IntrinsicsSource, PoseSource, Roi,
};

pub(crate) const SMALL_ROI: Roi = Roi {
    top: 215.0,
    left: 285.0,
    bottom: 265.0,
    right: 355.0,
};

/// 640x480 division-model camera about 0.63 m above the plane.
pub(crate) fn small_calibration_source() -> CalibrationSource {
    CalibrationSource {
        intrinsics: IntrinsicsSource {
            model: "area_scan_division".into(),
            focus: 0.0164374,
            kappa: -102.241,
            sx: 2.2082e-5,
            sy: 2.208e-5,
            cx: None,
            cy: None,
            width: 640,
            height: 480,
        },
        pose: PoseSource {
            translation: [0.0188459, -0.0116134, 0.631195],
            rotation_deg: [356.449, 359.438, 269.594],
            pose_type: 0,
        },
    }
}

pub(crate) fn small_calibration() -> CalibrationStore {
    CalibrationStore::load(small_calibration_source()).expect("calibration")
}

/// Bright 60x40 plate with two dark cut-outs, centered at `(cx, cy)`.
pub(crate) fn paint_marker(img: &mut GrayImage, cx: usize, cy: usize) {
    for y in cy - 20..cy + 20 {
        for x in cx - 30..cx + 30 {
            img.set(x, y, 230);
        }
    }
    for y in cy - 8..cy + 12 {
        for x in cx - 18..cx - 2 {
            img.set(x, y, 20);
        }
    }
    for y in cy - 12..cy - 4 {
        for x in cx + 6..cx + 22 {
            img.set(x, y, 20);
        }
    }
}

pub(crate) fn small_scene(centers: &[(usize, usize)]) -> GrayImage {
    let mut img = GrayImage::filled(640, 480, 60);
    for &(cx, cy) in centers {
        paint_marker(&mut img, cx, cy);
    }
    img
}

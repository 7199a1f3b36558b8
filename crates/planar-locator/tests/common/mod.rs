#![allow(dead_code)]

use planar_locator::core::{IntrinsicsSource, PoseSource};
use planar_locator::{CalibrationSource, CalibrationStore, GrayImage, Roi};

pub const SMALL_SIZE: (usize, usize) = (640, 480);
pub const SMALL_CENTER: (usize, usize) = (320, 240);
pub const SMALL_ROI: Roi = Roi {
    top: 215.0,
    left: 285.0,
    bottom: 265.0,
    right: 355.0,
};

pub const FULL_SIZE: (usize, usize) = (4096, 3000);
pub const FULL_ROI: Roi = Roi {
    top: 1445.2,
    left: 2705.64,
    bottom: 1520.33,
    right: 2825.26,
};

pub const BACKGROUND: u8 = 60;

fn camera_pose() -> PoseSource {
    PoseSource {
        translation: [0.0188459, -0.0116134, 0.631195],
        rotation_deg: [356.449, 359.438, 269.594],
        pose_type: 0,
    }
}

/// The production camera: division model, 4096x3000 sensor.
pub fn full_calibration_source() -> CalibrationSource {
    CalibrationSource {
        intrinsics: IntrinsicsSource {
            model: "area_scan_division".into(),
            focus: 0.0164374,
            kappa: -102.241,
            sx: 3.45033e-6,
            sy: 3.45e-6,
            cx: None,
            cy: None,
            width: 4096,
            height: 3000,
        },
        pose: camera_pose(),
    }
}

/// Same optics binned down to 640x480.
pub fn small_calibration_source() -> CalibrationSource {
    CalibrationSource {
        intrinsics: IntrinsicsSource {
            model: "division".into(),
            focus: 0.0164374,
            kappa: -102.241,
            sx: 2.2082e-5,
            sy: 2.208e-5,
            cx: None,
            cy: None,
            width: 640,
            height: 480,
        },
        pose: camera_pose(),
    }
}

pub fn calibration(source: CalibrationSource) -> CalibrationStore {
    CalibrationStore::load(source).expect("calibration")
}

/// Bright `2*hw x 2*hh` plate with two dark cut-outs, centered at `(cx, cy)`.
pub fn paint_plate(img: &mut GrayImage, cx: usize, cy: usize, hw: usize, hh: usize) {
    for y in cy - hh..cy + hh {
        for x in cx - hw..cx + hw {
            img.set(x, y, 230);
        }
    }
    // left cut-out, lower half
    for y in cy - hh / 3..cy + hh * 3 / 5 {
        for x in cx - hw * 3 / 5..cx - hw / 15 {
            img.set(x, y, 20);
        }
    }
    // right cut-out, upper half
    for y in cy - hh * 3 / 5..cy - hh / 5 {
        for x in cx + hw / 5..cx + hw * 3 / 4 {
            img.set(x, y, 20);
        }
    }
}

/// [`paint_plate`] rotated by `angle` (radians) and scaled about `(cx, cy)`,
/// with 4x4 supersampling.
pub fn paint_warped_plate(
    img: &mut GrayImage,
    (cx, cy): (usize, usize),
    (hw, hh): (usize, usize),
    angle: f64,
    scale: f64,
) {
    let (w, h) = (hw as f64, hh as f64);
    // cut-out bounds in the same integer steps paint_plate uses
    let cuts = [
        [-((hw * 3 / 5) as f64), -((hw / 15) as f64), -((hh / 3) as f64), (hh * 3 / 5) as f64],
        [(hw / 5) as f64, (hw * 3 / 4) as f64, -((hh * 3 / 5) as f64), -((hh / 5) as f64)],
    ];
    let value = |u: f64, v: f64| {
        // pixel k covers [k - 0.5, k + 0.5)
        let inside = |x0: f64, x1: f64, y0: f64, y1: f64| {
            u >= x0 - 0.5 && u < x1 - 0.5 && v >= y0 - 0.5 && v < y1 - 0.5
        };
        if cuts.iter().any(|c| inside(c[0], c[1], c[2], c[3])) {
            20.0
        } else if inside(-w, w, -h, h) {
            230.0
        } else {
            BACKGROUND as f64
        }
    };
    let (s, c) = angle.sin_cos();
    let reach = ((w.hypot(h) + 2.0) * scale).ceil() as usize;
    for y in cy - reach..=cy + reach {
        for x in cx - reach..=cx + reach {
            let mut sum = 0.0;
            for sy in 0..4 {
                for sx in 0..4 {
                    let dx = x as f64 - cx as f64 + (sx as f64 - 1.5) / 4.0;
                    let dy = y as f64 - cy as f64 + (sy as f64 - 1.5) / 4.0;
                    sum += value((c * dx + s * dy) / scale, (-s * dx + c * dy) / scale);
                }
            }
            img.set(x, y, (sum / 16.0).round() as u8);
        }
    }
}

pub fn small_scene(centers: &[(usize, usize)]) -> GrayImage {
    let mut img = GrayImage::filled(SMALL_SIZE.0, SMALL_SIZE.1, BACKGROUND);
    for &(cx, cy) in centers {
        paint_plate(&mut img, cx, cy, 30, 20);
    }
    img
}

/// Full-size reference: one plate filling most of [`FULL_ROI`].
pub fn full_reference() -> GrayImage {
    let mut img = GrayImage::filled(FULL_SIZE.0, FULL_SIZE.1, BACKGROUND);
    paint_plate(&mut img, 2765, 1483, 50, 28);
    img
}

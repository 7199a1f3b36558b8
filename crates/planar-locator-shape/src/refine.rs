//! Least-squares subpixel pose refinement against image edges.

use nalgebra::{Matrix4, Vector4};

use crate::gradient::{parabola_peak, GradientField};
use crate::params::{Polarity, SearchParams};
use crate::template::LevelModel;

const MAX_ITERATIONS: usize = 5;
const MIN_OBSERVATIONS: usize = 6;
/// Largest accepted translation away from the discrete pose, pixels.
const MAX_SHIFT: f64 = 1.5;
const SEARCH_HALF_WIDTH: i32 = 2;
const MIN_DIRECTION_AGREEMENT: f32 = 0.5;

/// Continuous pose of the level-0 anchor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Pose {
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub scale: f64,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Refined {
    pub pose: Pose,
    /// RMS point-to-edge distance in pixels.
    pub residual: f64,
}

struct Observation {
    normal: (f64, f64),
    rotated: (f64, f64),
    distance: f64,
}

/// Locate the image edge along each posed model normal.
fn observe(level: &LevelModel, grad: &GradientField, pose: &Pose, polarity: Polarity) -> Vec<Observation> {
    let (s, c) = pose.angle.sin_cos();
    let mut out = Vec::with_capacity(level.points.len());
    for p in &level.points {
        let (ox, oy) = (p.ox as f64, p.oy as f64);
        let rotated = (c * ox - s * oy, s * ox + c * oy);
        let normal = (c * p.dx as f64 - s * p.dy as f64, s * p.dx as f64 + c * p.dy as f64);
        let qx = pose.x + pose.scale * rotated.0;
        let qy = pose.y + pose.scale * rotated.1;

        let mut best: Option<(i32, f32)> = None;
        for t in -SEARCH_HALF_WIDTH..=SEARCH_HALF_WIDTH {
            let sx = qx + t as f64 * normal.0;
            let sy = qy + t as f64 * normal.1;
            let (gx, gy) = grad.at(sx.round() as i32, sy.round() as i32);
            let m = (gx * gx + gy * gy).sqrt();
            if m <= 0.0 {
                continue;
            }
            let agree = (gx * normal.0 as f32 + gy * normal.1 as f32) / m;
            let agree = match polarity {
                Polarity::UsePolarity => agree,
                _ => agree.abs(),
            };
            if agree <= MIN_DIRECTION_AGREEMENT {
                continue;
            }
            let mag = grad.magnitude_bilinear(sx, sy);
            if best.is_none_or(|(_, b)| mag > b) {
                best = Some((t, mag));
            }
        }
        let Some((t, mag)) = best else { continue };
        let at = |u: f64| grad.magnitude_bilinear(qx + u * normal.0, qy + u * normal.1);
        let tf = t as f64;
        let dt = parabola_peak(at(tf - 1.0), mag, at(tf + 1.0)) as f64;
        out.push(Observation {
            normal,
            rotated,
            distance: tf + dt,
        });
    }
    out
}

fn rms(obs: &[Observation]) -> f64 {
    if obs.is_empty() {
        return 0.0;
    }
    (obs.iter().map(|o| o.distance * o.distance).sum::<f64>() / obs.len() as f64).sqrt()
}

/// Gauss-Newton refinement of `(x, y, angle, scale)` minimizing the
/// point-to-edge distance along model normals.
///
/// Returns `None` when too few edges are observed, the normal equations are
/// singular, or the pose drifts more than [`MAX_SHIFT`] pixels.
pub(crate) fn refine_pose(
    level: &LevelModel,
    grad: &GradientField,
    start: Pose,
    polarity: Polarity,
    params: &SearchParams,
) -> Option<Refined> {
    let fixed_scale = params.scale.is_fixed();
    let mut pose = start;
    for _ in 0..MAX_ITERATIONS {
        let obs = observe(level, grad, &pose, polarity);
        if obs.len() < MIN_OBSERVATIONS {
            return None;
        }
        let mut jtj = Matrix4::<f64>::zeros();
        let mut jtr = Vector4::<f64>::zeros();
        for o in &obs {
            let (nx, ny) = o.normal;
            let (rx, ry) = o.rotated;
            let d_angle = pose.scale * (-ry * nx + rx * ny);
            let d_scale = if fixed_scale { 0.0 } else { rx * nx + ry * ny };
            let j = Vector4::new(nx, ny, d_angle, d_scale);
            jtj += j * j.transpose();
            jtr += j * o.distance;
        }
        if fixed_scale {
            jtj[(3, 3)] += 1.0;
        }
        let delta = jtj.cholesky()?.solve(&jtr);
        pose.x += delta[0];
        pose.y += delta[1];
        pose.angle = params.angle.clamp(pose.angle + delta[2]);
        pose.scale = params.scale.clamp(pose.scale + delta[3]);
        if (pose.x - start.x).hypot(pose.y - start.y) > MAX_SHIFT {
            return None;
        }
        if delta[0].abs() < 1e-3 && delta[1].abs() < 1e-3 && delta[2].abs() < 1e-5 && delta[3].abs() < 1e-5 {
            break;
        }
    }
    let obs = observe(level, grad, &pose, polarity);
    if obs.len() < MIN_OBSERVATIONS {
        return None;
    }
    Some(Refined {
        pose,
        residual: rms(&obs),
    })
}

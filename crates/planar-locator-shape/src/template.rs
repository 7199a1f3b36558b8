//! Template construction: per-level edge points with gradient directions.

use std::collections::VecDeque;

use nalgebra::Point2;
use planar_locator_core::{GrayImageView, Roi};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::error::ShapeError;
use crate::gradient::{parabola_peak, GradientField};
use crate::params::{Polarity, TemplateParams};
use crate::pyramid::{to_level, Pyramid};

/// Fewest edge points a pyramid level may carry.
pub const MIN_LEVEL_POINTS: usize = 8;

/// Edge point relative to the level anchor, with unit gradient direction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ModelPoint {
    pub ox: f32,
    pub oy: f32,
    pub dx: f32,
    pub dy: f32,
}

#[derive(Clone, Debug)]
pub(crate) struct LevelModel {
    pub points: Vec<ModelPoint>,
    /// Reference point minus the integer anchor, in level pixels.
    pub ref_offset: (f64, f64),
    /// Largest anchor-to-point distance.
    pub radius: f64,
    /// `[min_x, min_y, max_x, max_y]` of the point offsets.
    pub bbox: [f64; 4],
}

/// Immutable shape template produced by [`crate::EdgeShapeEngine`].
#[derive(Clone, Debug)]
pub struct ShapeTemplate {
    pub(crate) levels: Vec<LevelModel>,
    pub(crate) polarity: Polarity,
    image_size: (usize, usize),
    reference: Point2<f64>,
    contours: Vec<Vec<Point2<f64>>>,
}

impl ShapeTemplate {
    /// Pyramid levels actually used by the template.
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Edge points at a pyramid level.
    pub fn num_points(&self, level: usize) -> usize {
        self.levels.get(level).map_or(0, |l| l.points.len())
    }

    /// Size of the reference image the template was learned from.
    pub fn image_size(&self) -> (usize, usize) {
        self.image_size
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }
}

/// Geometry every template exposes to callers, independent of the engine.
pub trait TemplateGeometry {
    /// Reference point (region-of-interest centroid) in reference-image
    /// pixels (`x = column`, `y = row`).
    fn reference_point(&self) -> Point2<f64>;
    /// Level-0 edge chains in reference-image pixels.
    fn contours(&self) -> &[Vec<Point2<f64>>];
}

impl TemplateGeometry for ShapeTemplate {
    fn reference_point(&self) -> Point2<f64> {
        self.reference
    }

    fn contours(&self) -> &[Vec<Point2<f64>>] {
        &self.contours
    }
}

#[derive(Clone, Copy, Debug)]
struct EdgePixel {
    pos: Point2<f64>,
    dir: (f32, f32),
}

/// Neighbor step along the quantized gradient direction.
fn gradient_step(gx: f32, gy: f32) -> (i32, i32) {
    const TAN_22_5: f32 = 0.414_213_57;
    let (ax, ay) = (gx.abs(), gy.abs());
    if ay <= TAN_22_5 * ax {
        (1, 0)
    } else if ax <= TAN_22_5 * ay {
        (0, 1)
    } else if gx * gy > 0.0 {
        (1, 1)
    } else {
        (1, -1)
    }
}

/// Thinned, hysteresis-filtered edge chains inside `roi` (level pixels).
///
/// Chains are 8-connected sets of non-maximum-suppressed pixels with
/// magnitude `>= low` containing at least one pixel `>= high`; chains shorter
/// than `min_size` are dropped. Output order is deterministic: chains by
/// raster order of their first pixel, pixels in breadth-first order.
fn extract_edge_chains(
    grad: &GradientField,
    roi: &Roi,
    contrast: [f32; 2],
    min_size: usize,
) -> Vec<Vec<EdgePixel>> {
    let [low, high] = contrast;
    if grad.width < 3 || grad.height < 3 {
        return Vec::new();
    }
    let x0 = roi.left.ceil().max(1.0) as i64;
    let y0 = roi.top.ceil().max(1.0) as i64;
    let x1 = roi.right.floor().min(grad.width as f64 - 2.0) as i64;
    let y1 = roi.bottom.floor().min(grad.height as f64 - 2.0) as i64;
    if x0 > x1 || y0 > y1 {
        return Vec::new();
    }
    let (rw, rh) = ((x1 - x0 + 1) as usize, (y1 - y0 + 1) as usize);

    // 0 = no edge, 1 = weak, 2 = strong
    let mut class = vec![0u8; rw * rh];
    for ry in 0..rh {
        for rx in 0..rw {
            let (x, y) = (x0 as i32 + rx as i32, y0 as i32 + ry as i32);
            let (gx, gy) = grad.at(x, y);
            let m = (gx * gx + gy * gy).sqrt();
            if m < low {
                continue;
            }
            let (sx, sy) = gradient_step(gx, gy);
            let prev = grad.magnitude(x - sx, y - sy);
            let next = grad.magnitude(x + sx, y + sy);
            if m > prev && m >= next {
                class[ry * rw + rx] = if m >= high { 2 } else { 1 };
            }
        }
    }

    let mut visited = vec![false; rw * rh];
    let mut chains = Vec::new();
    let mut queue = VecDeque::new();
    for seed in 0..rw * rh {
        if class[seed] == 0 || visited[seed] {
            continue;
        }
        visited[seed] = true;
        queue.push_back(seed);
        let mut members = Vec::new();
        let mut strong = false;
        while let Some(i) = queue.pop_front() {
            members.push(i);
            strong |= class[i] == 2;
            let (cx, cy) = ((i % rw) as i64, (i / rw) as i64);
            for ny in (cy - 1).max(0)..=(cy + 1).min(rh as i64 - 1) {
                for nx in (cx - 1).max(0)..=(cx + 1).min(rw as i64 - 1) {
                    let j = ny as usize * rw + nx as usize;
                    if class[j] != 0 && !visited[j] {
                        visited[j] = true;
                        queue.push_back(j);
                    }
                }
            }
        }
        if !strong || members.len() < min_size {
            continue;
        }
        let chain = members
            .into_iter()
            .map(|i| {
                let x = x0 as i32 + (i % rw) as i32;
                let y = y0 as i32 + (i / rw) as i32;
                subpixel_edge(grad, x, y)
            })
            .collect();
        chains.push(chain);
    }
    chains
}

fn subpixel_edge(grad: &GradientField, x: i32, y: i32) -> EdgePixel {
    let (gx, gy) = grad.at(x, y);
    let m = (gx * gx + gy * gy).sqrt();
    let (ux, uy) = (gx / m, gy / m);
    let (xf, yf) = (x as f64, y as f64);
    let a = grad.magnitude_bilinear(xf - ux as f64, yf - uy as f64);
    let c = grad.magnitude_bilinear(xf + ux as f64, yf + uy as f64);
    let t = parabola_peak(a, m, c) as f64;
    EdgePixel {
        pos: Point2::new(xf + t * ux as f64, yf + t * uy as f64),
        dir: (ux, uy),
    }
}

fn level_model(points: Vec<EdgePixel>, reference: (f64, f64)) -> LevelModel {
    let anchor = (reference.0.round(), reference.1.round());
    let mut bbox = [f64::MAX, f64::MAX, f64::MIN, f64::MIN];
    let mut radius = 0.0_f64;
    let points = points
        .into_iter()
        .map(|p| {
            let ox = p.pos.x - anchor.0;
            let oy = p.pos.y - anchor.1;
            bbox = [bbox[0].min(ox), bbox[1].min(oy), bbox[2].max(ox), bbox[3].max(oy)];
            radius = radius.max(ox.hypot(oy));
            ModelPoint {
                ox: ox as f32,
                oy: oy as f32,
                dx: p.dir.0,
                dy: p.dir.1,
            }
        })
        .collect();
    LevelModel {
        points,
        ref_offset: (reference.0 - anchor.0, reference.1 - anchor.1),
        radius,
        bbox,
    }
}

/// Learn a shape template from the edges of `reference` inside `roi`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(reference, roi, params), fields(width = reference.width, height = reference.height))
)]
pub(crate) fn build_template(
    reference: &GrayImageView<'_>,
    roi: &Roi,
    params: &TemplateParams,
) -> Result<ShapeTemplate, ShapeError> {
    if !roi.is_finite() || roi.width() <= 0.0 || roi.height() <= 0.0 {
        return Err(ShapeError::EmptyRoi {
            width: roi.width(),
            height: roi.height(),
        });
    }
    if !roi.fits_within(reference.width, reference.height) {
        return Err(ShapeError::RoiOutOfBounds {
            width: reference.width,
            height: reference.height,
        });
    }
    if params.num_levels == 0 {
        return Err(ShapeError::InvalidParams("num_levels must be >= 1"));
    }
    let [low, high] = params.contrast;
    if !(low.is_finite() && high.is_finite() && low > 0.0 && low <= high) {
        return Err(ShapeError::InvalidParams("contrast must satisfy 0 < low <= high"));
    }

    let requested = Pyramid::usable_levels(reference.width, reference.height, params.num_levels);
    let mut pyramid = Pyramid::default();
    pyramid.rebuild(reference, requested)?;

    let reference_point = roi.centroid();
    let stride = params.point_reduction.stride();
    let mut levels = Vec::with_capacity(requested);
    let mut contours = Vec::new();

    for level in 0..requested {
        let img = pyramid.level(reference, level);
        let grad = GradientField::from_view(&img)?;
        let min_size = (params.min_component_size >> level).max(1);
        let chains = extract_edge_chains(&grad, &roi.at_level(level), params.contrast, min_size);
        if level == 0 {
            contours = chains
                .iter()
                .map(|c| c.iter().map(|p| p.pos).collect())
                .collect();
        }

        let all: Vec<EdgePixel> = chains.into_iter().flatten().collect();
        let stride = if all.len() / stride >= MIN_LEVEL_POINTS {
            stride
        } else {
            1
        };
        let points: Vec<EdgePixel> = all.into_iter().step_by(stride).collect();
        if points.len() < MIN_LEVEL_POINTS {
            if level == 0 {
                return Err(ShapeError::NoEdges {
                    found: points.len(),
                    needed: MIN_LEVEL_POINTS,
                });
            }
            log::debug!("template: level {level} has {} points, stopping", points.len());
            break;
        }

        let reference_l = (
            to_level(reference_point.x, level),
            to_level(reference_point.y, level),
        );
        log::debug!("template: level {level} with {} points", points.len());
        levels.push(level_model(points, reference_l));
    }

    Ok(ShapeTemplate {
        levels,
        polarity: params.polarity,
        image_size: (reference.width, reference.height),
        reference: reference_point,
        contours,
    })
}

//! Coarse-to-fine pose search over the gradient pyramid.

use std::cmp::Ordering;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::gradient::GradientField;
use crate::params::SearchParams;
use crate::refine::{refine_pose, Pose};
use crate::score::{PosedModel, Scorer};
use crate::template::{LevelModel, ShapeTemplate};

/// Score threshold factor applied on pyramid levels above 0.
const COARSE_SCORE_FACTOR: f64 = 0.8;
/// Translation search half-width when descending one level, pixels.
const DESCENT_RADIUS: i32 = 2;

/// One located template instance.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeMatch {
    /// Template reference point in the searched image (`x = column`, `y = row`).
    pub position: Point2<f64>,
    /// Rotation of the instance relative to the template, radians.
    pub angle: f64,
    pub scale: f64,
    /// Similarity in `[0, 1]` (mean gradient-direction cosine).
    pub score: f64,
    /// RMS edge distance after subpixel refinement; `0` when not refined.
    pub residual: f64,
    /// Index of the coarse candidate this match descends from.
    pub candidate: usize,
    /// Axis-aligned bounds of the posed template, `[min_x, min_y, max_x, max_y]`.
    pub bbox: [f64; 4],
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    x: i32,
    y: i32,
    angle: f64,
    scale: f64,
    score: f64,
    /// Grid indices used only for ordering ties at the top level.
    angle_idx: usize,
    scale_idx: usize,
    index: usize,
}

fn rotate(angle: f64, scale: f64, v: (f64, f64)) -> (f64, f64) {
    let (s, c) = angle.sin_cos();
    (scale * (c * v.0 - s * v.1), scale * (s * v.0 + c * v.1))
}

/// Reference point of a candidate in its own level.
fn reference_at(level: &LevelModel, x: f64, y: f64, angle: f64, scale: f64) -> (f64, f64) {
    let (rx, ry) = rotate(angle, scale, level.ref_offset);
    (x + rx, y + ry)
}

fn score_threshold(params: &SearchParams, level: usize) -> f64 {
    if level == 0 {
        params.min_score
    } else {
        params.min_score * COARSE_SCORE_FACTOR
    }
}

/// Angle and scale steps per level: coarser levels take larger steps, bounded
/// by the angular and scale resolution of the level model.
fn level_steps(template: &ShapeTemplate, params: &SearchParams) -> Vec<(f64, f64)> {
    template
        .levels
        .iter()
        .enumerate()
        .map(|(l, lm)| {
            let r = lm.radius.max(1.0);
            let mul = (1u32 << l) as f64;
            let angle = (params.angle.step * mul)
                .min(2.0 * (1.0 / r).atan())
                .max(params.angle.step);
            let scale = (params.scale.step * mul).min(2.0 / r).max(params.scale.step);
            (angle, scale)
        })
        .collect()
}

struct Searcher<'a> {
    template: &'a ShapeTemplate,
    params: &'a SearchParams,
    scorer: Scorer,
    steps: Vec<(f64, f64)>,
}

impl Searcher<'_> {
    fn exhaustive_top(&self, grad: &GradientField) -> Vec<Candidate> {
        let (template, params, scorer) = (self.template, self.params, &self.scorer);
        let top = template.levels.len() - 1;
        let steps = self.steps[top];
        let level = &template.levels[top];
        let threshold = score_threshold(params, top);
        let angles = params.angle.grid(steps.0, 0.0);
        let scales = params.scale.grid(steps.1, 1.0);

        let mut found = Vec::new();
        let mut posed = PosedModel::default();
        for (angle_idx, &angle) in angles.iter().enumerate() {
            for (scale_idx, &scale) in scales.iter().enumerate() {
                posed.set(level, angle, scale);
                for y in 0..grad.height as i32 {
                    for x in 0..grad.width as i32 {
                        if let Some(score) = scorer.score(&posed, grad, x, y, threshold) {
                            found.push(Candidate {
                                x,
                                y,
                                angle,
                                scale,
                                score,
                                angle_idx,
                                scale_idx,
                                index: 0,
                            });
                        }
                    }
                }
            }
        }
        log::debug!(
            "search: level {top}, {} poses, {} raw hits",
            angles.len() * scales.len(),
            found.len()
        );

        found.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.y.cmp(&b.y))
                .then(a.x.cmp(&b.x))
                .then(a.angle_idx.cmp(&b.angle_idx))
                .then(a.scale_idx.cmp(&b.scale_idx))
        });

        let radius = (0.5 * level.radius).max(1.5);
        let mut kept: Vec<Candidate> = Vec::new();
        for c in found {
            if kept.len() >= params.max_candidates {
                break;
            }
            let (cx, cy) = reference_at(level, c.x as f64, c.y as f64, c.angle, c.scale);
            let close = kept.iter().any(|k| {
                let (kx, ky) = reference_at(level, k.x as f64, k.y as f64, k.angle, k.scale);
                (kx - cx).hypot(ky - cy) < radius
            });
            if !close {
                kept.push(Candidate {
                    index: kept.len(),
                    ..c
                });
            }
        }
        kept
    }

    /// Best pose in the neighborhood of `cand` at `level`, where `cand` lives on
    /// `level + 1`.
    fn descend(
        &self,
        grad: &GradientField,
        level: usize,
        cand: &Candidate,
        posed: &mut PosedModel,
    ) -> Option<Candidate> {
        let (template, params, scorer) = (self.template, self.params, &self.scorer);
        let steps = self.steps[level];
        let coarse = &template.levels[level + 1];
        let fine = &template.levels[level];
        let (rx, ry) = reference_at(coarse, cand.x as f64, cand.y as f64, cand.angle, cand.scale);
        let (fx, fy) = (2.0 * rx + 0.5, 2.0 * ry + 0.5);
        let threshold = score_threshold(params, level);

        let mut best: Option<Candidate> = None;
        for da in -1..=1 {
            let angle = params.angle.clamp(cand.angle + da as f64 * steps.0);
            for ds in -1..=1 {
                let scale = params.scale.clamp(cand.scale + ds as f64 * steps.1);
                posed.set(fine, angle, scale);
                let (ox, oy) = rotate(angle, scale, fine.ref_offset);
                let (ax, ay) = ((fx - ox).round() as i32, (fy - oy).round() as i32);
                for dy in -DESCENT_RADIUS..=DESCENT_RADIUS {
                    for dx in -DESCENT_RADIUS..=DESCENT_RADIUS {
                        let bar = best.map_or(threshold, |b| b.score.max(threshold));
                        let Some(score) = scorer.score(posed, grad, ax + dx, ay + dy, bar) else {
                            continue;
                        };
                        if best.is_none_or(|b| score > b.score) {
                            best = Some(Candidate {
                                x: ax + dx,
                                y: ay + dy,
                                angle,
                                scale,
                                score,
                                ..*cand
                            });
                        }
                    }
                }
            }
        }
        best
    }
}

fn posed_bbox(level: &LevelModel, x: f64, y: f64, angle: f64, scale: f64) -> [f64; 4] {
    let [x0, y0, x1, y1] = level.bbox;
    let mut out = [f64::MAX, f64::MAX, f64::MIN, f64::MIN];
    for corner in [(x0, y0), (x1, y0), (x1, y1), (x0, y1)] {
        let (cx, cy) = rotate(angle, scale, corner);
        out = [
            out[0].min(x + cx),
            out[1].min(y + cy),
            out[2].max(x + cx),
            out[3].max(y + cy),
        ];
    }
    out
}

fn bbox_area(b: &[f64; 4]) -> f64 {
    (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0)
}

/// Fraction of the smaller box covered by the intersection.
pub(crate) fn overlap_ratio(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let inter = [a[0].max(b[0]), a[1].max(b[1]), a[2].min(b[2]), a[3].min(b[3])];
    let ia = bbox_area(&inter);
    if ia <= 0.0 {
        return 0.0;
    }
    let denom = bbox_area(a).min(bbox_area(b));
    if denom <= 0.0 {
        1.0
    } else {
        ia / denom
    }
}

fn match_order(a: &ShapeMatch, b: &ShapeMatch) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then(a.residual.total_cmp(&b.residual))
        .then(a.candidate.cmp(&b.candidate))
}

/// Run the full search over precomputed per-level gradient fields.
pub(crate) fn run_search(
    template: &ShapeTemplate,
    grads: &[GradientField],
    params: &SearchParams,
) -> Vec<ShapeMatch> {
    let levels = template.levels.len();
    if levels == 0 || grads.len() < levels {
        return Vec::new();
    }
    let searcher = Searcher {
        template,
        params,
        scorer: Scorer::new(template.polarity, params.min_contrast, params.greediness),
        steps: level_steps(template, params),
    };
    let top = levels - 1;

    let mut cands = searcher.exhaustive_top(&grads[top]);
    let mut posed = PosedModel::default();
    for level in (0..top).rev() {
        cands = cands
            .iter()
            .filter_map(|c| searcher.descend(&grads[level], level, c, &mut posed))
            .collect();
        log::debug!("search: level {level}, {} candidates survive", cands.len());
    }

    let base = &template.levels[0];
    let mut matches: Vec<ShapeMatch> = cands
        .iter()
        .filter(|c| c.score >= params.min_score)
        .map(|c| {
            let start = Pose {
                x: c.x as f64,
                y: c.y as f64,
                angle: c.angle,
                scale: c.scale,
            };
            let (pose, residual) = if params.subpixel {
                match refine_pose(base, &grads[0], start, template.polarity, params) {
                    Some(r) => (r.pose, r.residual),
                    None => (start, 0.0),
                }
            } else {
                (start, 0.0)
            };
            let (px, py) = reference_at(base, pose.x, pose.y, pose.angle, pose.scale);
            ShapeMatch {
                position: Point2::new(px, py),
                angle: pose.angle,
                scale: pose.scale,
                score: c.score,
                residual,
                candidate: c.index,
                bbox: posed_bbox(base, pose.x, pose.y, pose.angle, pose.scale),
            }
        })
        .collect();
    matches.sort_by(match_order);

    let mut kept: Vec<ShapeMatch> = Vec::with_capacity(params.max_matches);
    for m in matches {
        if kept.len() >= params.max_matches {
            break;
        }
        if kept
            .iter()
            .all(|k| overlap_ratio(&k.bbox, &m.bbox) <= params.max_overlap)
        {
            kept.push(m);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_ratio_uses_smaller_box() {
        let big = [0.0, 0.0, 10.0, 10.0];
        let small = [8.0, 8.0, 12.0, 12.0];
        assert!((overlap_ratio(&big, &small) - 0.25).abs() < 1e-12);
        assert_eq!(overlap_ratio(&big, &[20.0, 20.0, 30.0, 30.0]), 0.0);
        // touching edges do not overlap
        assert_eq!(overlap_ratio(&big, &[10.0, 0.0, 20.0, 10.0]), 0.0);
    }

    #[test]
    fn matches_order_by_score_then_residual_then_candidate() {
        let m = |score, residual, candidate| ShapeMatch {
            position: Point2::origin(),
            angle: 0.0,
            scale: 1.0,
            score,
            residual,
            candidate,
            bbox: [0.0; 4],
        };
        let mut v = vec![m(0.7, 0.1, 0), m(0.9, 0.3, 2), m(0.9, 0.1, 3), m(0.9, 0.1, 1)];
        v.sort_by(match_order);
        let order: Vec<usize> = v.iter().map(|m| m.candidate).collect();
        assert_eq!(order, vec![1, 3, 2, 0]);
    }

    #[test]
    fn posed_bbox_rotates_corners() {
        let level = LevelModel {
            points: Vec::new(),
            ref_offset: (0.0, 0.0),
            radius: 0.0,
            bbox: [-2.0, -1.0, 2.0, 1.0],
        };
        let b = posed_bbox(&level, 10.0, 20.0, std::f64::consts::FRAC_PI_2, 1.0);
        let expect = [9.0, 18.0, 11.0, 22.0];
        for (got, want) in b.iter().zip(expect) {
            assert!((got - want).abs() < 1e-9);
        }
    }
}

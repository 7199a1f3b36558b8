//! Gradient-direction similarity with greedy early termination.

use crate::gradient::GradientField;
use crate::params::Polarity;
use crate::template::LevelModel;

/// Level model rotated and scaled to one pose, rounded to integer offsets.
#[derive(Clone, Debug, Default)]
pub(crate) struct PosedModel {
    offsets: Vec<(i32, i32)>,
    dirs: Vec<(f32, f32)>,
}

impl PosedModel {
    #[cfg(test)]
    pub(crate) fn new(level: &LevelModel, angle: f64, scale: f64) -> Self {
        let mut posed = Self::default();
        posed.set(level, angle, scale);
        posed
    }

    /// Re-pose in place, reusing buffers.
    pub(crate) fn set(&mut self, level: &LevelModel, angle: f64, scale: f64) {
        let (s, c) = angle.sin_cos();
        let (sf, cf) = (s as f32, c as f32);
        self.offsets.clear();
        self.dirs.clear();
        for p in &level.points {
            let (ox, oy) = (p.ox as f64, p.oy as f64);
            let x = scale * (c * ox - s * oy);
            let y = scale * (s * ox + c * oy);
            self.offsets.push((x.round() as i32, y.round() as i32));
            self.dirs.push((cf * p.dx - sf * p.dy, sf * p.dx + cf * p.dy));
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.offsets.len()
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Scorer {
    polarity: Polarity,
    min_contrast_sq: f32,
    greediness: f64,
}

impl Scorer {
    pub(crate) fn new(polarity: Polarity, min_contrast: f32, greediness: f64) -> Self {
        Self {
            polarity,
            min_contrast_sq: min_contrast * min_contrast,
            greediness: greediness.clamp(0.0, 1.0),
        }
    }

    /// Mean cosine between model directions and image gradients with the
    /// model anchored at `(x, y)`.
    ///
    /// Returns `None` once the partial sum can no longer reach `min_score`
    /// under the greedy bound, or when the final score is below `min_score`.
    /// With greediness 0 the bound is exact and no instance reaching
    /// `min_score` is rejected.
    pub(crate) fn score(
        &self,
        model: &PosedModel,
        grad: &GradientField,
        x: i32,
        y: i32,
        min_score: f64,
    ) -> Option<f64> {
        let n = model.len();
        if n == 0 {
            return None;
        }
        let nf = n as f64;
        let g = self.greediness;
        let safe_base = nf * (min_score - 1.0);
        let greedy_slope = if g >= 1.0 - 1e-12 {
            f64::INFINITY
        } else {
            (1.0 - g * min_score) / (1.0 - g)
        };

        let mut sum = 0.0_f64;
        for (j, (&(ox, oy), &(dx, dy))) in model.offsets.iter().zip(&model.dirs).enumerate() {
            let (gx, gy) = grad.at(x + ox, y + oy);
            let m2 = gx * gx + gy * gy;
            if m2 >= self.min_contrast_sq && m2 > 0.0 {
                let c = ((dx * gx + dy * gy) / m2.sqrt()) as f64;
                sum += match self.polarity {
                    Polarity::IgnoreLocalPolarity => c.abs(),
                    _ => c,
                };
            }
            let k = (j + 1) as f64;
            let partial = self.partial(sum);
            let limit = (safe_base + greedy_slope * k).min(min_score * k);
            if partial < limit {
                return None;
            }
        }
        let score = self.partial(sum) / nf;
        (score >= min_score).then_some(score)
    }

    #[inline]
    fn partial(&self, sum: f64) -> f64 {
        match self.polarity {
            Polarity::IgnoreGlobalPolarity => sum.abs(),
            _ => sum,
        }
    }
}

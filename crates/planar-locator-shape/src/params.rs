use serde::{Deserialize, Serialize};

/// How edge polarity is compared between template and image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Gradient directions must agree (dark-to-bright stays dark-to-bright).
    #[default]
    UsePolarity,
    /// The whole instance may appear with inverted contrast.
    IgnoreGlobalPolarity,
    /// Each edge point may flip independently.
    IgnoreLocalPolarity,
}

/// Deterministic thinning of template edge points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointReduction {
    None,
    #[default]
    Low,
    Medium,
    High,
}

impl PointReduction {
    /// Keep every `stride`-th edge point.
    pub fn stride(self) -> usize {
        match self {
            PointReduction::None => 1,
            PointReduction::Low => 2,
            PointReduction::Medium => 3,
            PointReduction::High => 4,
        }
    }
}

/// Template construction parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TemplateParams {
    /// Requested pyramid levels; levels with too few edge points are dropped.
    pub num_levels: usize,
    /// Hysteresis contrast `[low, high]` in gray values.
    pub contrast: [f32; 2],
    /// Minimum edge chain length (level-0 pixels).
    pub min_component_size: usize,
    pub polarity: Polarity,
    pub point_reduction: PointReduction,
}

impl Default for TemplateParams {
    fn default() -> Self {
        Self {
            num_levels: 4,
            contrast: [65.0, 133.0],
            min_component_size: 25,
            polarity: Polarity::UsePolarity,
            point_reduction: PointReduction::Low,
        }
    }
}

/// Upper bound on angle x scale grid points at the finest step.
pub const MAX_GRID_POSES: usize = 100_000;

/// Inclusive range sampled on a grid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl SearchRange {
    pub fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }

    pub fn fixed(value: f64) -> Self {
        Self {
            min: value,
            max: value,
            step: 1.0,
        }
    }

    pub fn is_fixed(&self) -> bool {
        (self.max - self.min).abs() < 1e-12
    }

    /// Grid points at the full `step`, both ends included. Saturates for
    /// degenerate steps.
    pub fn count(&self) -> usize {
        if self.is_fixed() {
            return 1;
        }
        (((self.max - self.min) / self.step).floor().max(0.0) as usize).saturating_add(2)
    }

    pub fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.min, self.max)
    }

    /// Grid values between `min` and `max` (both included) spaced by `step`,
    /// anchored at `anchor` when it lies inside the range.
    pub fn grid(&self, step: f64, anchor: f64) -> Vec<f64> {
        if self.is_fixed() || step <= 0.0 {
            return vec![self.min];
        }
        let anchor = if (self.min..=self.max).contains(&anchor) {
            anchor
        } else {
            self.min
        };
        let k_min = ((self.min - anchor) / step - 1e-9).ceil() as i64;
        let k_max = ((self.max - anchor) / step + 1e-9).floor() as i64;
        let mut out: Vec<f64> = (k_min..=k_max).map(|k| anchor + k as f64 * step).collect();
        out.push(self.min);
        out.push(self.max);
        out.sort_by(f64::total_cmp);
        out.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
        out
    }
}

/// Per-frame search parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchParams {
    /// Rotation range in radians.
    pub angle: SearchRange,
    /// Isotropic scale range.
    pub scale: SearchRange,
    pub min_score: f64,
    pub max_matches: usize,
    /// Allowed bounding-box overlap between reported matches, in `[0, 1]`.
    pub max_overlap: f64,
    /// Early-termination aggressiveness in `[0, 1]`.
    pub greediness: f64,
    /// Image gradients weaker than this (gray values) count as no edge.
    pub min_contrast: f32,
    /// Candidates tracked from the top pyramid level down to level 0.
    pub max_candidates: usize,
    pub subpixel: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            angle: SearchRange::new(
                (-35.0_f64).to_radians(),
                35.0_f64.to_radians(),
                2.0_f64.to_radians(),
            ),
            scale: SearchRange::new(0.75, 1.0, 0.1),
            min_score: 0.59,
            max_matches: 9,
            max_overlap: 0.0,
            greediness: 0.8,
            min_contrast: 10.0,
            max_candidates: 64,
            subpixel: true,
        }
    }
}

impl SearchParams {
    /// Poses on the finest angle x scale grid.
    pub fn grid_poses(&self) -> usize {
        self.angle.count().saturating_mul(self.scale.count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_is_anchored_and_includes_ends() {
        let r = SearchRange::new(-35.0, 35.0, 2.0);
        let g = r.grid(16.0, 0.0);
        assert_eq!(g, vec![-35.0, -32.0, -16.0, 0.0, 16.0, 32.0, 35.0]);
    }

    #[test]
    fn grid_falls_back_to_range_start() {
        let r = SearchRange::new(0.75, 0.95, 0.1);
        let g = r.grid(0.1, 1.0);
        assert_eq!(g.len(), 3);
        assert!((g[0] - 0.75).abs() < 1e-12);
        assert!((g[2] - 0.95).abs() < 1e-12);
    }

    #[test]
    fn grid_size_counts_both_ends() {
        assert_eq!(SearchRange::new(0.75, 1.0, 0.1).count(), 4);
        assert_eq!(SearchRange::fixed(1.0).count(), 1);
        assert_eq!(SearchRange::new(-35.0, 35.0, 2.0).count(), 37);
        assert!(SearchParams::default().grid_poses() <= MAX_GRID_POSES);
        let tiny = SearchRange::new(-1.0, 1.0, 1e-300);
        assert_eq!(tiny.count(), usize::MAX);
    }

    #[test]
    fn fixed_range_has_single_value() {
        assert_eq!(SearchRange::fixed(1.0).grid(0.1, 1.0), vec![1.0]);
    }
}

//! Search and startup configuration.

use std::fs;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use planar_locator_core::{CalibrationSource, Roi};
use planar_locator_shape::{
    Polarity, PointReduction, SearchParams, SearchRange, TemplateParams, MAX_GRID_POSES,
};
use serde::{Deserialize, Serialize};

use crate::error::LocatorError;

/// Upper bound on requested pyramid levels.
pub const MAX_LEVELS: usize = 8;

/// Template and search settings shared by model construction and detection.
///
/// Angles are in radians. Every field has a default, so a JSON object may set
/// only what it needs to change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub angle: SearchRange,
    pub scale: SearchRange,
    /// Hysteresis contrast `[low, high]` for template edges, gray values.
    pub contrast: [f32; 2],
    /// Minimum image gradient counted during search, gray values.
    pub min_contrast: f32,
    /// Minimum template edge chain length, pixels.
    pub min_component_size: usize,
    pub num_levels: usize,
    pub polarity: Polarity,
    pub point_reduction: PointReduction,
    pub greediness: f64,
    pub min_score: f64,
    pub max_matches: usize,
    pub max_overlap: f64,
    /// Candidates tracked through the pyramid; derived from `max_matches`
    /// when absent.
    pub max_candidates: Option<usize>,
    pub subpixel: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let template = TemplateParams::default();
        let search = SearchParams::default();
        Self {
            angle: search.angle,
            scale: search.scale,
            contrast: template.contrast,
            min_contrast: search.min_contrast,
            min_component_size: template.min_component_size,
            num_levels: template.num_levels,
            polarity: template.polarity,
            point_reduction: template.point_reduction,
            greediness: search.greediness,
            min_score: search.min_score,
            max_matches: search.max_matches,
            max_overlap: search.max_overlap,
            max_candidates: None,
            subpixel: search.subpixel,
        }
    }
}

fn check_range(name: &str, r: &SearchRange) -> Result<(), LocatorError> {
    if !(r.min.is_finite() && r.max.is_finite() && r.step.is_finite()) {
        return Err(LocatorError::Config(format!("{name} range must be finite")));
    }
    if r.min > r.max {
        return Err(LocatorError::Config(format!(
            "{name} range is inverted ({} > {})",
            r.min, r.max
        )));
    }
    if !r.is_fixed() && r.step <= 0.0 {
        return Err(LocatorError::Config(format!("{name} step must be > 0 (got {})", r.step)));
    }
    Ok(())
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), LocatorError> {
        check_range("angle", &self.angle)?;
        check_range("scale", &self.scale)?;
        if self.scale.min <= 0.0 {
            return Err(LocatorError::Config(format!(
                "scale range must be positive (min {})",
                self.scale.min
            )));
        }
        let poses = self.angle.count().saturating_mul(self.scale.count());
        if poses > MAX_GRID_POSES {
            return Err(LocatorError::Config(format!(
                "angle x scale grid has {poses} poses (max {MAX_GRID_POSES}); use coarser steps"
            )));
        }
        let [low, high] = self.contrast;
        if !(low.is_finite() && high.is_finite() && low > 0.0 && low <= high) {
            return Err(LocatorError::Config(format!(
                "contrast must satisfy 0 < low <= high (got [{low}, {high}])"
            )));
        }
        if !(self.min_contrast.is_finite() && self.min_contrast >= 0.0) {
            return Err(LocatorError::Config("min_contrast must be >= 0".into()));
        }
        if self.num_levels == 0 || self.num_levels > MAX_LEVELS {
            return Err(LocatorError::Config(format!(
                "num_levels must be in 1..={MAX_LEVELS} (got {})",
                self.num_levels
            )));
        }
        if !(0.0..=1.0).contains(&self.greediness) {
            return Err(LocatorError::Config(format!(
                "greediness must be in [0, 1] (got {})",
                self.greediness
            )));
        }
        if !(self.min_score > 0.0 && self.min_score <= 1.0) {
            return Err(LocatorError::Config(format!(
                "min_score must be in (0, 1] (got {})",
                self.min_score
            )));
        }
        if !(0.0..=1.0).contains(&self.max_overlap) {
            return Err(LocatorError::Config(format!(
                "max_overlap must be in [0, 1] (got {})",
                self.max_overlap
            )));
        }
        if self.max_matches == 0 {
            return Err(LocatorError::Config("max_matches must be >= 1".into()));
        }
        if self.max_candidates == Some(0) {
            return Err(LocatorError::Config("max_candidates must be >= 1".into()));
        }
        Ok(())
    }

    pub fn max_candidates(&self) -> usize {
        self.max_candidates
            .unwrap_or_else(|| (4 * self.max_matches).max(16))
            .max(self.max_matches)
    }

    pub fn template_params(&self) -> TemplateParams {
        TemplateParams {
            num_levels: self.num_levels,
            contrast: self.contrast,
            min_component_size: self.min_component_size,
            polarity: self.polarity,
            point_reduction: self.point_reduction,
        }
    }

    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            angle: self.angle,
            scale: self.scale,
            min_score: self.min_score,
            max_matches: self.max_matches,
            max_overlap: self.max_overlap,
            greediness: self.greediness,
            min_contrast: self.min_contrast,
            max_candidates: self.max_candidates(),
            subpixel: self.subpixel,
        }
    }
}

/// Startup configuration for the locator (CLI and embedding applications).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocatorConfig {
    pub calibration: CalibrationSource,
    pub reference_image: PathBuf,
    pub roi: Roi,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    #[serde(default)]
    pub log_level: Option<String>,
}

impl LocatorConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, LocatorError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), LocatorError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve `reference_image` against the directory of the config file.
    pub fn reference_image_path(&self, config_dir: Option<&Path>) -> PathBuf {
        match config_dir {
            Some(dir) if self.reference_image.is_relative() => dir.join(&self.reference_image),
            _ => self.reference_image.clone(),
        }
    }

    /// Parsed `log_level`, `None` when absent or unrecognized.
    pub fn log_level(&self) -> Option<LevelFilter> {
        self.log_level.as_deref().and_then(|s| s.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_reference_node() {
        let cfg = SearchConfig::default();
        assert!((cfg.angle.min.to_degrees() + 35.0).abs() < 1e-9);
        assert!((cfg.angle.max.to_degrees() - 35.0).abs() < 1e-9);
        assert!((cfg.angle.step.to_degrees() - 2.0).abs() < 1e-9);
        assert_eq!(cfg.scale, SearchRange::new(0.75, 1.0, 0.1));
        assert_eq!(cfg.contrast, [65.0, 133.0]);
        assert_eq!(cfg.num_levels, 4);
        assert_eq!(cfg.min_score, 0.59);
        assert_eq!(cfg.max_matches, 9);
        assert_eq!(cfg.max_overlap, 0.0);
        assert!(cfg.subpixel);
        cfg.validate().expect("defaults are valid");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: SearchConfig = serde_json::from_str(r#"{"min_score": 0.7, "polarity": "ignore_local_polarity"}"#)
            .expect("parse");
        assert_eq!(cfg.min_score, 0.7);
        assert_eq!(cfg.polarity, Polarity::IgnoreLocalPolarity);
        assert_eq!(cfg.max_matches, 9);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let bad = [
            SearchConfig {
                angle: SearchRange::new(1.0, -1.0, 0.1),
                ..SearchConfig::default()
            },
            SearchConfig {
                scale: SearchRange::new(0.5, 1.0, 0.0),
                ..SearchConfig::default()
            },
            SearchConfig {
                min_score: 1.2,
                ..SearchConfig::default()
            },
            SearchConfig {
                greediness: -0.1,
                ..SearchConfig::default()
            },
            SearchConfig {
                num_levels: 0,
                ..SearchConfig::default()
            },
            SearchConfig {
                max_matches: 0,
                ..SearchConfig::default()
            },
            SearchConfig {
                contrast: [140.0, 100.0],
                ..SearchConfig::default()
            },
            SearchConfig {
                angle: SearchRange::new(-0.6, 0.6, 1e-9),
                ..SearchConfig::default()
            },
        ];
        for cfg in bad {
            assert!(matches!(cfg.validate(), Err(LocatorError::Config(_))), "{cfg:?}");
        }
    }

    #[test]
    fn candidate_cap_covers_max_matches() {
        let cfg = SearchConfig {
            max_matches: 9,
            ..SearchConfig::default()
        };
        assert_eq!(cfg.max_candidates(), 36);
        let cfg = SearchConfig {
            max_matches: 20,
            max_candidates: Some(5),
            ..SearchConfig::default()
        };
        assert_eq!(cfg.max_candidates(), 20);
    }

    #[test]
    fn reference_path_is_resolved_relative_to_config() {
        let cfg: LocatorConfig = serde_json::from_str(
            r#"{
                "calibration": {
                    "intrinsics": {"model": "division", "focus": 0.016, "kappa": -100.0,
                                   "sx": 3.45e-6, "sy": 3.45e-6, "width": 640, "height": 480},
                    "pose": {"translation": [0, 0, 0.6], "rotation_deg": [0, 0, 0]}
                },
                "reference_image": "ref.png",
                "roi": {"top": 10, "left": 20, "bottom": 60, "right": 90},
                "log_level": "debug"
            }"#,
        )
        .expect("parse");
        assert_eq!(
            cfg.reference_image_path(Some(Path::new("/data"))),
            PathBuf::from("/data/ref.png")
        );
        assert_eq!(cfg.log_level(), Some(LevelFilter::Debug));
        assert_eq!(cfg.search, SearchConfig::default());
    }
}

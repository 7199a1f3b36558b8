use planar_locator_core::{GrayImageView, Roi};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::error::ShapeError;
use crate::gradient::GradientField;
use crate::params::{SearchParams, TemplateParams, MAX_GRID_POSES};
use crate::pyramid::Pyramid;
use crate::search::{run_search, ShapeMatch};
use crate::template::{build_template, ShapeTemplate, TemplateGeometry};

/// A template-matching backend.
///
/// `search` takes `&mut self` so engines can keep reusable scratch buffers;
/// callers sharing an engine across threads must serialize access.
pub trait MatchingEngine {
    type Template: TemplateGeometry;

    /// Learn a template from the edges of `reference` inside `roi`.
    fn build_template(
        &self,
        reference: &GrayImageView<'_>,
        roi: &Roi,
        params: &TemplateParams,
    ) -> Result<Self::Template, ShapeError>;

    /// Locate template instances in `image`, best first.
    fn search(
        &mut self,
        template: &Self::Template,
        image: &GrayImageView<'_>,
        params: &SearchParams,
    ) -> Result<Vec<ShapeMatch>, ShapeError>;
}

/// Edge-gradient shape matcher with a reusable pyramid workspace.
#[derive(Debug, Default)]
pub struct EdgeShapeEngine {
    pyramid: Pyramid,
    gradients: Vec<GradientField>,
}

impl EdgeShapeEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Views have public fields, so the buffer length is not guaranteed.
fn check_buffer(image: &GrayImageView<'_>) -> Result<(), ShapeError> {
    let expected = image.width.checked_mul(image.height);
    if expected != Some(image.data.len()) {
        return Err(ShapeError::BufferSize {
            width: image.width,
            height: image.height,
            expected: expected.unwrap_or(usize::MAX),
            got: image.data.len(),
        });
    }
    Ok(())
}

pub(crate) fn validate_search_params(params: &SearchParams) -> Result<(), ShapeError> {
    let range_ok = |r: &crate::params::SearchRange| {
        r.min.is_finite() && r.max.is_finite() && r.step.is_finite() && r.min <= r.max && (r.is_fixed() || r.step > 0.0)
    };
    if !range_ok(&params.angle) {
        return Err(ShapeError::InvalidParams("angle range must be finite with min <= max and step > 0"));
    }
    if !range_ok(&params.scale) || params.scale.min <= 0.0 {
        return Err(ShapeError::InvalidParams("scale range must be positive with min <= max and step > 0"));
    }
    if params.grid_poses() > MAX_GRID_POSES {
        return Err(ShapeError::InvalidParams("angle x scale grid is too fine"));
    }
    if !(params.min_score > 0.0 && params.min_score <= 1.0) {
        return Err(ShapeError::InvalidParams("min_score must lie in (0, 1]"));
    }
    if !(0.0..=1.0).contains(&params.max_overlap) {
        return Err(ShapeError::InvalidParams("max_overlap must lie in [0, 1]"));
    }
    if !(0.0..=1.0).contains(&params.greediness) {
        return Err(ShapeError::InvalidParams("greediness must lie in [0, 1]"));
    }
    if !(params.min_contrast.is_finite() && params.min_contrast >= 0.0) {
        return Err(ShapeError::InvalidParams("min_contrast must be >= 0"));
    }
    if params.max_candidates == 0 {
        return Err(ShapeError::InvalidParams("max_candidates must be >= 1"));
    }
    Ok(())
}

impl MatchingEngine for EdgeShapeEngine {
    type Template = ShapeTemplate;

    fn build_template(
        &self,
        reference: &GrayImageView<'_>,
        roi: &Roi,
        params: &TemplateParams,
    ) -> Result<ShapeTemplate, ShapeError> {
        check_buffer(reference)?;
        build_template(reference, roi, params)
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, template, image, params), fields(levels = template.num_levels()))
    )]
    fn search(
        &mut self,
        template: &ShapeTemplate,
        image: &GrayImageView<'_>,
        params: &SearchParams,
    ) -> Result<Vec<ShapeMatch>, ShapeError> {
        validate_search_params(params)?;
        check_buffer(image)?;
        let (tw, th) = template.image_size();
        if (image.width, image.height) != (tw, th) {
            return Err(ShapeError::DimensionMismatch {
                expected_w: tw,
                expected_h: th,
                got_w: image.width,
                got_h: image.height,
            });
        }
        if params.max_matches == 0 {
            return Ok(Vec::new());
        }

        let levels = template.num_levels();
        self.pyramid.rebuild(image, levels)?;
        if self.gradients.len() < levels {
            let extra = levels - self.gradients.len();
            self.gradients.try_reserve(extra)?;
            self.gradients.resize_with(levels, GradientField::default);
        }
        for (l, grad) in self.gradients.iter_mut().take(levels).enumerate() {
            grad.compute(&self.pyramid.level(image, l))?;
        }

        let matches = run_search(template, &self.gradients[..levels], params);
        log::debug!("search: {} matches", matches.len());
        Ok(matches)
    }
}

//! Template model construction from a calibrated reference image.

use nalgebra::{Point2, Vector2};
use planar_locator_core::{CalibrationStore, GrayImageView, Roi};
use planar_locator_shape::{EdgeShapeEngine, MatchingEngine, ShapeTemplate, TemplateGeometry};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::config::SearchConfig;
use crate::error::LocatorError;

/// Immutable template plus the geometry needed to interpret its matches.
#[derive(Clone, Debug)]
pub struct TemplateModel<T = ShapeTemplate> {
    template: T,
    search: SearchConfig,
    roi: Roi,
    image_scale: f64,
    origin_offset: Vector2<f64>,
    image_contours: Vec<Vec<Point2<f64>>>,
    world_contours: Vec<Vec<Point2<f64>>>,
}

impl<T: TemplateGeometry> TemplateModel<T> {
    /// Opaque engine template.
    pub fn template(&self) -> &T {
        &self.template
    }

    pub fn search_config(&self) -> &SearchConfig {
        &self.search
    }

    pub fn roi(&self) -> &Roi {
        &self.roi
    }

    /// Meters per reference-image row along the world plane.
    pub fn image_scale(&self) -> f64 {
        self.image_scale
    }

    /// Negated region-of-interest centroid in meters (`x` from columns,
    /// `y` from rows).
    pub fn origin_offset(&self) -> Vector2<f64> {
        self.origin_offset
    }

    /// Template reference point in reference-image pixels.
    pub fn reference_point(&self) -> Point2<f64> {
        self.template.reference_point()
    }

    /// Template edge chains in reference-image pixels.
    pub fn image_contours(&self) -> &[Vec<Point2<f64>>] {
        &self.image_contours
    }

    /// Template edge chains on the world plane, meters. Points whose viewing
    /// ray misses the plane are dropped.
    pub fn world_contours(&self) -> &[Vec<Point2<f64>>] {
        &self.world_contours
    }
}

/// Meters per image row: the world-plane distance between the first and last
/// row of column 0, divided by the image height.
pub fn image_to_metric_scale(calibration: &CalibrationStore) -> Option<f64> {
    let height = calibration.intrinsics().height() as f64;
    let top = calibration.pixel_to_world_plane(Point2::new(0.0, 0.0))?;
    let bottom = calibration.pixel_to_world_plane(Point2::new(0.0, height - 1.0))?;
    let scale = (bottom - top).norm() / height;
    (scale.is_finite() && scale > 0.0).then_some(scale)
}

/// Builds [`TemplateModel`]s with a matching engine.
#[derive(Debug, Default)]
pub struct ModelBuilder<E = EdgeShapeEngine> {
    engine: E,
}

impl ModelBuilder<EdgeShapeEngine> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E: MatchingEngine> ModelBuilder<E> {
    pub fn with_engine(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Hand the engine over to a [`crate::Detector`].
    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Learn the template inside `roi` of `reference` and derive its metric
    /// geometry from `calibration`.
    ///
    /// Building twice from the same inputs yields equivalent models.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(width = reference.width, height = reference.height))
    )]
    pub fn build(
        &self,
        reference: &GrayImageView<'_>,
        roi: &Roi,
        calibration: &CalibrationStore,
        search: &SearchConfig,
    ) -> Result<TemplateModel<E::Template>, LocatorError> {
        search.validate()?;

        let k = calibration.intrinsics();
        let (w, h) = (k.width() as usize, k.height() as usize);
        if reference.data.is_empty() {
            return Err(LocatorError::Input("reference image is empty".into()));
        }
        if GrayImageView::new(reference.width, reference.height, reference.data).is_none() {
            return Err(LocatorError::Input(format!(
                "reference buffer holds {} bytes, not {}x{}",
                reference.data.len(),
                reference.width,
                reference.height
            )));
        }
        if (reference.width, reference.height) != (w, h) {
            return Err(LocatorError::Input(format!(
                "reference image is {}x{}, calibration expects {w}x{h}",
                reference.width, reference.height
            )));
        }
        if !roi.is_finite() || roi.area() <= 0.0 {
            return Err(LocatorError::InvalidTemplate(format!(
                "region of interest has zero area ({} x {})",
                roi.width(),
                roi.height()
            )));
        }
        if !roi.fits_within(w, h) {
            return Err(LocatorError::InvalidTemplate(format!(
                "region of interest {roi:?} lies outside the {w}x{h} image"
            )));
        }

        let image_scale = image_to_metric_scale(calibration).ok_or_else(|| {
            LocatorError::Config("reference image rows do not intersect the world plane".into())
        })?;

        let template = self
            .engine
            .build_template(reference, roi, &search.template_params())
            .map_err(LocatorError::from_build)?;

        let centroid = roi.centroid();
        let origin_offset = -centroid.coords * image_scale;

        let image_contours: Vec<Vec<Point2<f64>>> = template.contours().to_vec();
        let world_contours = image_contours
            .iter()
            .map(|chain| {
                calibration
                    .image_points_to_world_plane(chain, 1.0)
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
            })
            .filter(|chain| !chain.is_empty())
            .collect();

        log::info!(
            "model: roi centroid ({:.2}, {:.2}) px, scale {:.4e} m/px, {} contours",
            centroid.x,
            centroid.y,
            image_scale,
            image_contours.len()
        );

        Ok(TemplateModel {
            template,
            search: search.clone(),
            roi: *roi,
            image_scale,
            origin_offset,
            image_contours,
            world_contours,
        })
    }
}

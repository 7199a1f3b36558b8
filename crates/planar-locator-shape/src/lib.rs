//! Edge-based shape matching for calibrated planar marker localization.
//!
//! A template is learned from the edges inside a region of interest of a
//! reference image and then located in new frames under rotation and
//! isotropic scale changes.
//!
//! Pipeline:
//! 1. Build a 2x2 mean pyramid and Sobel gradients per level.
//! 2. Template: thin edges (non-maximum suppression), keep chains that pass
//!    hysteresis on `[low, high]` contrast and the minimum chain length,
//!    refine each edge point to subpixel accuracy and thin them by the
//!    point-reduction stride.
//! 3. Search: exhaustive over positions and the coarse angle/scale grid on the
//!    top level, then local refinement on every finer level.
//! 4. Score: mean cosine between template and image gradient directions,
//!    with greedy early termination.
//! 5. Optional least-squares subpixel refinement, overlap suppression and a
//!    deterministic best-first ordering.
//!
//! ```
//! use planar_locator_core::{GrayImage, Roi};
//! use planar_locator_shape::{
//!     EdgeShapeEngine, MatchingEngine, SearchParams, TemplateGeometry, TemplateParams,
//! };
//!
//! let mut img = GrayImage::filled(160, 120, 40);
//! for y in 40..80 {
//!     for x in 50..110 {
//!         img.set(x, y, 220);
//!     }
//! }
//! let roi = Roi::new(35.0, 45.0, 85.0, 115.0);
//! let mut engine = EdgeShapeEngine::new();
//! let template = engine.build_template(&img.view(), &roi, &TemplateParams::default())?;
//! let matches = engine.search(&template, &img.view(), &SearchParams::default())?;
//! assert_eq!(matches.len(), 1);
//! assert!((matches[0].position - template.reference_point()).norm() < 0.5);
//! # Ok::<(), planar_locator_shape::ShapeError>(())
//! ```

mod engine;
mod error;
mod gradient;
mod params;
mod pyramid;
mod refine;
mod score;
mod search;
mod template;

pub use engine::{EdgeShapeEngine, MatchingEngine};
pub use error::ShapeError;
pub use params::{
    Polarity, PointReduction, SearchParams, SearchRange, TemplateParams, MAX_GRID_POSES,
};
pub use search::ShapeMatch;
pub use template::{ShapeTemplate, TemplateGeometry, MIN_LEVEL_POINTS};

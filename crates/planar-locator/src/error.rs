use std::fmt;

use planar_locator_core::CalibrationError;
use planar_locator_shape::ShapeError;

/// Coarse classification of a [`LocatorError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid calibration or search configuration.
    Config,
    /// Degenerate region of interest or a reference without usable edges.
    InvalidTemplate,
    /// Missing, unreadable or mis-sized reference image.
    Input,
    /// A frame the engine cannot process.
    Detection,
    /// Engine buffers could not be allocated.
    Resource,
}

/// Errors produced by the locator pipeline.
#[derive(thiserror::Error, Debug)]
pub enum LocatorError {
    #[error("invalid calibration: {0}")]
    Calibration(#[from] CalibrationError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid template: {0}")]
    InvalidTemplate(String),
    #[error("input error: {0}")]
    Input(String),
    #[error("detection failed: {0}")]
    Detection(String),
    #[error("resource error: {0}")]
    Resource(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl LocatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LocatorError::Calibration(_) | LocatorError::Config(_) => ErrorKind::Config,
            LocatorError::InvalidTemplate(_) => ErrorKind::InvalidTemplate,
            LocatorError::Input(_) | LocatorError::Io(_) | LocatorError::Json(_) => ErrorKind::Input,
            LocatorError::Detection(_) => ErrorKind::Detection,
            LocatorError::Resource(_) => ErrorKind::Resource,
        }
    }

    /// Classify an engine error raised while building a template.
    pub(crate) fn from_build(err: ShapeError) -> Self {
        match err {
            ShapeError::Allocation(e) => LocatorError::Resource(e.to_string()),
            ShapeError::DimensionMismatch { .. } | ShapeError::BufferSize { .. } => {
                LocatorError::Input(err.to_string())
            }
            ShapeError::InvalidParams(msg) => LocatorError::Config(msg.to_string()),
            ShapeError::EmptyRoi { .. } | ShapeError::RoiOutOfBounds { .. } | ShapeError::NoEdges { .. } => {
                LocatorError::InvalidTemplate(err.to_string())
            }
        }
    }

    /// Classify an engine error raised while searching a frame.
    pub(crate) fn from_search(err: ShapeError) -> Self {
        match err {
            ShapeError::Allocation(e) => LocatorError::Resource(e.to_string()),
            other => LocatorError::Detection(other.to_string()),
        }
    }
}

/// Initialization phase that failed before frame processing could start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StartupStep {
    LoadConfig,
    LoadCalibration,
    LoadReferenceImage,
    BuildModel,
}

impl fmt::Display for StartupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StartupStep::LoadConfig => "loading configuration",
            StartupStep::LoadCalibration => "loading calibration",
            StartupStep::LoadReferenceImage => "loading reference image",
            StartupStep::BuildModel => "building template model",
        };
        f.write_str(s)
    }
}

/// Fatal startup failure, tagged with the step that failed.
#[derive(thiserror::Error, Debug)]
#[error("startup failed while {step}: {source}")]
pub struct StartupError {
    pub step: StartupStep,
    #[source]
    pub source: LocatorError,
}

impl StartupError {
    pub fn new(step: StartupStep, source: impl Into<LocatorError>) -> Self {
        Self {
            step,
            source: source.into(),
        }
    }
}

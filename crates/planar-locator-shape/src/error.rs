use std::collections::TryReserveError;

/// Errors returned by the shape matching engine.
#[derive(thiserror::Error, Debug)]
pub enum ShapeError {
    #[error("region of interest has zero area ({width} x {height})")]
    EmptyRoi { width: f64, height: f64 },
    #[error("region of interest does not lie inside the {width}x{height} image")]
    RoiOutOfBounds { width: usize, height: usize },
    #[error("template has too few edge points ({found}, need >= {needed}); lower the contrast")]
    NoEdges { found: usize, needed: usize },
    #[error("image is {got_w}x{got_h}, template expects {expected_w}x{expected_h}")]
    DimensionMismatch {
        expected_w: usize,
        expected_h: usize,
        got_w: usize,
        got_h: usize,
    },
    #[error("image buffer holds {got} bytes, {width}x{height} needs {expected}")]
    BufferSize {
        width: usize,
        height: usize,
        expected: usize,
        got: usize,
    },
    #[error("invalid search parameter: {0}")]
    InvalidParams(&'static str),
    #[error("failed to allocate search buffers: {0}")]
    Allocation(#[from] TryReserveError),
}

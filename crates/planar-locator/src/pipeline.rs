//! Serialized per-frame processing and the startup barrier.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use planar_locator_core::{CalibrationSource, CalibrationStore, FrameHeader, FrameImage, GrayImageView, Roi};
use planar_locator_shape::{EdgeShapeEngine, MatchingEngine};

use crate::config::SearchConfig;
use crate::detector::Detector;
use crate::emit::{FrameOutput, ResultEmitter};
use crate::error::{LocatorError, StartupError, StartupStep};
use crate::model::ModelBuilder;
use crate::pose::PoseExtractor;

/// Runs detection cycles one at a time against a single built model.
///
/// The detector sits behind a mutex, so a processor can be shared between
/// threads while cycles still never overlap.
pub struct FrameProcessor<E: MatchingEngine = EdgeShapeEngine> {
    detector: Mutex<Detector<E>>,
    extractor: PoseExtractor,
}

impl<E: MatchingEngine> fmt::Debug for FrameProcessor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameProcessor")
            .field("detector", &self.detector)
            .finish_non_exhaustive()
    }
}

impl<E: MatchingEngine> FrameProcessor<E> {
    pub fn new(detector: Detector<E>) -> Self {
        Self {
            detector: Mutex::new(detector),
            extractor: PoseExtractor,
        }
    }

    /// One detection cycle, propagating failures.
    pub fn try_process_frame(
        &self,
        frame: &FrameImage<'_>,
        header: &FrameHeader,
    ) -> Result<FrameOutput, LocatorError> {
        let raw = {
            // search buffers are rebuilt every cycle, so a poisoned lock is reusable
            let mut detector = self.detector.lock().unwrap_or_else(PoisonError::into_inner);
            detector.detect(frame)?
        };
        let matches = self.extractor.extract_all(&raw, header);
        Ok(FrameOutput::from_matches(header.clone(), &matches))
    }

    /// One detection cycle. Failures are logged and yield an empty output.
    pub fn process_frame(&self, frame: &FrameImage<'_>, header: &FrameHeader) -> FrameOutput {
        match self.try_process_frame(frame, header) {
            Ok(out) => out,
            Err(err) => {
                log::warn!("frame `{}` skipped: {err}", header.frame_id);
                FrameOutput::empty(header.clone())
            }
        }
    }

    /// Process a frame and hand the output to `emitter`.
    pub fn process_and_emit(
        &self,
        frame: &FrameImage<'_>,
        header: &FrameHeader,
        emitter: &mut dyn ResultEmitter,
    ) -> Result<FrameOutput, LocatorError> {
        let out = self.process_frame(frame, header);
        emitter.emit(&out)?;
        Ok(out)
    }

    pub fn into_detector(self) -> Detector<E> {
        self.detector.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Validate calibration and build the model; the returned processor is ready
/// for frames. Failures name the step that failed.
pub fn start(
    calibration: CalibrationSource,
    reference: &GrayImageView<'_>,
    roi: &Roi,
    search: &SearchConfig,
) -> Result<FrameProcessor, StartupError> {
    let calibration =
        CalibrationStore::load(calibration).map_err(|e| StartupError::new(StartupStep::LoadCalibration, e))?;
    start_with_engine(EdgeShapeEngine::new(), calibration, reference, roi, search)
}

/// [`start`] with a caller-supplied engine and an already validated calibration.
pub fn start_with_engine<E: MatchingEngine>(
    engine: E,
    calibration: CalibrationStore,
    reference: &GrayImageView<'_>,
    roi: &Roi,
    search: &SearchConfig,
) -> Result<FrameProcessor<E>, StartupError> {
    let builder = ModelBuilder::with_engine(engine);
    let model = builder
        .build(reference, roi, &calibration, search)
        .map_err(|e| StartupError::new(StartupStep::BuildModel, e))?;
    log::info!(
        "startup: model ready ({} matches max, min score {})",
        search.max_matches,
        search.min_score
    );
    Ok(FrameProcessor::new(Detector::new(
        builder.into_engine(),
        calibration,
        model,
    )))
}

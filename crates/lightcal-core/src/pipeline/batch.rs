use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::error::{CalibrationError, Result};

use super::config::ErrorPolicy;
use super::orchestrator::{CalibrationEngine, LightFrame};
use super::types::{CalibrationReport, FrameStatus, ProgressReporter};

/// Result of calibrating one light frame of a batch.
///
/// On failure `light.buffer` is left exactly as it was loaded.
#[derive(Debug)]
pub struct FrameOutcome {
    pub light: LightFrame,
    pub result: Result<CalibrationReport>,
}

impl FrameOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(&self.result, Ok(r) if r.status == FrameStatus::Completed)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(&self.result, Ok(r) if r.status == FrameStatus::Cancelled)
    }

    pub fn is_failed(&self) -> bool {
        self.result.is_err()
    }
}

/// Outcomes of a batch, in the order the light frames were given.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<FrameOutcome>,
}

impl BatchReport {
    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_completed()).count()
    }

    pub fn cancelled(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_cancelled()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }
}

/// Calibrate many light frames concurrently, one Rayon task per frame.
///
/// A failing frame never stops the others unless the engine's settings say
/// `ErrorPolicy::AbortBatch`; then frames not yet started fail with
/// `BatchAborted`.
pub fn calibrate_batch(
    engine: &CalibrationEngine,
    lights: Vec<LightFrame>,
    reporter: &dyn ProgressReporter,
) -> BatchReport {
    let total = lights.len();
    let abort_on_error = engine.settings().on_error == ErrorPolicy::AbortBatch;
    let aborted = AtomicBool::new(false);
    info!(frames = total, policy = %engine.settings().on_error, "Calibrating batch");

    let outcomes: Vec<FrameOutcome> = lights
        .into_par_iter()
        .map(|light| calibrate_one(engine, light, reporter, abort_on_error, &aborted))
        .collect();

    let report = BatchReport { outcomes };
    info!(
        completed = report.completed(),
        cancelled = report.cancelled(),
        failed = report.failed(),
        "Batch finished"
    );
    report
}

fn calibrate_one(
    engine: &CalibrationEngine,
    mut light: LightFrame,
    reporter: &dyn ProgressReporter,
    abort_on_error: bool,
    aborted: &AtomicBool,
) -> FrameOutcome {
    if aborted.load(Ordering::Acquire) {
        let result = Err(CalibrationError::BatchAborted.for_frame(light.buffer.id()));
        return FrameOutcome { light, result };
    }

    let result = engine.calibrate(&mut light, reporter);
    if let Err(e) = &result {
        warn!(error = %e, "Frame failed");
        if abort_on_error {
            aborted.store(true, Ordering::Release);
        }
    }
    FrameOutcome { light, result }
}

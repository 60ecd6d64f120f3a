pub mod config;
mod batch;
mod orchestrator;
mod types;

pub use batch::{calibrate_batch, BatchReport, FrameOutcome};
pub use orchestrator::{CalibrationEngine, LightFrame};
pub use types::{
    CalibrationReport, CalibrationStage, FrameStatus, NoOpReporter, ProgressReporter, Signal,
    SkipReason, StageStatus, StageSummary,
};

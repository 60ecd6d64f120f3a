use crate::frame::FrameId;

/// Calibration stage, in the order they are applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CalibrationStage {
    Offset,
    Dark,
    Flat,
    HotPixel,
}

impl CalibrationStage {
    pub const ALL: [CalibrationStage; 4] = [Self::Offset, Self::Dark, Self::Flat, Self::HotPixel];
}

impl std::fmt::Display for CalibrationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Offset => write!(f, "Offset"),
            Self::Dark => write!(f, "Dark"),
            Self::Flat => write!(f, "Flat"),
            Self::HotPixel => write!(f, "Hot pixels"),
        }
    }
}

/// What one applied stage did to the frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StageSummary {
    /// Master frame used, if the stage takes one.
    pub master: Option<FrameId>,
    /// Dark scale factor (dark stage only).
    pub scale: Option<f32>,
    /// Pixels the flat stage could not correct.
    pub defective_pixels: usize,
    /// Pixels replaced by the hot pixel stage.
    pub interpolated_pixels: usize,
    /// Outliers left alone because they fall on a star.
    pub protected_pixels: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// No master of the needed kind matched the light frame.
    NoMaster,
    /// Turned off in the settings.
    Disabled,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoMaster => write!(f, "no matching master"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StageStatus {
    Applied(StageSummary),
    Skipped(SkipReason),
}

impl StageStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Reply from a progress reporter after each stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Signal {
    #[default]
    Continue,
    Cancel,
}

/// How a frame's calibration ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// All four stages ran or were skipped.
    Completed,
    /// Stopped between stages at the reporter's request.
    Cancelled,
}

/// Per-frame record of which stages ran and which were skipped.
#[derive(Clone, Debug)]
pub struct CalibrationReport {
    pub frame: FrameId,
    pub stages: Vec<(CalibrationStage, StageStatus)>,
    pub status: FrameStatus,
}

impl CalibrationReport {
    pub(super) fn new(frame: FrameId) -> Self {
        Self {
            frame,
            stages: Vec::with_capacity(CalibrationStage::ALL.len()),
            status: FrameStatus::Completed,
        }
    }

    pub fn stage(&self, stage: CalibrationStage) -> Option<&StageStatus> {
        self.stages.iter().find(|(s, _)| *s == stage).map(|(_, st)| st)
    }

    pub fn applied(&self) -> Vec<CalibrationStage> {
        self.stages
            .iter()
            .filter(|(_, st)| st.is_applied())
            .map(|(s, _)| *s)
            .collect()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == FrameStatus::Cancelled
    }
}

/// Thread-safe progress reporting for frame calibration.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// Polled before each stage starts; `true` stops the frame there.
    fn cancel_requested(&self) -> bool {
        false
    }

    /// A stage finished (applied or skipped). `fraction` is the share of the
    /// frame's calibration now complete. Returning `Signal::Cancel` stops
    /// the frame before the next stage.
    fn stage_complete(
        &self,
        _frame: &FrameId,
        _stage: CalibrationStage,
        _status: &StageStatus,
        _fraction: f32,
    ) -> Signal {
        Signal::Continue
    }
}

/// No-op progress reporter.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

use indicatif::{ProgressBar, ProgressStyle};

use lightcal_core::consts::STAGES_PER_FRAME;
use lightcal_core::frame::FrameId;
use lightcal_core::pipeline::{CalibrationStage, ProgressReporter, Signal, StageStatus};

/// Drives one terminal progress bar for a whole batch, one tick per stage.
pub struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    pub fn new(frames: usize) -> anyhow::Result<Self> {
        let bar = ProgressBar::new((frames * STAGES_PER_FRAME) as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:24} [{bar:40}] {pos}/{len}")?
                .progress_chars("=> "),
        );
        Ok(Self { bar })
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("Done");
    }
}

impl ProgressReporter for BarReporter {
    fn stage_complete(
        &self,
        frame: &FrameId,
        stage: CalibrationStage,
        _status: &StageStatus,
        _fraction: f32,
    ) -> Signal {
        self.bar.set_message(format!("{stage}: {}", short_name(frame)));
        self.bar.inc(1);
        Signal::Continue
    }
}

fn short_name(frame: &FrameId) -> &str {
    let name = frame.as_str();
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

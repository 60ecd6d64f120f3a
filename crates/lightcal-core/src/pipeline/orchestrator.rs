use std::sync::Arc;

use ndarray::Array3;
use tracing::{debug, info, warn};

use crate::calibrate::helpers::check_dims;
use crate::calibrate::{
    apply_hot_pixel_interpolation, apply_master_dark, apply_master_flat_masked,
    apply_master_offset, saturation_mask, FlatParams,
};
use crate::error::Result;
use crate::frame::{PixelBuffer, StackingInfo};
use crate::masters::{select_masters, MasterCatalog, MasterSelection};
use crate::stars::StarList;

use super::config::CalibrationSettings;
use super::types::{
    CalibrationReport, CalibrationStage, FrameStatus, ProgressReporter, Signal, SkipReason,
    StageStatus,
};

/// A light frame waiting for calibration, with everything needed to match
/// masters and protect stars.
#[derive(Clone, Debug)]
pub struct LightFrame {
    pub buffer: PixelBuffer,
    pub info: StackingInfo,
    pub stars: Option<StarList>,
}

impl LightFrame {
    pub fn new(buffer: PixelBuffer, info: StackingInfo) -> Self {
        Self {
            buffer,
            info,
            stars: None,
        }
    }

    pub fn with_stars(mut self, stars: StarList) -> Self {
        self.stars = Some(stars);
        self
    }
}

/// Applies offset, dark, flat and hot pixel correction to light frames.
///
/// Holds the settings and the shared master catalog for one batch run.
/// Nothing here is mutated after construction, so one engine can serve
/// every worker thread.
pub struct CalibrationEngine {
    settings: CalibrationSettings,
    catalog: Arc<MasterCatalog>,
}

impl CalibrationEngine {
    pub fn new(settings: CalibrationSettings, catalog: Arc<MasterCatalog>) -> Self {
        info!(
            offsets = catalog.offsets.len(),
            darks = catalog.darks.len(),
            flats = catalog.flats.len(),
            debloom = settings.debloom,
            "Calibration engine ready"
        );
        Self { settings, catalog }
    }

    pub fn settings(&self) -> &CalibrationSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &MasterCatalog {
        &self.catalog
    }

    /// Pick the masters that match a light frame's acquisition metadata.
    pub fn load_masters(&self, info: &StackingInfo) -> MasterSelection {
        select_masters(info, &self.catalog)
    }

    /// Select masters for `light` and calibrate it in place.
    ///
    /// Fails with `NoMatchingMaster` when a master the settings require is
    /// missing; the buffer is not touched in that case.
    pub fn calibrate(
        &self,
        light: &mut LightFrame,
        reporter: &dyn ProgressReporter,
    ) -> Result<CalibrationReport> {
        let selection = self.load_masters(&light.info);
        for kind in selection.missing() {
            debug!(frame = %light.buffer.id(), %kind, "No matching master");
        }
        selection
            .require(&self.settings.required)
            .map_err(|e| e.for_frame(light.buffer.id()))?;
        self.apply_all_masters(&mut light.buffer, &selection, light.stars.as_ref(), reporter)
    }

    /// Apply offset, dark, flat and hot pixel correction, in that order.
    ///
    /// Every selected master is checked against the frame before the first
    /// stage runs, so a shape or layout mismatch leaves the buffer untouched.
    /// Cancellation is honoured between stages only; a cancelled frame holds
    /// the result of every stage completed so far. With `debloom`, saturation
    /// is judged on the frame as passed in, before any subtraction.
    pub fn apply_all_masters(
        &self,
        frame: &mut PixelBuffer,
        selection: &MasterSelection,
        stars: Option<&StarList>,
        reporter: &dyn ProgressReporter,
    ) -> Result<CalibrationReport> {
        let id = frame.id().clone();
        check_selection(frame, selection).map_err(|e| e.for_frame(&id))?;
        let saturated = (self.settings.debloom && selection.flat.is_some())
            .then(|| saturation_mask(frame, self.settings.saturation_level));

        let mut report = CalibrationReport::new(id.clone());
        let total = CalibrationStage::ALL.len();

        for (i, stage) in CalibrationStage::ALL.into_iter().enumerate() {
            if reporter.cancel_requested() {
                report.status = FrameStatus::Cancelled;
                break;
            }

            let status = self
                .run_stage(stage, frame, selection, stars, saturated.as_ref())
                .map_err(|e| e.for_frame(&id))?;
            let fraction = (i + 1) as f32 / total as f32;
            let signal = reporter.stage_complete(&id, stage, &status, fraction);
            report.stages.push((stage, status));

            if signal == Signal::Cancel && i + 1 < total {
                report.status = FrameStatus::Cancelled;
                break;
            }
        }

        if report.is_cancelled() {
            warn!(frame = %id, completed = report.stages.len(), "Calibration cancelled");
        } else {
            info!(frame = %id, applied = ?report.applied(), "Frame calibrated");
        }
        Ok(report)
    }

    fn run_stage(
        &self,
        stage: CalibrationStage,
        frame: &mut PixelBuffer,
        selection: &MasterSelection,
        stars: Option<&StarList>,
        saturated: Option<&Array3<bool>>,
    ) -> Result<StageStatus> {
        let status = match stage {
            CalibrationStage::Offset => match &selection.offset {
                Some(offset) => StageStatus::Applied(apply_master_offset(frame, offset)?),
                None => StageStatus::Skipped(SkipReason::NoMaster),
            },
            CalibrationStage::Dark => match &selection.dark {
                Some(dark) => StageStatus::Applied(apply_master_dark(frame, dark, stars)?),
                None => StageStatus::Skipped(SkipReason::NoMaster),
            },
            CalibrationStage::Flat => match &selection.flat {
                Some(flat) => {
                    let params = FlatParams::from_settings(&self.settings);
                    let summary = apply_master_flat_masked(frame, flat, &params, saturated)?;
                    StageStatus::Applied(summary)
                }
                None => StageStatus::Skipped(SkipReason::NoMaster),
            },
            // Only runs alongside a master dark.
            CalibrationStage::HotPixel => {
                if !self.settings.hot_pixel.enabled {
                    StageStatus::Skipped(SkipReason::Disabled)
                } else if selection.dark.is_none() {
                    StageStatus::Skipped(SkipReason::NoMaster)
                } else {
                    StageStatus::Applied(apply_hot_pixel_interpolation(
                        frame,
                        stars,
                        &self.settings.hot_pixel,
                    ))
                }
            }
        };
        Ok(status)
    }
}

/// Reject any selected master whose shape or layout differs from the frame.
fn check_selection(frame: &PixelBuffer, selection: &MasterSelection) -> Result<()> {
    if let Some(offset) = &selection.offset {
        check_dims(CalibrationStage::Offset, frame, offset.buffer())?;
    }
    if let Some(dark) = &selection.dark {
        check_dims(CalibrationStage::Dark, frame, dark.master.buffer())?;
    }
    if let Some(flat) = &selection.flat {
        check_dims(CalibrationStage::Flat, frame, flat.buffer())?;
    }
    Ok(())
}

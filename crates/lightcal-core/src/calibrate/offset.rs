use ndarray::Zip;
use tracing::debug;

use crate::error::Result;
use crate::frame::PixelBuffer;
use crate::masters::MasterOffset;
use crate::pipeline::{CalibrationStage, StageSummary};

use super::helpers::{check_dims, use_parallel};

/// Subtract a bias map from a light frame, clamping at zero.
///
/// The frame is left untouched when the master's shape differs.
pub fn apply_master_offset(frame: &mut PixelBuffer, offset: &MasterOffset) -> Result<StageSummary> {
    let bias = offset.buffer();
    check_dims(CalibrationStage::Offset, frame, bias)?;

    let subtract = |v: &mut f32, &b: &f32| *v = (*v - b).max(0.0);
    let pixels = frame.width() * frame.height();
    let zip = Zip::from(&mut frame.data).and(&bias.data);
    if use_parallel(pixels) {
        zip.par_for_each(subtract);
    } else {
        zip.for_each(subtract);
    }

    debug!(frame = %frame.id(), offset = %bias.id(), "Offset subtracted");
    Ok(StageSummary {
        master: Some(bias.id().clone()),
        ..Default::default()
    })
}

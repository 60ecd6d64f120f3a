use ndarray::Zip;
use tracing::debug;

use crate::error::Result;
use crate::frame::PixelBuffer;
use crate::masters::SelectedDark;
use crate::pipeline::{CalibrationStage, StageSummary};
use crate::stars::StarList;

use super::helpers::{check_dims, use_parallel};

/// Subtract a scaled dark-current map, clamping at zero.
///
/// The dark is assumed bias-free already, so no offset is removed here.
/// Stars are not protected: dark current is additive noise and is removed
/// from star pixels like any other.
pub fn apply_master_dark(
    frame: &mut PixelBuffer,
    dark: &SelectedDark,
    stars: Option<&StarList>,
) -> Result<StageSummary> {
    let map = dark.master.buffer();
    check_dims(CalibrationStage::Dark, frame, map)?;

    let scale = dark.scale;
    let subtract = |v: &mut f32, &d: &f32| *v = (*v - d * scale).max(0.0);
    let pixels = frame.width() * frame.height();
    let zip = Zip::from(&mut frame.data).and(&map.data);
    if use_parallel(pixels) {
        zip.par_for_each(subtract);
    } else {
        zip.for_each(subtract);
    }

    debug!(
        frame = %frame.id(),
        dark = %map.id(),
        scale,
        exact = dark.exact,
        stars = stars.map_or(0, StarList::len),
        "Dark subtracted"
    );
    Ok(StageSummary {
        master: Some(map.id().clone()),
        scale: Some(scale),
        ..Default::default()
    })
}

use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::error::{CalibrationError, Result};
use crate::frame::PixelBuffer;
use crate::pipeline::CalibrationStage;

/// Reject a master whose shape or channel layout differs from the light frame.
pub(crate) fn check_dims(
    stage: CalibrationStage,
    light: &PixelBuffer,
    master: &PixelBuffer,
) -> Result<()> {
    if !light.same_dims(master) {
        return Err(CalibrationError::DimensionMismatch {
            stage,
            expected: light.dims(),
            actual: master.dims(),
        });
    }
    if light.layout != master.layout {
        return Err(CalibrationError::LayoutMismatch {
            stage,
            expected: light.layout,
            actual: master.layout,
        });
    }
    Ok(())
}

/// Whether a plane of `pixels` samples is large enough for Rayon.
pub(crate) fn use_parallel(pixels: usize) -> bool {
    pixels >= PARALLEL_PIXEL_THRESHOLD
}

/// Evaluate `f` for every row index, row-parallel for large planes.
/// Rows are returned in order.
pub(crate) fn collect_rows<T, F>(height: usize, width: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Send + Sync,
{
    if use_parallel(height * width) {
        (0..height).into_par_iter().map(f).collect()
    } else {
        (0..height).map(f).collect()
    }
}

use ndarray::Array3;
use tracing::{debug, warn};

use crate::consts::{DEFECTIVE_PIXEL_SENTINEL, EPSILON};
use crate::error::{CalibrationError, Result};
use crate::frame::{FrameDims, PixelBuffer};
use crate::masters::MasterFlat;
use crate::pipeline::config::{CalibrationSettings, DefectivePixelPolicy};
use crate::pipeline::{CalibrationStage, StageSummary};

use super::helpers::{check_dims, collect_rows};

/// Numeric policy of the flat stage.
#[derive(Clone, Debug)]
pub struct FlatParams {
    /// Keep saturated pixels out of the division.
    pub debloom: bool,
    pub saturation_level: f32,
    /// Flat values below `min_flat_ratio * reference` are not divided by.
    pub min_flat_ratio: f32,
    pub defective_policy: DefectivePixelPolicy,
}

impl FlatParams {
    pub fn from_settings(settings: &CalibrationSettings) -> Self {
        Self {
            debloom: settings.debloom,
            saturation_level: settings.saturation_level,
            min_flat_ratio: settings.flat.min_flat_ratio,
            defective_policy: settings.flat.defective_policy,
        }
    }
}

impl Default for FlatParams {
    fn default() -> Self {
        Self::from_settings(&CalibrationSettings::default())
    }
}

/// Samples at or above `level`. Taken from the raw light frame, before
/// offset and dark subtraction pull saturated sensels below the level.
pub fn saturation_mask(frame: &PixelBuffer, level: f32) -> Array3<bool> {
    frame.data.mapv(|v| v >= level)
}

/// Divide a light frame by a flat field: `out = in * reference / flat`.
///
/// Flat pixels too close to zero are not divided by; the light pixel is
/// handled per `defective_policy` and counted in the summary. With
/// `debloom`, pixels saturated in `frame` as passed in keep their value.
pub fn apply_master_flat(
    frame: &mut PixelBuffer,
    flat: &MasterFlat,
    params: &FlatParams,
) -> Result<StageSummary> {
    let saturated = params
        .debloom
        .then(|| saturation_mask(frame, params.saturation_level));
    apply_master_flat_masked(frame, flat, params, saturated.as_ref())
}

/// Flat correction with debloom driven by a precomputed `saturated` mask
/// (see [`saturation_mask`]). Masked pixels keep the value they have on
/// entry to this stage. The mask is ignored unless `params.debloom` is set.
pub fn apply_master_flat_masked(
    frame: &mut PixelBuffer,
    flat: &MasterFlat,
    params: &FlatParams,
    saturated: Option<&Array3<bool>>,
) -> Result<StageSummary> {
    let map = flat.buffer();
    check_dims(CalibrationStage::Flat, frame, map)?;
    if let Some(mask) = saturated {
        if mask.dim() != frame.data.dim() {
            let (channels, height, width) = mask.dim();
            return Err(CalibrationError::DimensionMismatch {
                stage: CalibrationStage::Flat,
                expected: frame.dims(),
                actual: FrameDims {
                    width,
                    height,
                    channels,
                },
            });
        }
    }
    let saturated = saturated.filter(|_| params.debloom);

    let layout = frame.layout;
    let reference = flat.reference();
    let thresholds: Vec<f32> = reference
        .iter()
        .map(|&r| (r * params.min_flat_ratio).max(EPSILON))
        .collect();
    let (h, w) = (frame.height(), frame.width());
    let mut defective = 0usize;

    for channel in 0..frame.channels() {
        let rows = {
            let light = frame.plane(channel);
            let flat_plane = map.plane(channel);
            collect_rows(h, w, |row| {
                let mut out = Vec::with_capacity(w);
                let mut bad = 0usize;
                for col in 0..w {
                    let v = light[[row, col]];
                    if saturated.is_some_and(|m| m[[channel, row, col]]) {
                        out.push(v);
                        continue;
                    }
                    let plane = layout.color_plane(channel, row, col);
                    let f = flat_plane[[row, col]];
                    if !(f >= thresholds[plane]) {
                        bad += 1;
                        out.push(match params.defective_policy {
                            DefectivePixelPolicy::KeepUncorrected => v,
                            DefectivePixelPolicy::Sentinel => DEFECTIVE_PIXEL_SENTINEL,
                        });
                        continue;
                    }
                    out.push(v * (reference[plane] / f));
                }
                (out, bad)
            })
        };

        let mut plane = frame.plane_mut(channel);
        for (row, (values, bad)) in rows.into_iter().enumerate() {
            defective += bad;
            for (col, v) in values.into_iter().enumerate() {
                plane[[row, col]] = v;
            }
        }
    }

    if defective > 0 {
        warn!(frame = %frame.id(), flat = %map.id(), defective, "Flat has near-zero pixels");
    }
    debug!(frame = %frame.id(), flat = %map.id(), debloom = params.debloom, "Flat applied");
    Ok(StageSummary {
        master: Some(map.id().clone()),
        defective_pixels: defective,
        ..Default::default()
    })
}

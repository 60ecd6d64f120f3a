pub mod select;

pub use select::{dark_scale, select_masters, MasterSelection, SelectedDark};

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::EPSILON;
use crate::error::{CalibrationError, Result};
use crate::frame::{PixelBuffer, StackingInfo};
use crate::pipeline::config::FlatNormalization;

/// The three kinds of calibration master.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MasterKind {
    Offset,
    Dark,
    Flat,
}

impl fmt::Display for MasterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offset => write!(f, "offset"),
            Self::Dark => write!(f, "dark"),
            Self::Flat => write!(f, "flat"),
        }
    }
}

/// Bias map: sensor readout pattern at zero exposure.
#[derive(Debug)]
pub struct MasterOffset {
    buffer: PixelBuffer,
    pub info: StackingInfo,
}

impl MasterOffset {
    pub fn new(buffer: PixelBuffer, info: StackingInfo) -> Self {
        Self { buffer, info }
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }
}

/// Dark-current map, already bias-subtracted.
#[derive(Debug)]
pub struct MasterDark {
    buffer: PixelBuffer,
    pub info: StackingInfo,
}

impl MasterDark {
    pub fn new(buffer: PixelBuffer, info: StackingInfo) -> Self {
        Self { buffer, info }
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }
}

/// Relative sensitivity map with one reference level per color plane.
#[derive(Debug)]
pub struct MasterFlat {
    buffer: PixelBuffer,
    pub info: StackingInfo,
    reference: Vec<f32>,
}

impl MasterFlat {
    /// Build a flat master, computing each color plane's reference level.
    ///
    /// Fails when any plane has no usable signal, since every pixel of that
    /// plane would divide by near-zero.
    pub fn new(
        buffer: PixelBuffer,
        info: StackingInfo,
        normalization: FlatNormalization,
    ) -> Result<Self> {
        let reference = plane_references(&buffer, normalization);
        if let Some(plane) = reference.iter().position(|&r| !(r > EPSILON)) {
            return Err(CalibrationError::InvalidMaster {
                kind: MasterKind::Flat,
                reason: format!(
                    "color plane {} of {} has no usable signal",
                    plane,
                    buffer.id()
                ),
            });
        }
        debug!(flat = %buffer.id(), ?reference, %normalization, "Flat references computed");
        Ok(Self {
            buffer,
            info,
            reference,
        })
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    /// Reference level per color plane (see `ChannelLayout::color_plane`).
    pub fn reference(&self) -> &[f32] {
        &self.reference
    }
}

/// Central tendency of every color plane, ignoring non-finite samples.
fn plane_references(buffer: &PixelBuffer, normalization: FlatNormalization) -> Vec<f32> {
    let layout = buffer.layout;
    let mut planes: Vec<Vec<f32>> = vec![Vec::new(); layout.color_planes()];
    for ((channel, row, col), &v) in buffer.data.indexed_iter() {
        if v.is_finite() {
            planes[layout.color_plane(channel, row, col)].push(v);
        }
    }
    planes
        .iter_mut()
        .map(|values| match normalization {
            FlatNormalization::Mean => mean(values),
            FlatNormalization::Median => median(values),
        })
        .collect()
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: f64 = values.iter().map(|&v| v as f64).sum();
    (sum / values.len() as f64) as f32
}

/// Median using `select_nth_unstable` (O(n), reorders `values`).
pub(crate) fn median(values: &mut [f32]) -> f32 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let mid = n / 2;
    if n % 2 == 1 {
        *values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b)).1
    } else {
        values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        let hi = values[mid];
        let lo = *values[..mid]
            .select_nth_unstable_by(mid - 1, |a, b| a.total_cmp(b))
            .1;
        (lo + hi) / 2.0
    }
}

/// All masters available for one batch run. Read-only once built and
/// shared by every worker through `Arc`.
#[derive(Debug, Default)]
pub struct MasterCatalog {
    pub offsets: Vec<Arc<MasterOffset>>,
    pub darks: Vec<Arc<MasterDark>>,
    pub flats: Vec<Arc<MasterFlat>>,
}

impl MasterCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(mut self, offset: MasterOffset) -> Self {
        self.offsets.push(Arc::new(offset));
        self
    }

    pub fn with_dark(mut self, dark: MasterDark) -> Self {
        self.darks.push(Arc::new(dark));
        self
    }

    pub fn with_flat(mut self, flat: MasterFlat) -> Self {
        self.flats.push(Arc::new(flat));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty() && self.darks.is_empty() && self.flats.is_empty()
    }
}

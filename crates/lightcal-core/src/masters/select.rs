use std::sync::Arc;

use tracing::debug;

use crate::consts::{EXPOSURE_MATCH_TOLERANCE_S, TEMPERATURE_MATCH_TOLERANCE_C};
use crate::error::{CalibrationError, Result};
use crate::frame::StackingInfo;
use crate::pipeline::config::RequiredMasters;

use super::{MasterCatalog, MasterDark, MasterFlat, MasterKind, MasterOffset};

/// A dark master chosen for a light frame, with its exposure scale.
#[derive(Clone, Debug)]
pub struct SelectedDark {
    pub master: Arc<MasterDark>,
    /// Multiplier applied to every dark sample before subtraction.
    pub scale: f32,
    /// Whether exposure and temperature both matched the light frame.
    pub exact: bool,
}

/// Masters picked for one light frame. `None` means no candidate matched.
#[derive(Clone, Debug, Default)]
pub struct MasterSelection {
    pub offset: Option<Arc<MasterOffset>>,
    pub dark: Option<SelectedDark>,
    pub flat: Option<Arc<MasterFlat>>,
}

impl MasterSelection {
    /// Selection with no masters; calibration leaves the frame unchanged.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.offset.is_none() && self.dark.is_none() && self.flat.is_none()
    }

    /// Kinds for which no master matched, in pipeline order.
    pub fn missing(&self) -> Vec<MasterKind> {
        let mut kinds = Vec::new();
        if self.offset.is_none() {
            kinds.push(MasterKind::Offset);
        }
        if self.dark.is_none() {
            kinds.push(MasterKind::Dark);
        }
        if self.flat.is_none() {
            kinds.push(MasterKind::Flat);
        }
        kinds
    }

    /// Fail with `NoMatchingMaster` for the first required kind that is missing.
    pub fn require(&self, required: &RequiredMasters) -> Result<()> {
        for kind in self.missing() {
            if required.is_required(kind) {
                return Err(CalibrationError::NoMatchingMaster(kind));
            }
        }
        Ok(())
    }
}

/// Pick the best offset, dark and flat master for a light frame.
pub fn select_masters(info: &StackingInfo, catalog: &MasterCatalog) -> MasterSelection {
    let offset = select_offset(info, &catalog.offsets);
    let dark = select_dark(info, &catalog.darks);
    let flat = select_flat(info, &catalog.flats);

    debug!(
        offset = ?offset.as_ref().map(|m| m.buffer().id().to_string()),
        dark = ?dark.as_ref().map(|d| d.master.buffer().id().to_string()),
        dark_scale = ?dark.as_ref().map(|d| d.scale),
        flat = ?flat.as_ref().map(|m| m.buffer().id().to_string()),
        "Masters selected"
    );

    MasterSelection { offset, dark, flat }
}

/// Linear dark-current scale for a light exposure against a dark exposure.
///
/// Returns exactly 1.0 when the exposures match or either one is unusable.
pub fn dark_scale(light_exposure: f64, dark_exposure: f64) -> f32 {
    if exposures_match(light_exposure, dark_exposure)
        || !(light_exposure > 0.0)
        || !(dark_exposure > 0.0)
    {
        return 1.0;
    }
    (light_exposure / dark_exposure) as f32
}

fn exposures_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= EXPOSURE_MATCH_TOLERANCE_S
}

/// Unknown temperature on either side never disqualifies a match.
fn temperatures_match(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => (a - b).abs() <= TEMPERATURE_MATCH_TOLERANCE_C,
        _ => true,
    }
}

fn temperature_distance(a: Option<f64>, b: Option<f64>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => (a - b).abs(),
        _ => f64::INFINITY,
    }
}

fn timestamp_distance(a: Option<i64>, b: Option<i64>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => (a as f64 - b as f64).abs(),
        _ => f64::INFINITY,
    }
}

fn gain_mismatch(a: Option<i32>, b: Option<i32>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a != b)
}

fn select_offset(
    info: &StackingInfo,
    candidates: &[Arc<MasterOffset>],
) -> Option<Arc<MasterOffset>> {
    candidates
        .iter()
        .min_by(|a, b| {
            timestamp_distance(info.timestamp, a.info.timestamp)
                .total_cmp(&timestamp_distance(info.timestamp, b.info.timestamp))
        })
        .cloned()
}

fn select_dark(info: &StackingInfo, candidates: &[Arc<MasterDark>]) -> Option<SelectedDark> {
    let key = |dark: &Arc<MasterDark>| {
        let exact = exposures_match(info.exposure, dark.info.exposure)
            && temperatures_match(info.temperature, dark.info.temperature);
        (
            !exact,
            (info.exposure - dark.info.exposure).abs(),
            temperature_distance(info.temperature, dark.info.temperature),
            gain_mismatch(info.gain, dark.info.gain),
        )
    };

    let master = candidates
        .iter()
        .min_by(|a, b| {
            let (ka, kb) = (key(*a), key(*b));
            ka.0.cmp(&kb.0)
                .then(ka.1.total_cmp(&kb.1))
                .then(ka.2.total_cmp(&kb.2))
                .then(ka.3.cmp(&kb.3))
        })?
        .clone();

    let exact = !key(&master).0;
    let scale = dark_scale(info.exposure, master.info.exposure);
    Some(SelectedDark {
        master,
        scale,
        exact,
    })
}

fn select_flat(info: &StackingInfo, candidates: &[Arc<MasterFlat>]) -> Option<Arc<MasterFlat>> {
    candidates
        .iter()
        .filter(|flat| flat.info.filter == info.filter && flat.info.binning == info.binning)
        .min_by(|a, b| {
            let da = timestamp_distance(info.timestamp, a.info.timestamp);
            let db = timestamp_distance(info.timestamp, b.info.timestamp);
            da.total_cmp(&db)
        })
        .cloned()
}

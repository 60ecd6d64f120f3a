mod common;

use std::sync::{Arc, Mutex};

use approx::assert_abs_diff_eq;
use ndarray::{Array2, Array3};

use lightcal_core::error::CalibrationError;
use lightcal_core::frame::{CfaPattern, ChannelLayout, FrameId, PixelBuffer, StackingInfo};
use lightcal_core::masters::{MasterCatalog, MasterKind, MasterSelection};
use lightcal_core::pipeline::config::{CalibrationSettings, HotPixelConfig, RequiredMasters};
use lightcal_core::pipeline::{
    CalibrationEngine, CalibrationStage, FrameStatus, LightFrame, NoOpReporter, ProgressReporter,
    Signal, SkipReason, StageStatus,
};
use lightcal_core::stars::{Star, StarList};

use common::{dark, flat_from, mono, mono_from, offset};

const EXPOSURE: f64 = 60.0;

fn engine(catalog: MasterCatalog) -> CalibrationEngine {
    CalibrationEngine::new(CalibrationSettings::default(), Arc::new(catalog))
}

fn engine_with(settings: CalibrationSettings, catalog: MasterCatalog) -> CalibrationEngine {
    CalibrationEngine::new(settings, Arc::new(catalog))
}

fn light_frame(data: Array2<f32>) -> LightFrame {
    LightFrame::new(mono_from("light", data), StackingInfo::with_exposure(EXPOSURE))
}

fn no_hot_pixels() -> CalibrationSettings {
    CalibrationSettings {
        hot_pixel: HotPixelConfig {
            enabled: false,
            ..HotPixelConfig::default()
        },
        ..CalibrationSettings::default()
    }
}

/// Records every stage event and answers with `Cancel` after `cancel_after`.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<(CalibrationStage, f32)>>,
    cancel_after: Option<CalibrationStage>,
}

impl ProgressReporter for Recorder {
    fn stage_complete(
        &self,
        _frame: &FrameId,
        stage: CalibrationStage,
        _status: &StageStatus,
        fraction: f32,
    ) -> Signal {
        self.events.lock().unwrap().push((stage, fraction));
        if self.cancel_after == Some(stage) {
            Signal::Cancel
        } else {
            Signal::Continue
        }
    }
}

struct AlwaysCancel;

impl ProgressReporter for AlwaysCancel {
    fn cancel_requested(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Stage application
// ---------------------------------------------------------------------------

#[test]
fn test_no_masters_is_identity() {
    let data = Array2::from_shape_fn((12, 12), |(r, c)| 0.1 + 0.005 * (r * 12 + c) as f32);
    let mut light = light_frame(data.clone());
    let report = engine(MasterCatalog::new())
        .calibrate(&mut light, &NoOpReporter)
        .unwrap();

    assert_eq!(light.buffer.plane(0), data.view());
    assert_eq!(report.status, FrameStatus::Completed);
    assert!(report.applied().is_empty());
    for stage in CalibrationStage::ALL {
        assert_eq!(
            report.stage(stage),
            Some(&StageStatus::Skipped(SkipReason::NoMaster))
        );
    }
}

#[test]
fn test_stages_applied_in_order() {
    // Flat of 0.5 everywhere except a 0.25 pixel: the reference stays 0.5.
    let mut flat_data = Array2::from_elem((8, 8), 0.5f32);
    flat_data[[0, 0]] = 0.25;
    let catalog = MasterCatalog::new()
        .with_offset(offset("bias", 8, 8, 0.1))
        .with_dark(dark("dark", 8, 8, 0.1, EXPOSURE))
        .with_flat(flat_from("flat", flat_data));

    let mut light = light_frame(Array2::from_elem((8, 8), 0.5));
    let report = engine_with(no_hot_pixels(), catalog)
        .calibrate(&mut light, &NoOpReporter)
        .unwrap();

    assert_eq!(
        report.applied(),
        vec![CalibrationStage::Offset, CalibrationStage::Dark, CalibrationStage::Flat]
    );
    // (0.5 - 0.1 - 0.1) * 0.5 / 0.25; flat-first would give 0.8
    assert_abs_diff_eq!(light.buffer.data[[0, 0, 0]], 0.6, epsilon = 1e-5);
    assert_abs_diff_eq!(light.buffer.data[[0, 4, 4]], 0.3, epsilon = 1e-5);
}

/// Light at 0.3 with one pixel at full scale, a 0.05 bias and a flat that
/// is 0.25 under that pixel.
fn saturated_star_setup(debloom: bool) -> (CalibrationEngine, LightFrame) {
    let mut light_data = Array2::from_elem((8, 8), 0.3f32);
    light_data[[4, 4]] = 1.0;
    let mut flat_data = Array2::from_elem((8, 8), 0.5f32);
    flat_data[[4, 4]] = 0.25;
    let catalog = MasterCatalog::new()
        .with_offset(offset("bias", 8, 8, 0.05))
        .with_flat(flat_from("flat", flat_data));
    let settings = CalibrationSettings {
        debloom,
        ..no_hot_pixels()
    };
    (engine_with(settings, catalog), light_frame(light_data))
}

#[test]
fn test_debloom_keeps_pixels_saturated_before_offset() {
    let (engine, mut light) = saturated_star_setup(true);
    let report = engine.calibrate(&mut light, &NoOpReporter).unwrap();

    assert_eq!(
        report.applied(),
        vec![CalibrationStage::Offset, CalibrationStage::Flat]
    );
    // Offset applied, flat division skipped
    assert_abs_diff_eq!(light.buffer.data[[0, 4, 4]], 0.95, epsilon = 1e-5);
    assert_abs_diff_eq!(light.buffer.data[[0, 0, 0]], 0.25, epsilon = 1e-5);
}

#[test]
fn test_without_debloom_saturated_pixel_is_flat_divided() {
    let (engine, mut light) = saturated_star_setup(false);
    engine.calibrate(&mut light, &NoOpReporter).unwrap();
    assert_abs_diff_eq!(light.buffer.data[[0, 4, 4]], 1.9, epsilon = 1e-5);
}

#[test]
fn test_dark_scaled_to_light_exposure() {
    let catalog = MasterCatalog::new().with_dark(dark("dark", 4, 4, 0.05, EXPOSURE / 2.0));
    let mut light = light_frame(Array2::from_elem((4, 4), 0.4));
    let report = engine_with(no_hot_pixels(), catalog)
        .calibrate(&mut light, &NoOpReporter)
        .unwrap();

    assert!(common::all_close(&light.buffer, 0.3, 1e-6));
    match report.stage(CalibrationStage::Dark) {
        Some(StageStatus::Applied(summary)) => {
            assert_eq!(summary.scale, Some(2.0));
            assert_eq!(summary.master.as_ref().map(FrameId::as_str), Some("dark"));
        }
        other => panic!("dark stage not applied: {other:?}"),
    }
}

#[test]
fn test_hot_pixel_stage_runs_with_dark() {
    let mut data = Array2::from_elem((10, 10), 0.3f32);
    data[[5, 5]] = 0.95;
    let catalog = MasterCatalog::new().with_dark(dark("dark", 10, 10, 0.0, EXPOSURE));
    let mut light = light_frame(data);
    let report = engine(catalog).calibrate(&mut light, &NoOpReporter).unwrap();

    assert!(report.stage(CalibrationStage::HotPixel).unwrap().is_applied());
    assert!(common::all_close(&light.buffer, 0.3, 1e-6));
}

#[test]
fn test_hot_pixel_stage_spares_stars() {
    let mut data = Array2::from_elem((10, 10), 0.3f32);
    data[[5, 5]] = 0.95;
    let catalog = MasterCatalog::new().with_dark(dark("dark", 10, 10, 0.0, EXPOSURE));
    let stars = StarList::new(vec![Star::circle(5.0, 5.0, 1.0)]);
    let mut light = light_frame(data).with_stars(stars);
    engine(catalog).calibrate(&mut light, &NoOpReporter).unwrap();

    assert_eq!(light.buffer.data[[0, 5, 5]], 0.95);
}

#[test]
fn test_hot_pixel_stage_skipped_without_dark() {
    let catalog = MasterCatalog::new().with_offset(offset("bias", 6, 6, 0.0));
    let mut light = light_frame(Array2::from_elem((6, 6), 0.2));
    let report = engine(catalog).calibrate(&mut light, &NoOpReporter).unwrap();
    assert_eq!(
        report.stage(CalibrationStage::HotPixel),
        Some(&StageStatus::Skipped(SkipReason::NoMaster))
    );
}

#[test]
fn test_hot_pixel_stage_skipped_when_disabled() {
    let catalog = MasterCatalog::new().with_dark(dark("dark", 6, 6, 0.0, EXPOSURE));
    let mut light = light_frame(Array2::from_elem((6, 6), 0.2));
    let report = engine_with(no_hot_pixels(), catalog)
        .calibrate(&mut light, &NoOpReporter)
        .unwrap();
    assert_eq!(
        report.stage(CalibrationStage::HotPixel),
        Some(&StageStatus::Skipped(SkipReason::Disabled))
    );
}

#[test]
fn test_apply_all_masters_with_explicit_selection() {
    let mut selection = MasterSelection::none();
    selection.offset = Some(Arc::new(offset("bias", 4, 4, 0.25)));
    let mut buffer = mono("light", 4, 4, 0.75);
    let report = engine(MasterCatalog::new())
        .apply_all_masters(&mut buffer, &selection, None, &NoOpReporter)
        .unwrap();
    assert_eq!(report.applied(), vec![CalibrationStage::Offset]);
    assert!(common::all_close(&buffer, 0.5, 1e-6));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn test_dimension_mismatch_leaves_frame_untouched() {
    let catalog = MasterCatalog::new()
        .with_offset(offset("bias", 4, 4, 0.1))
        .with_dark(dark("dark", 4, 5, 0.1, EXPOSURE));
    let mut light = light_frame(Array2::from_elem((4, 4), 0.5));
    let err = engine(catalog)
        .calibrate(&mut light, &NoOpReporter)
        .unwrap_err();

    match &err {
        CalibrationError::Frame { frame, .. } => assert_eq!(frame.as_str(), "light"),
        other => panic!("error not tagged with frame: {other:?}"),
    }
    assert!(matches!(
        err.root(),
        CalibrationError::DimensionMismatch {
            stage: CalibrationStage::Dark,
            ..
        }
    ));
    assert!(common::all_close(&light.buffer, 0.5, 0.0));
}

#[test]
fn test_layout_mismatch_leaves_frame_untouched() {
    let catalog = MasterCatalog::new()
        .with_offset(offset("bias", 4, 4, 0.1))
        .with_flat(flat_from("flat", Array2::from_elem((4, 4), 0.5)));
    let buffer = PixelBuffer::new(
        FrameId::new("light"),
        Array3::from_elem((1, 4, 4), 0.5f32),
        ChannelLayout::Bayer(CfaPattern::Rggb),
        16,
    )
    .unwrap();
    let mut light = LightFrame::new(buffer, StackingInfo::with_exposure(EXPOSURE));
    let err = engine(catalog)
        .calibrate(&mut light, &NoOpReporter)
        .unwrap_err();

    assert!(matches!(
        err.root(),
        CalibrationError::LayoutMismatch {
            stage: CalibrationStage::Flat,
            ..
        }
    ));
    assert!(common::all_close(&light.buffer, 0.5, 0.0));
}

#[test]
fn test_required_master_missing_fails_frame() {
    let settings = CalibrationSettings {
        required: RequiredMasters {
            dark: true,
            ..Default::default()
        },
        ..CalibrationSettings::default()
    };
    let catalog = MasterCatalog::new().with_offset(offset("bias", 4, 4, 0.1));
    let mut light = light_frame(Array2::from_elem((4, 4), 0.5));
    let err = engine_with(settings, catalog)
        .calibrate(&mut light, &NoOpReporter)
        .unwrap_err();

    assert!(matches!(
        err.root(),
        CalibrationError::NoMatchingMaster(MasterKind::Dark)
    ));
    assert!(common::all_close(&light.buffer, 0.5, 0.0));
}

// ---------------------------------------------------------------------------
// Progress and cancellation
// ---------------------------------------------------------------------------

#[test]
fn test_progress_reported_after_every_stage() {
    let recorder = Recorder::default();
    let mut light = light_frame(Array2::from_elem((4, 4), 0.5));
    engine(MasterCatalog::new())
        .calibrate(&mut light, &recorder)
        .unwrap();

    let events = recorder.events.lock().unwrap();
    let stages: Vec<_> = events.iter().map(|(s, _)| *s).collect();
    assert_eq!(stages, CalibrationStage::ALL.to_vec());
    let fractions: Vec<_> = events.iter().map(|(_, f)| *f).collect();
    assert_eq!(fractions, vec![0.25, 0.5, 0.75, 1.0]);
}

#[test]
fn test_cancel_after_offset_keeps_offset_only() {
    let catalog = MasterCatalog::new()
        .with_offset(offset("bias", 4, 4, 0.1))
        .with_dark(dark("dark", 4, 4, 0.1, EXPOSURE));
    let recorder = Recorder {
        cancel_after: Some(CalibrationStage::Offset),
        ..Default::default()
    };
    let mut light = light_frame(Array2::from_elem((4, 4), 0.5));
    let report = engine(catalog).calibrate(&mut light, &recorder).unwrap();

    assert_eq!(report.status, FrameStatus::Cancelled);
    assert_eq!(report.stages.len(), 1);
    assert!(common::all_close(&light.buffer, 0.4, 1e-6));
}

#[test]
fn test_cancel_on_last_stage_completes() {
    let recorder = Recorder {
        cancel_after: Some(CalibrationStage::HotPixel),
        ..Default::default()
    };
    let mut light = light_frame(Array2::from_elem((4, 4), 0.5));
    let report = engine(MasterCatalog::new())
        .calibrate(&mut light, &recorder)
        .unwrap();
    assert_eq!(report.status, FrameStatus::Completed);
    assert_eq!(report.stages.len(), 4);
}

#[test]
fn test_cancel_before_first_stage() {
    let catalog = MasterCatalog::new().with_offset(offset("bias", 4, 4, 0.1));
    let mut light = light_frame(Array2::from_elem((4, 4), 0.5));
    let report = engine(catalog).calibrate(&mut light, &AlwaysCancel).unwrap();

    assert!(report.is_cancelled());
    assert!(report.stages.is_empty());
    assert!(common::all_close(&light.buffer, 0.5, 0.0));
}

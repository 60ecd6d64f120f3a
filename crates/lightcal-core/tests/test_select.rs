mod common;

use lightcal_core::error::CalibrationError;
use lightcal_core::frame::StackingInfo;
use lightcal_core::masters::{
    select_masters, MasterCatalog, MasterDark, MasterFlat, MasterKind, MasterOffset,
};
use lightcal_core::pipeline::config::{FlatNormalization, RequiredMasters};

use common::mono;

fn offset_at(id: &str, timestamp: Option<i64>) -> MasterOffset {
    let info = StackingInfo {
        timestamp,
        ..Default::default()
    };
    MasterOffset::new(mono(id, 4, 4, 0.01), info)
}

fn dark_with(id: &str, exposure: f64, temperature: Option<f64>, gain: Option<i32>) -> MasterDark {
    let info = StackingInfo {
        exposure,
        temperature,
        gain,
        ..Default::default()
    };
    MasterDark::new(mono(id, 4, 4, 0.02), info)
}

fn flat_with(id: &str, filter: Option<&str>, binning: u8, timestamp: Option<i64>) -> MasterFlat {
    let info = StackingInfo {
        filter: filter.map(str::to_string),
        binning,
        timestamp,
        ..Default::default()
    };
    MasterFlat::new(mono(id, 4, 4, 0.5), info, FlatNormalization::Median).unwrap()
}

fn light(exposure: f64) -> StackingInfo {
    StackingInfo::with_exposure(exposure)
}

// ---------------------------------------------------------------------------
// Offset
// ---------------------------------------------------------------------------

#[test]
fn test_offset_closest_in_time() {
    let catalog = MasterCatalog::new()
        .with_offset(offset_at("early", Some(100)))
        .with_offset(offset_at("near", Some(1_000)))
        .with_offset(offset_at("late", Some(5_000)));
    let info = StackingInfo {
        timestamp: Some(900),
        ..light(60.0)
    };
    let selection = select_masters(&info, &catalog);
    let offset = selection.offset.expect("offset selected");
    assert_eq!(offset.buffer().id().as_str(), "near");
}

#[test]
fn test_offset_without_timestamps_takes_first() {
    let catalog = MasterCatalog::new()
        .with_offset(offset_at("first", None))
        .with_offset(offset_at("second", None));
    let selection = select_masters(&light(60.0), &catalog);
    assert_eq!(selection.offset.unwrap().buffer().id().as_str(), "first");
}

// ---------------------------------------------------------------------------
// Dark
// ---------------------------------------------------------------------------

#[test]
fn test_dark_exact_match_preferred() {
    let catalog = MasterCatalog::new()
        .with_dark(dark_with("warm", 300.0, Some(5.0), None))
        .with_dark(dark_with("exact", 300.0, Some(-10.2), None))
        .with_dark(dark_with("long", 600.0, Some(-10.0), None));
    let info = StackingInfo {
        temperature: Some(-10.0),
        ..light(300.0)
    };
    let dark = select_masters(&info, &catalog).dark.expect("dark selected");
    assert_eq!(dark.master.buffer().id().as_str(), "exact");
    assert!(dark.exact);
    assert_eq!(dark.scale, 1.0);
}

#[test]
fn test_dark_closest_exposure_scaled() {
    let catalog = MasterCatalog::new()
        .with_dark(dark_with("d60", 60.0, None, None))
        .with_dark(dark_with("d300", 300.0, None, None));
    let dark = select_masters(&light(120.0), &catalog).dark.unwrap();
    assert_eq!(dark.master.buffer().id().as_str(), "d60");
    assert!(!dark.exact);
    assert!((dark.scale - 2.0).abs() < 1e-6);
}

#[test]
fn test_dark_temperature_breaks_exposure_tie() {
    let catalog = MasterCatalog::new()
        .with_dark(dark_with("cold", 300.0, Some(-20.0), None))
        .with_dark(dark_with("mild", 300.0, Some(-5.0), None));
    let info = StackingInfo {
        temperature: Some(-4.0),
        ..light(300.0)
    };
    let dark = select_masters(&info, &catalog).dark.unwrap();
    assert_eq!(dark.master.buffer().id().as_str(), "mild");
    assert!(!dark.exact);
    assert_eq!(dark.scale, 1.0);
}

#[test]
fn test_dark_gain_breaks_remaining_tie() {
    let catalog = MasterCatalog::new()
        .with_dark(dark_with("g100", 120.0, None, Some(100)))
        .with_dark(dark_with("g200", 120.0, None, Some(200)));
    let info = StackingInfo {
        gain: Some(200),
        ..light(120.0)
    };
    let dark = select_masters(&info, &catalog).dark.unwrap();
    assert_eq!(dark.master.buffer().id().as_str(), "g200");
}

// ---------------------------------------------------------------------------
// Flat
// ---------------------------------------------------------------------------

#[test]
fn test_flat_matches_filter() {
    let catalog = MasterCatalog::new()
        .with_flat(flat_with("ha", Some("Ha"), 1, None))
        .with_flat(flat_with("oiii", Some("OIII"), 1, None));
    let info = StackingInfo {
        filter: Some("OIII".into()),
        ..light(300.0)
    };
    let flat = select_masters(&info, &catalog).flat.unwrap();
    assert_eq!(flat.buffer().id().as_str(), "oiii");
}

#[test]
fn test_flat_binning_mismatch_not_selected() {
    let catalog = MasterCatalog::new().with_flat(flat_with("bin2", None, 2, None));
    let selection = select_masters(&light(300.0), &catalog);
    assert!(selection.flat.is_none());
}

#[test]
fn test_flat_closest_in_time_among_matches() {
    let catalog = MasterCatalog::new()
        .with_flat(flat_with("monday", Some("L"), 1, Some(0)))
        .with_flat(flat_with("tuesday", Some("L"), 1, Some(86_400)))
        .with_flat(flat_with("other_filter", Some("R"), 1, Some(90_000)));
    let info = StackingInfo {
        filter: Some("L".into()),
        timestamp: Some(90_000),
        ..light(300.0)
    };
    let flat = select_masters(&info, &catalog).flat.unwrap();
    assert_eq!(flat.buffer().id().as_str(), "tuesday");
}

// ---------------------------------------------------------------------------
// Missing masters
// ---------------------------------------------------------------------------

#[test]
fn test_empty_catalog_selects_nothing() {
    let selection = select_masters(&light(60.0), &MasterCatalog::new());
    assert!(selection.is_empty());
    assert_eq!(
        selection.missing(),
        vec![MasterKind::Offset, MasterKind::Dark, MasterKind::Flat]
    );
    assert!(selection.require(&RequiredMasters::default()).is_ok());
}

#[test]
fn test_require_reports_first_missing_kind() {
    let catalog = MasterCatalog::new().with_offset(offset_at("bias", None));
    let selection = select_masters(&light(60.0), &catalog);
    let err = selection.require(&RequiredMasters::all()).unwrap_err();
    assert!(matches!(err, CalibrationError::NoMatchingMaster(MasterKind::Dark)));

    let only_offset = RequiredMasters {
        offset: true,
        ..Default::default()
    };
    assert!(selection.require(&only_offset).is_ok());
}

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_HOT_PIXEL_NOISE_FLOOR, DEFAULT_HOT_PIXEL_SIGMA, DEFAULT_MIN_FLAT_RATIO,
    DEFAULT_SATURATION_LEVEL, DEFAULT_STAR_MARGIN,
};
use crate::masters::MasterKind;

/// Engine-wide calibration settings, fixed for the lifetime of an engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CalibrationSettings {
    /// Leave saturated pixels out of flat division to avoid amplifying blooms.
    #[serde(default)]
    pub debloom: bool,
    /// Normalized sample value at or above which a pixel counts as saturated.
    #[serde(default = "default_saturation_level")]
    pub saturation_level: f32,
    #[serde(default)]
    pub flat: FlatConfig,
    #[serde(default)]
    pub hot_pixel: HotPixelConfig,
    #[serde(default)]
    pub required: RequiredMasters,
    #[serde(default)]
    pub on_error: ErrorPolicy,
}

fn default_saturation_level() -> f32 {
    DEFAULT_SATURATION_LEVEL
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            debloom: false,
            saturation_level: DEFAULT_SATURATION_LEVEL,
            flat: FlatConfig::default(),
            hot_pixel: HotPixelConfig::default(),
            required: RequiredMasters::default(),
            on_error: ErrorPolicy::default(),
        }
    }
}

/// How a flat master's reference level is measured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlatNormalization {
    Mean,
    #[default]
    Median,
}

impl std::fmt::Display for FlatNormalization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mean => write!(f, "Mean"),
            Self::Median => write!(f, "Median"),
        }
    }
}

/// What to write into a pixel whose flat value is too small to divide by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefectivePixelPolicy {
    /// Keep the value the pixel had before flat correction.
    #[default]
    KeepUncorrected,
    /// Write `DEFECTIVE_PIXEL_SENTINEL` so later stages treat it as missing.
    Sentinel,
}

impl std::fmt::Display for DefectivePixelPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeepUncorrected => write!(f, "Keep Uncorrected"),
            Self::Sentinel => write!(f, "Sentinel"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlatConfig {
    #[serde(default)]
    pub normalization: FlatNormalization,
    /// Flat pixels below this fraction of their plane's reference are defective.
    #[serde(default = "default_min_flat_ratio")]
    pub min_flat_ratio: f32,
    #[serde(default)]
    pub defective_policy: DefectivePixelPolicy,
}

fn default_min_flat_ratio() -> f32 {
    DEFAULT_MIN_FLAT_RATIO
}

impl Default for FlatConfig {
    fn default() -> Self {
        Self {
            normalization: FlatNormalization::default(),
            min_flat_ratio: DEFAULT_MIN_FLAT_RATIO,
            defective_policy: DefectivePixelPolicy::default(),
        }
    }
}

/// Replacement value for an interpolated hot pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpolationMethod {
    #[default]
    Median,
    Mean,
}

impl std::fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Median => write!(f, "Median"),
            Self::Mean => write!(f, "Mean"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HotPixelConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Rejection threshold in local deviations.
    #[serde(default = "default_hot_pixel_sigma")]
    pub sigma: f32,
    /// Lower bound on the local deviation.
    #[serde(default = "default_noise_floor")]
    pub noise_floor: f32,
    #[serde(default)]
    pub method: InterpolationMethod,
    /// Pixels added around every star extent before protection.
    #[serde(default = "default_star_margin")]
    pub star_margin: f64,
    /// Also replace pixels that are abnormally low.
    #[serde(default = "default_true")]
    pub detect_cold: bool,
}

fn default_true() -> bool {
    true
}
fn default_hot_pixel_sigma() -> f32 {
    DEFAULT_HOT_PIXEL_SIGMA
}
fn default_noise_floor() -> f32 {
    DEFAULT_HOT_PIXEL_NOISE_FLOOR
}
fn default_star_margin() -> f64 {
    DEFAULT_STAR_MARGIN
}

impl Default for HotPixelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sigma: DEFAULT_HOT_PIXEL_SIGMA,
            noise_floor: DEFAULT_HOT_PIXEL_NOISE_FLOOR,
            method: InterpolationMethod::default(),
            star_margin: DEFAULT_STAR_MARGIN,
            detect_cold: true,
        }
    }
}

/// Master kinds whose absence fails the frame instead of skipping the stage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredMasters {
    #[serde(default)]
    pub offset: bool,
    #[serde(default)]
    pub dark: bool,
    #[serde(default)]
    pub flat: bool,
}

impl RequiredMasters {
    pub fn all() -> Self {
        Self {
            offset: true,
            dark: true,
            flat: true,
        }
    }

    pub fn is_required(&self, kind: MasterKind) -> bool {
        match kind {
            MasterKind::Offset => self.offset,
            MasterKind::Dark => self.dark,
            MasterKind::Flat => self.flat,
        }
    }
}

/// What a batch does after one frame fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorPolicy {
    /// Report the failure and keep calibrating the other frames.
    #[default]
    SkipFrame,
    /// Stop starting new frames.
    AbortBatch,
}

impl std::fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SkipFrame => write!(f, "Skip Frame"),
            Self::AbortBatch => write!(f, "Abort Batch"),
        }
    }
}

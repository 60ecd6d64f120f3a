/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f32 = 1e-10;

/// Number of channels in an RGB pixel buffer.
pub const COLOR_CHANNEL_COUNT: usize = 3;

/// Default saturation level of a normalized sample.
pub const DEFAULT_SATURATION_LEVEL: f32 = 1.0;

/// Default fraction of the flat reference below which a flat pixel is
/// considered defective (1%).
pub const DEFAULT_MIN_FLAT_RATIO: f32 = 0.01;

/// Value written into a pixel that could not be flat-corrected when the
/// sentinel policy is selected. Downstream stages treat it as missing data.
pub const DEFECTIVE_PIXEL_SENTINEL: f32 = f32::NAN;

/// Default rejection threshold for hot/cold pixels, in local deviations.
pub const DEFAULT_HOT_PIXEL_SIGMA: f32 = 5.0;

/// Lower bound on the local deviation used for hot pixel detection.
/// Keeps perfectly flat neighborhoods from flagging tiny fluctuations.
pub const DEFAULT_HOT_PIXEL_NOISE_FLOOR: f32 = 0.01;

/// Extra radius (pixels) added around every star extent before protection.
pub const DEFAULT_STAR_MARGIN: f64 = 1.0;

/// Scale from median absolute deviation to standard deviation (Gaussian noise).
pub const MAD_TO_SIGMA: f32 = 1.4826;

/// Minimum number of usable neighbors before a pixel can be judged.
pub const MIN_HOT_PIXEL_NEIGHBORS: usize = 3;

/// Two exposures closer than this (seconds) are considered equal.
pub const EXPOSURE_MATCH_TOLERANCE_S: f64 = 1e-3;

/// Two sensor temperatures closer than this (degrees C) are considered equal.
pub const TEMPERATURE_MATCH_TOLERANCE_C: f64 = 0.5;

/// Number of progress increments reported per calibrated frame.
pub const STAGES_PER_FRAME: usize = 4;

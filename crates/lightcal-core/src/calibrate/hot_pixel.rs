use ndarray::{Array2, ArrayView2};
use tracing::debug;

use crate::consts::{MAD_TO_SIGMA, MIN_HOT_PIXEL_NEIGHBORS};
use crate::frame::PixelBuffer;
use crate::masters::median;
use crate::pipeline::config::{HotPixelConfig, InterpolationMethod};
use crate::pipeline::StageSummary;
use crate::stars::StarList;

use super::helpers::collect_rows;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PixelClass {
    Normal,
    /// Statistical outlier to be replaced.
    Outlier,
    /// Statistical outlier lying on a star; never altered.
    Protected,
}

/// Replace hot and cold pixels with a value interpolated from their
/// same-color neighbors.
///
/// Detection and replacement both read the input frame only, so the result
/// does not depend on scan order. Pixels inside a star extent (grown by
/// `star_margin`) are never modified. Non-finite samples, such as defective
/// flat pixels marked with the sentinel, are always treated as outliers.
pub fn apply_hot_pixel_interpolation(
    frame: &mut PixelBuffer,
    stars: Option<&StarList>,
    config: &HotPixelConfig,
) -> StageSummary {
    let (h, w) = (frame.height(), frame.width());
    let stride = frame.layout.same_color_stride();
    let protection = stars
        .filter(|s| !s.is_empty())
        .map(|s| s.protection_mask(h, w, config.star_margin));

    let mut interpolated = 0usize;
    let mut protected = 0usize;

    for channel in 0..frame.channels() {
        let rows = {
            let input = frame.plane(channel);
            let classes = classify(&input, stride, protection.as_ref(), config);
            protected += classes.iter().filter(|&&c| c == PixelClass::Protected).count();
            replace_outliers(&input, &classes, stride, config.method)
        };

        let mut plane = frame.plane_mut(channel);
        for (row, replacements) in rows.into_iter().enumerate() {
            for (col, v) in replacements {
                plane[[row, col]] = v;
                interpolated += 1;
            }
        }
    }

    debug!(
        frame = %frame.id(),
        interpolated,
        protected,
        stars = stars.map_or(0, StarList::len),
        "Hot pixels interpolated"
    );
    StageSummary {
        interpolated_pixels: interpolated,
        protected_pixels: protected,
        ..Default::default()
    }
}

/// Finite same-color neighbors of `(row, col)` in a 3x3 window scaled by `stride`,
/// optionally excluding pixels flagged as outliers.
fn neighbors(
    input: &ArrayView2<f32>,
    row: usize,
    col: usize,
    stride: usize,
    classes: Option<&Array2<PixelClass>>,
    out: &mut Vec<f32>,
) {
    out.clear();
    let (h, w) = input.dim();
    let s = stride as isize;
    for dy in [-s, 0, s] {
        for dx in [-s, 0, s] {
            if dy == 0 && dx == 0 {
                continue;
            }
            let r = row as isize + dy;
            let c = col as isize + dx;
            if r < 0 || c < 0 || r >= h as isize || c >= w as isize {
                continue;
            }
            let (r, c) = (r as usize, c as usize);
            if classes.is_some_and(|cl| cl[[r, c]] != PixelClass::Normal) {
                continue;
            }
            let v = input[[r, c]];
            if v.is_finite() {
                out.push(v);
            }
        }
    }
}

fn classify(
    input: &ArrayView2<f32>,
    stride: usize,
    protection: Option<&Array2<bool>>,
    config: &HotPixelConfig,
) -> Array2<PixelClass> {
    let (h, w) = input.dim();
    let rows = collect_rows(h, w, |row| {
        let mut window = Vec::with_capacity(8);
        (0..w)
            .map(|col| {
                let v = input[[row, col]];
                let outlier = if !v.is_finite() {
                    true
                } else {
                    neighbors(input, row, col, stride, None, &mut window);
                    is_outlier(v, &mut window, config)
                };
                match (outlier, protection.is_some_and(|m| m[[row, col]])) {
                    (false, _) => PixelClass::Normal,
                    (true, false) => PixelClass::Outlier,
                    (true, true) => PixelClass::Protected,
                }
            })
            .collect::<Vec<_>>()
    });

    let mut classes = Array2::from_elem((h, w), PixelClass::Normal);
    for (row, row_classes) in rows.into_iter().enumerate() {
        for (col, class) in row_classes.into_iter().enumerate() {
            classes[[row, col]] = class;
        }
    }
    classes
}

fn is_outlier(v: f32, window: &mut [f32], config: &HotPixelConfig) -> bool {
    let n = window.len();
    if n < MIN_HOT_PIXEL_NEIGHBORS {
        return false;
    }
    let center = median(window);
    let mut spread = [0.0f32; 8];
    for (d, &x) in spread.iter_mut().zip(window.iter()) {
        *d = (x - center).abs();
    }
    let deviation = (MAD_TO_SIGMA * median(&mut spread[..n])).max(config.noise_floor);
    let diff = v - center;
    let limit = config.sigma * deviation;
    diff > limit || (config.detect_cold && -diff > limit)
}

/// Replacement values per row as `(col, value)` pairs.
fn replace_outliers(
    input: &ArrayView2<f32>,
    classes: &Array2<PixelClass>,
    stride: usize,
    method: InterpolationMethod,
) -> Vec<Vec<(usize, f32)>> {
    let (h, w) = input.dim();
    collect_rows(h, w, |row| {
        let mut window = Vec::with_capacity(8);
        let mut replaced = Vec::new();
        for col in 0..w {
            if classes[[row, col]] != PixelClass::Outlier {
                continue;
            }
            neighbors(input, row, col, stride, Some(classes), &mut window);
            if window.is_empty() {
                continue;
            }
            let value = match method {
                InterpolationMethod::Median => median(&mut window),
                InterpolationMethod::Mean => window.iter().sum::<f32>() / window.len() as f32,
            };
            replaced.push((col, value));
        }
        replaced
    })
}

#![allow(dead_code)]

use ndarray::{Array2, Array3};

use lightcal_core::frame::{ChannelLayout, FrameId, PixelBuffer, StackingInfo};
use lightcal_core::masters::{MasterDark, MasterFlat, MasterOffset, SelectedDark, dark_scale};
use lightcal_core::pipeline::config::FlatNormalization;

use std::sync::Arc;

/// Mono buffer of `h` rows by `w` columns filled with `fill`.
pub fn mono(id: &str, h: usize, w: usize, fill: f32) -> PixelBuffer {
    PixelBuffer::mono(FrameId::new(id), Array2::from_elem((h, w), fill), 16).unwrap()
}

/// Mono buffer from explicit data.
pub fn mono_from(id: &str, data: Array2<f32>) -> PixelBuffer {
    PixelBuffer::mono(FrameId::new(id), data, 16).unwrap()
}

/// RGB buffer with a different fill per channel.
pub fn rgb(id: &str, h: usize, w: usize, fill: [f32; 3]) -> PixelBuffer {
    let mut data = Array3::<f32>::zeros((3, h, w));
    for c in 0..3 {
        data.index_axis_mut(ndarray::Axis(0), c).fill(fill[c]);
    }
    PixelBuffer::new(FrameId::new(id), data, ChannelLayout::Rgb, 16).unwrap()
}

pub fn offset(id: &str, h: usize, w: usize, fill: f32) -> MasterOffset {
    MasterOffset::new(mono(id, h, w, fill), StackingInfo::default())
}

pub fn dark(id: &str, h: usize, w: usize, fill: f32, exposure: f64) -> MasterDark {
    MasterDark::new(mono(id, h, w, fill), StackingInfo::with_exposure(exposure))
}

pub fn flat(id: &str, h: usize, w: usize, fill: f32) -> MasterFlat {
    MasterFlat::new(mono(id, h, w, fill), StackingInfo::default(), FlatNormalization::Median)
        .unwrap()
}

pub fn flat_from(id: &str, data: Array2<f32>) -> MasterFlat {
    MasterFlat::new(mono_from(id, data), StackingInfo::default(), FlatNormalization::Median)
        .unwrap()
}

/// Dark selected for a light of `light_exposure` seconds.
pub fn selected_dark(master: MasterDark, light_exposure: f64) -> SelectedDark {
    let scale = dark_scale(light_exposure, master.info.exposure);
    SelectedDark {
        master: Arc::new(master),
        scale,
        exact: scale == 1.0,
    }
}

/// Every sample of `buffer` within `tol` of `expected`.
pub fn all_close(buffer: &PixelBuffer, expected: f32, tol: f32) -> bool {
    buffer.data.iter().all(|&v| (v - expected).abs() <= tol)
}

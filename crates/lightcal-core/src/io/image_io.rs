use std::path::Path;

use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Pixel, Rgb};
use ndarray::Array3;
use num_traits::PrimInt;

use crate::consts::COLOR_CHANNEL_COUNT;
use crate::error::{CalibrationError, Result};
use crate::frame::{ChannelLayout, FrameId, PixelBuffer};

/// Load an image file into a pixel buffer normalized to [0.0, 1.0].
///
/// 8/16-bit gray and RGB and 32-bit float RGB are read as-is; other formats
/// are converted to 16-bit. `layout` overrides the layout implied by the
/// file, e.g. to mark a gray TIFF as an undebayered Bayer mosaic.
pub fn load_image(path: &Path, layout: Option<ChannelLayout>) -> Result<PixelBuffer> {
    let img = image::open(path)?;
    let (data, file_layout, bit_depth) = match img {
        DynamicImage::ImageLuma8(buf) => (integer_planes(&buf, 1), ChannelLayout::Mono, 8),
        DynamicImage::ImageLuma16(buf) => (integer_planes(&buf, 1), ChannelLayout::Mono, 16),
        DynamicImage::ImageRgb8(buf) => (
            integer_planes(&buf, COLOR_CHANNEL_COUNT),
            ChannelLayout::Rgb,
            8,
        ),
        DynamicImage::ImageRgb16(buf) => (
            integer_planes(&buf, COLOR_CHANNEL_COUNT),
            ChannelLayout::Rgb,
            16,
        ),
        DynamicImage::ImageRgb32F(buf) => (float_planes(&buf), ChannelLayout::Rgb, 32),
        other if other.color().has_color() => (
            integer_planes(&other.to_rgb16(), COLOR_CHANNEL_COUNT),
            ChannelLayout::Rgb,
            16,
        ),
        other => (integer_planes(&other.to_luma16(), 1), ChannelLayout::Mono, 16),
    };

    let id = FrameId::new(path.display().to_string());
    PixelBuffer::new(id, data, layout.unwrap_or(file_layout), bit_depth)
}

/// Split an integer image into (channels, height, width) planes scaled by
/// the sample type's maximum.
fn integer_planes<P, S>(img: &ImageBuffer<P, Vec<S>>, channels: usize) -> Array3<f32>
where
    P: Pixel<Subpixel = S>,
    S: image::Primitive + PrimInt,
{
    let (w, h) = img.dimensions();
    let max = S::max_value().to_f32().unwrap_or(1.0);
    let mut data = Array3::<f32>::zeros((channels, h as usize, w as usize));
    for (col, row, px) in img.enumerate_pixels() {
        for (c, s) in px.channels().iter().take(channels).enumerate() {
            data[[c, row as usize, col as usize]] = s.to_f32().unwrap_or(0.0) / max;
        }
    }
    data
}

fn float_planes(img: &ImageBuffer<Rgb<f32>, Vec<f32>>) -> Array3<f32> {
    let (w, h) = img.dimensions();
    let mut data = Array3::<f32>::zeros((COLOR_CHANNEL_COUNT, h as usize, w as usize));
    for (col, row, px) in img.enumerate_pixels() {
        for (c, &s) in px.0.iter().enumerate() {
            data[[c, row as usize, col as usize]] = s;
        }
    }
    data
}

/// Quantize a normalized sample. Non-finite samples become 0.
fn quantize(v: f32, max: f32) -> f32 {
    if v.is_finite() {
        (v.clamp(0.0, 1.0) * max).round()
    } else {
        0.0
    }
}

/// Save a buffer as 16-bit TIFF (gray or RGB).
pub fn save_tiff(buffer: &PixelBuffer, path: &Path) -> Result<()> {
    let (w, h) = (buffer.width() as u32, buffer.height() as u32);
    let channels = buffer.channels();
    let mut pixels: Vec<u16> = Vec::with_capacity(buffer.data.len());
    for row in 0..buffer.height() {
        for col in 0..buffer.width() {
            for c in 0..channels {
                pixels.push(quantize(buffer.data[[c, row, col]], 65535.0) as u16);
            }
        }
    }

    let invalid = || CalibrationError::InvalidDimensions {
        width: w as usize,
        height: h as usize,
    };
    if channels == COLOR_CHANNEL_COUNT {
        let img = ImageBuffer::<Rgb<u16>, Vec<u16>>::from_raw(w, h, pixels).ok_or_else(invalid)?;
        img.save_with_format(path, ImageFormat::Tiff)?;
    } else {
        let img = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w, h, pixels).ok_or_else(invalid)?;
        img.save_with_format(path, ImageFormat::Tiff)?;
    }
    Ok(())
}

/// Save a buffer as 8-bit PNG (gray or RGB).
pub fn save_png(buffer: &PixelBuffer, path: &Path) -> Result<()> {
    let (w, h) = (buffer.width() as u32, buffer.height() as u32);
    let channels = buffer.channels();
    let mut pixels: Vec<u8> = Vec::with_capacity(buffer.data.len());
    for row in 0..buffer.height() {
        for col in 0..buffer.width() {
            for c in 0..channels {
                pixels.push(quantize(buffer.data[[c, row, col]], 255.0) as u8);
            }
        }
    }

    let invalid = || CalibrationError::InvalidDimensions {
        width: w as usize,
        height: h as usize,
    };
    if channels == COLOR_CHANNEL_COUNT {
        let img = image::RgbImage::from_raw(w, h, pixels).ok_or_else(invalid)?;
        img.save_with_format(path, ImageFormat::Png)?;
    } else {
        let img = image::GrayImage::from_raw(w, h, pixels).ok_or_else(invalid)?;
        img.save_with_format(path, ImageFormat::Png)?;
    }
    Ok(())
}

/// Save a buffer, choosing format from file extension.
pub fn save_image(buffer: &PixelBuffer, path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => save_png(buffer, path),
        _ => save_tiff(buffer, path),
    }
}

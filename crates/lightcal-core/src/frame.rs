use std::fmt;
use std::sync::Arc;

use ndarray::{Array2, Array3, ArrayView2, ArrayViewMut2, Axis};
use serde::{Deserialize, Serialize};

use crate::consts::COLOR_CHANNEL_COUNT;
use crate::error::{CalibrationError, Result};

/// Identity of the source frame a buffer was decoded from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FrameId(Arc<str>);

impl FrameId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FrameId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// 2x2 color filter array arrangement, named from the top-left cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CfaPattern {
    Rggb,
    Grbg,
    Gbrg,
    Bggr,
}

impl CfaPattern {
    /// Color index (0 = red, 1 = green, 2 = blue) of the sensel at `(row, col)`.
    pub fn color_at(self, row: usize, col: usize) -> usize {
        let cell = (row % 2) * 2 + (col % 2);
        let colors: [usize; 4] = match self {
            Self::Rggb => [0, 1, 1, 2],
            Self::Grbg => [1, 0, 2, 1],
            Self::Gbrg => [1, 2, 0, 1],
            Self::Bggr => [2, 1, 1, 0],
        };
        colors[cell]
    }
}

/// How the channels of a buffer relate to sensor colors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelLayout {
    /// Single channel, every pixel sees the same band.
    #[default]
    Mono,
    /// Single channel holding an undebayered color mosaic.
    Bayer(CfaPattern),
    /// Three channels: red, green, blue.
    Rgb,
}

impl ChannelLayout {
    pub fn channel_count(self) -> usize {
        match self {
            Self::Mono | Self::Bayer(_) => 1,
            Self::Rgb => COLOR_CHANNEL_COUNT,
        }
    }

    /// Number of independently normalized color planes.
    pub fn color_planes(self) -> usize {
        match self {
            Self::Mono => 1,
            Self::Bayer(_) | Self::Rgb => COLOR_CHANNEL_COUNT,
        }
    }

    /// Color plane a sample belongs to.
    pub fn color_plane(self, channel: usize, row: usize, col: usize) -> usize {
        match self {
            Self::Mono => 0,
            Self::Bayer(pattern) => pattern.color_at(row, col),
            Self::Rgb => channel,
        }
    }

    /// Distance between two neighboring sensels of the same color.
    pub fn same_color_stride(self) -> usize {
        match self {
            Self::Bayer(_) => 2,
            Self::Mono | Self::Rgb => 1,
        }
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mono => write!(f, "Mono"),
            Self::Bayer(p) => write!(f, "Bayer {:?}", p),
            Self::Rgb => write!(f, "RGB"),
        }
    }
}

/// Width, height and channel count of a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameDims {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

impl fmt::Display for FrameDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

/// One image held in memory: a light frame or a master frame.
/// Samples are f32 normalized to [0.0, 1.0].
#[derive(Clone, Debug)]
pub struct PixelBuffer {
    id: FrameId,
    /// Pixel data, shape = (channels, height, width)
    pub data: Array3<f32>,
    pub layout: ChannelLayout,
    /// Bit depth of the source samples (8, 16, 32)
    pub bit_depth: u8,
}

impl PixelBuffer {
    pub fn new(
        id: FrameId,
        data: Array3<f32>,
        layout: ChannelLayout,
        bit_depth: u8,
    ) -> Result<Self> {
        let (channels, height, width) = data.dim();
        if width == 0 || height == 0 {
            return Err(CalibrationError::InvalidDimensions { width, height });
        }
        if channels != layout.channel_count() {
            return Err(CalibrationError::UnsupportedLayout(format!(
                "{} requires {} channel(s), buffer has {}",
                layout,
                layout.channel_count(),
                channels
            )));
        }
        Ok(Self {
            id,
            data,
            layout,
            bit_depth,
        })
    }

    /// Single-channel buffer from a 2-D array.
    pub fn mono(id: FrameId, data: Array2<f32>, bit_depth: u8) -> Result<Self> {
        Self::new(id, data.insert_axis(Axis(0)), ChannelLayout::Mono, bit_depth)
    }

    /// Buffer with every sample set to `value`.
    pub fn filled(
        id: FrameId,
        layout: ChannelLayout,
        height: usize,
        width: usize,
        value: f32,
    ) -> Result<Self> {
        let data = Array3::from_elem((layout.channel_count(), height, width), value);
        Self::new(id, data, layout, 16)
    }

    pub fn id(&self) -> &FrameId {
        &self.id
    }

    pub fn width(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    pub fn height(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn channels(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn dims(&self) -> FrameDims {
        FrameDims {
            width: self.width(),
            height: self.height(),
            channels: self.channels(),
        }
    }

    pub fn same_dims(&self, other: &PixelBuffer) -> bool {
        self.dims() == other.dims()
    }

    pub fn plane(&self, channel: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), channel)
    }

    pub fn plane_mut(&mut self, channel: usize) -> ArrayViewMut2<'_, f32> {
        self.data.index_axis_mut(Axis(0), channel)
    }
}

/// Acquisition metadata of one capture, used to match masters to lights.
/// Masters carry the same record for their own capture.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StackingInfo {
    /// Exposure duration in seconds.
    pub exposure: f64,
    /// Sensor gain or ISO.
    #[serde(default)]
    pub gain: Option<i32>,
    /// Sensor temperature in degrees C.
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default = "default_binning")]
    pub binning: u8,
    #[serde(default)]
    pub filter: Option<String>,
    /// Capture time, Unix seconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

fn default_binning() -> u8 {
    1
}

impl Default for StackingInfo {
    fn default() -> Self {
        Self {
            exposure: 0.0,
            gain: None,
            temperature: None,
            binning: default_binning(),
            filter: None,
            timestamp: None,
        }
    }
}

impl StackingInfo {
    pub fn with_exposure(exposure: f64) -> Self {
        Self {
            exposure,
            ..Default::default()
        }
    }
}

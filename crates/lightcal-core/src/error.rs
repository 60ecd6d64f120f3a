use thiserror::Error;

use crate::frame::{ChannelLayout, FrameDims, FrameId};
use crate::masters::MasterKind;
use crate::pipeline::CalibrationStage;

#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Unsupported channel layout: {0}")]
    UnsupportedLayout(String),

    #[error("{stage} master is {actual}, light frame is {expected}")]
    DimensionMismatch {
        stage: CalibrationStage,
        expected: FrameDims,
        actual: FrameDims,
    },

    #[error("{stage} master has {actual} layout, light frame is {expected}")]
    LayoutMismatch {
        stage: CalibrationStage,
        expected: ChannelLayout,
        actual: ChannelLayout,
    },

    #[error("No matching master {0} frame")]
    NoMatchingMaster(MasterKind),

    #[error("Invalid master {kind} frame: {reason}")]
    InvalidMaster { kind: MasterKind, reason: String },

    #[error("Frame {frame}: {source}")]
    Frame {
        frame: FrameId,
        #[source]
        source: Box<CalibrationError>,
    },

    #[error("Batch aborted after an earlier frame failed")]
    BatchAborted,
}

impl CalibrationError {
    /// Tag an error with the identity of the light frame it happened on.
    pub fn for_frame(self, frame: &FrameId) -> Self {
        match self {
            tagged @ Self::Frame { .. } => tagged,
            other => Self::Frame {
                frame: frame.clone(),
                source: Box::new(other),
            },
        }
    }

    /// The underlying error, with any frame tag removed.
    pub fn root(&self) -> &CalibrationError {
        match self {
            Self::Frame { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, CalibrationError>;

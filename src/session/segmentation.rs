use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::buffer::PixelBuffer;

#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error("segmentation model unavailable: {message}")]
    Unavailable { message: String },
    #[error("failed to read mask {path}: {source}")]
    ReadMask {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode mask {path}: {message}")]
    DecodeMask { path: PathBuf, message: String },
}

pub type SegmentationResult<T> = std::result::Result<T, SegmentationError>;

/// Produces a subject mask for an image. Near-white marks the subject.
pub trait SegmentationBackend: Send + Sync {
    fn name(&self) -> &str;
    fn segment(&self, image: &PixelBuffer) -> SegmentationResult<PixelBuffer>;
}

/// Serves a mask that was computed ahead of time and stored as an image file.
#[derive(Debug, Clone)]
pub struct MaskImageBackend {
    path: PathBuf,
}

impl MaskImageBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SegmentationBackend for MaskImageBackend {
    fn name(&self) -> &str {
        "mask-image"
    }

    fn segment(&self, _image: &PixelBuffer) -> SegmentationResult<PixelBuffer> {
        let bytes = std::fs::read(&self.path).map_err(|source| SegmentationError::ReadMask {
            path: self.path.clone(),
            source,
        })?;
        PixelBuffer::decode(&bytes).map_err(|err| SegmentationError::DecodeMask {
            path: self.path.clone(),
            message: err.to_string(),
        })
    }
}

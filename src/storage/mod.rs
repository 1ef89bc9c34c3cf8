use std::fs;
use std::io::{self, Cursor};
use std::path::Path;

use image::ImageFormat;
use thiserror::Error;

use crate::buffer::PixelBuffer;

pub const DEFAULT_OUTPUT_FILE_NAME: &str = "processed-image.png";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("pixel buffer is empty or inconsistent")]
    InvalidBuffer,
    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

pub fn encode_png(buffer: &PixelBuffer) -> StorageResult<Vec<u8>> {
    if buffer.is_empty() {
        return Err(StorageError::InvalidBuffer);
    }
    let image = buffer.to_rgba_image().ok_or(StorageError::InvalidBuffer)?;
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Writes `buffer` as PNG, replacing any existing file and creating parent directories.
pub fn save_png<P: AsRef<Path>>(buffer: &PixelBuffer, destination: P) -> StorageResult<()> {
    let destination = destination.as_ref();
    let bytes = encode_png(buffer)?;

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(destination, bytes)?;
    tracing::info!(path = %destination.display(), "output image written");
    Ok(())
}

use image::RgbaImage;
use thiserror::Error;

use crate::geometry::{Color, ImageBounds};

/// Every color channel of a subject pixel sits at or above this value.
pub const SUBJECT_THRESHOLD: u8 = 200;

pub const CHANNELS: usize = 4;

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("pixel store length {actual} does not match {width}x{height} rgba ({expected})")]
    LengthMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("buffer dimensions {width}x{height} overflow addressable memory")]
    TooLarge { width: u32, height: u32 },
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

pub type BufferResult<T> = std::result::Result<T, BufferError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskClass {
    Subject,
    Background,
}

impl MaskClass {
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        if r >= SUBJECT_THRESHOLD && g >= SUBJECT_THRESHOLD && b >= SUBJECT_THRESHOLD {
            Self::Subject
        } else {
            Self::Background
        }
    }
}

/// Row-major RGBA8 pixels. The store length always equals `width * height * 4`.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

fn store_len(width: u32, height: u32) -> BufferResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(CHANNELS))
        .ok_or(BufferError::TooLarge { width, height })
}

impl PixelBuffer {
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> BufferResult<Self> {
        let expected = store_len(width, height)?;
        if data.len() != expected {
            return Err(BufferError::LengthMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Buffer filled with one opaque color.
    pub fn filled(width: u32, height: u32, color: Color) -> BufferResult<Self> {
        let len = store_len(width, height)?;
        let mut data = Vec::with_capacity(len);
        for _ in 0..len / CHANNELS {
            data.extend_from_slice(&[color.r, color.g, color.b, 255]);
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// All-background mask of the given size.
    pub fn blank_mask(bounds: ImageBounds) -> BufferResult<Self> {
        Self::filled(bounds.width, bounds.height, Color::BLACK)
    }

    /// Decodes any format the `image` crate recognises into RGBA8.
    pub fn decode(bytes: &[u8]) -> BufferResult<Self> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(Self::from(decoded.to_rgba8()))
    }

    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }

    pub const fn bounds(&self) -> ImageBounds {
        ImageBounds::new(self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * CHANNELS;
        self.data
            .get(offset..offset + CHANNELS)
            .map(|px| [px[0], px[1], px[2], px[3]])
    }

    /// Classifies the pixel stored at byte `offset`, or `None` past the end of the store.
    pub fn class_at_offset(&self, offset: usize) -> Option<MaskClass> {
        let px = self.data.get(offset..offset.checked_add(3)?)?;
        Some(MaskClass::from_rgb(px[0], px[1], px[2]))
    }

    pub fn class_at(&self, x: u32, y: u32) -> Option<MaskClass> {
        self.pixel(x, y)
            .map(|[r, g, b, _]| MaskClass::from_rgb(r, g, b))
    }

    pub fn fill(&mut self, color: Color) {
        for px in self.data.chunks_exact_mut(CHANNELS) {
            px.copy_from_slice(&[color.r, color.g, color.b, 255]);
        }
    }

    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn classification_requires_every_channel_at_threshold() {
        assert_eq!(MaskClass::from_rgb(200, 200, 200), MaskClass::Subject);
        assert_eq!(MaskClass::from_rgb(255, 255, 255), MaskClass::Subject);
        assert_eq!(MaskClass::from_rgb(255, 199, 255), MaskClass::Background);
        assert_eq!(MaskClass::from_rgb(0, 0, 0), MaskClass::Background);
    }

    #[test]
    fn from_raw_validates_store_length() {
        let err = PixelBuffer::from_raw(2, 2, vec![0; 15]).expect_err("short store should fail");
        assert!(matches!(
            err,
            BufferError::LengthMismatch {
                expected: 16,
                actual: 15,
                ..
            }
        ));
        assert!(PixelBuffer::from_raw(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn blank_mask_is_opaque_black_background() {
        let mask = PixelBuffer::blank_mask(ImageBounds::new(3, 2)).expect("small mask");
        assert_eq!(mask.byte_len(), 24);
        assert_eq!(mask.pixel(2, 1), Some([0, 0, 0, 255]));
        assert_eq!(mask.class_at(0, 0), Some(MaskClass::Background));
        assert_eq!(mask.pixel(3, 0), None);
    }

    #[test]
    fn class_at_offset_is_none_past_store_end() {
        let mask = PixelBuffer::filled(1, 1, Color::WHITE).expect("tiny mask");
        assert_eq!(mask.class_at_offset(0), Some(MaskClass::Subject));
        assert_eq!(mask.class_at_offset(4), None);
    }

    #[test]
    fn decode_round_trips_png_bytes() {
        let mut image = RgbaImage::new(3, 1);
        image.put_pixel(1, 0, image::Rgba([10, 20, 30, 40]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("png encode should work");

        let buffer = PixelBuffer::decode(&bytes).expect("png decode should work");
        assert_eq!(buffer.bounds(), ImageBounds::new(3, 1));
        assert_eq!(buffer.pixel(1, 0), Some([10, 20, 30, 40]));
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = PixelBuffer::decode(b"not an image").expect_err("garbage should fail");
        assert!(matches!(err, BufferError::Decode(_)));
    }
}

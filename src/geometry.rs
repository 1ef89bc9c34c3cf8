//! Shared geometric and color primitives, plus the display-to-buffer coordinate mapper.
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeometryError {
    #[error("display surface has no usable size ({width}x{height}); not laid out yet")]
    ZeroDisplaySize { width: f64, height: f64 },
    #[error("invalid hex color: {0:?}")]
    InvalidHexColor(&'static str),
}

pub type GeometryResult<T> = std::result::Result<T, GeometryError>;

/// Point in buffer pixel space. Fractional; callers round when indexing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferPoint {
    pub x: f64,
    pub y: f64,
}

impl BufferPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Point relative to the top-left corner of the displayed surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayPoint {
    pub x: f64,
    pub y: f64,
}

impl DisplayPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Laid-out size of the displayed surface. Layout boxes are often fractional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySize {
    pub width: f64,
    pub height: f64,
}

impl DisplaySize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Display matching the buffer one to one.
    pub fn native(bounds: ImageBounds) -> Self {
        Self::new(f64::from(bounds.width), f64::from(bounds.height))
    }

    fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBounds {
    pub width: u32,
    pub height: u32,
}

impl ImageBounds {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub const fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Maps pointer positions on a scaled display surface back into buffer pixels.
///
/// Each axis scales independently, so a buffer shown with a non-uniform stretch
/// still maps correctly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    scale_x: f64,
    scale_y: f64,
}

impl CoordinateMapper {
    pub fn new(buffer: ImageBounds, display: DisplaySize) -> GeometryResult<Self> {
        if !display.is_usable() {
            return Err(GeometryError::ZeroDisplaySize {
                width: display.width,
                height: display.height,
            });
        }

        Ok(Self {
            scale_x: f64::from(buffer.width) / display.width,
            scale_y: f64::from(buffer.height) / display.height,
        })
    }

    pub fn to_buffer(&self, point: DisplayPoint) -> BufferPoint {
        BufferPoint::new(point.x * self.scale_x, point.y * self.scale_y)
    }
}

pub fn map_display_point(
    buffer: ImageBounds,
    display: DisplaySize,
    point: DisplayPoint,
) -> GeometryResult<BufferPoint> {
    CoordinateMapper::new(buffer, display).map(|mapper| mapper.to_buffer(point))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Self = Self::new(255, 255, 255);
    pub const BLACK: Self = Self::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#rrggbb` or `rrggbb`.
    pub fn from_hex(value: &str) -> GeometryResult<Self> {
        let digits = value.trim().strip_prefix('#').unwrap_or(value.trim());
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(GeometryError::InvalidHexColor("expected six hex digits"));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| GeometryError::InvalidHexColor("non-hex digit"))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

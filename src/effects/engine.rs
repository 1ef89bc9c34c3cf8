use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{Effect, EffectError, EffectResult, EffectSpec, MotionDirection};
use crate::buffer::{MaskClass, PixelBuffer, CHANNELS};
use crate::geometry::Color;

const BLUR_RADIUS_SCALE: f64 = 5.0;
const MOTION_LENGTH_SCALE: f64 = 15.0;
const PIXELATE_BLOCK_SCALE: f64 = 20.0;
const PIXELATE_BLOCK_MIN: usize = 2;

const LUMA_R: f64 = 0.30;
const LUMA_G: f64 = 0.59;
const LUMA_B: f64 = 0.11;

/// Shared flag checked once per row; set it to abandon a running pass.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Applies `spec` to every background pixel of `original`, leaving subject pixels untouched.
///
/// Dimensions come from `original`. A mask of a different size is indexed at the
/// same byte offsets anyway (with a warning); offsets past the end of the mask
/// count as subject.
pub fn apply_effect(
    original: &PixelBuffer,
    mask: &PixelBuffer,
    spec: &EffectSpec,
) -> EffectResult<PixelBuffer> {
    apply_effect_with_cancel(original, mask, spec, &CancelToken::new())
}

pub fn apply_effect_with_cancel(
    original: &PixelBuffer,
    mask: &PixelBuffer,
    spec: &EffectSpec,
    cancel: &CancelToken,
) -> EffectResult<PixelBuffer> {
    if original.is_empty() || mask.is_empty() {
        tracing::debug!(?original, ?mask, "effect skipped: empty input buffer");
        return Err(EffectError::EmptyBuffer);
    }
    if original.bounds() != mask.bounds() {
        tracing::warn!(
            image_width = original.width(),
            image_height = original.height(),
            mask_width = mask.width(),
            mask_height = mask.height(),
            "mask dimensions do not match image; applying best-effort"
        );
    }

    let source = SourceChannels::capture(original);
    let mut output = original.clone();
    let width = original.width() as usize;
    let height = original.height() as usize;
    let intensity = spec.intensity.get();
    let pass = Pass::new(&spec.effect, intensity);

    tracing::debug!(
        effect = ?spec.effect.kind(),
        intensity,
        width,
        height,
        "applying background effect"
    );

    let data = output.as_raw_mut();
    for y in 0..height {
        if cancel.is_cancelled() {
            tracing::debug!(row = y, "effect cancelled");
            return Err(EffectError::Cancelled);
        }
        for x in 0..width {
            let index = y * width + x;
            let offset = index * CHANNELS;
            if mask.class_at_offset(offset) != Some(MaskClass::Background) {
                continue;
            }
            let pixel = &mut data[offset..offset + 3];
            pass.apply(&source, x, y, pixel);
        }
    }

    Ok(output)
}

/// Read-only copies of the R, G and B planes; neighbour reads never see written values.
struct SourceChannels {
    width: usize,
    height: usize,
    r: Vec<u8>,
    g: Vec<u8>,
    b: Vec<u8>,
}

impl SourceChannels {
    fn capture(buffer: &PixelBuffer) -> Self {
        let pixels = buffer.width() as usize * buffer.height() as usize;
        let mut r = Vec::with_capacity(pixels);
        let mut g = Vec::with_capacity(pixels);
        let mut b = Vec::with_capacity(pixels);
        for px in buffer.as_raw().chunks_exact(CHANNELS) {
            r.push(px[0]);
            g.push(px[1]);
            b.push(px[2]);
        }
        Self {
            width: buffer.width() as usize,
            height: buffer.height() as usize,
            r,
            g,
            b,
        }
    }

    fn rgb(&self, index: usize) -> [f64; 3] {
        [
            f64::from(self.r[index]),
            f64::from(self.g[index]),
            f64::from(self.b[index]),
        ]
    }

    fn index_of(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(y as usize * self.width + x as usize)
    }
}

#[derive(Debug, Clone, Copy)]
enum Pass {
    Blur { radius: i64, intensity: f64 },
    MotionBlur {
        step: (i64, i64),
        length: i64,
        intensity: f64,
    },
    Pixelate { block: usize },
    Colorize { color: Color, intensity: f64 },
    Invert { intensity: f64 },
    Grayscale { intensity: f64 },
}

impl Pass {
    fn new(effect: &Effect, intensity: f64) -> Self {
        match *effect {
            Effect::Blur => Self::Blur {
                radius: scaled_at_least(BLUR_RADIUS_SCALE, intensity, 1) as i64,
                intensity,
            },
            Effect::MotionBlur { direction } => Self::MotionBlur {
                step: MotionDirection::step(direction),
                length: scaled_at_least(MOTION_LENGTH_SCALE, intensity, 1) as i64,
                intensity,
            },
            Effect::Pixelate => Self::Pixelate {
                block: scaled_at_least(PIXELATE_BLOCK_SCALE, intensity, PIXELATE_BLOCK_MIN),
            },
            Effect::Colorize { color } => Self::Colorize { color, intensity },
            Effect::Invert => Self::Invert { intensity },
            Effect::Grayscale => Self::Grayscale { intensity },
        }
    }

    /// Rewrites the RGB triple of one background pixel in place.
    fn apply(&self, source: &SourceChannels, x: usize, y: usize, pixel: &mut [u8]) {
        let own = [
            f64::from(pixel[0]),
            f64::from(pixel[1]),
            f64::from(pixel[2]),
        ];
        match *self {
            Self::Blur { radius, intensity } => {
                let (cx, cy) = (x as i64, y as i64);
                let neighbours = (-radius..=radius).flat_map(|ky| {
                    (-radius..=radius).map(move |kx| (cx + kx, cy + ky))
                });
                if let Some(average) = average_of(source, neighbours) {
                    write_blend(pixel, own, average, intensity);
                }
            }
            Self::MotionBlur {
                step: (sx, sy),
                length,
                intensity,
            } => {
                let (cx, cy) = (x as i64, y as i64);
                let samples = (-length..=length).map(|k| (cx + sx * k, cy + sy * k));
                if let Some(average) = average_of(source, samples) {
                    write_blend(pixel, own, average, intensity);
                }
            }
            Self::Pixelate { block } => {
                let block_x = (x / block) * block;
                let block_y = (y / block) * block;
                if block_x < source.width && block_y < source.height {
                    let [r, g, b] = source.rgb(block_y * source.width + block_x);
                    write_rgb(pixel, [r, g, b]);
                }
            }
            Self::Colorize { color, intensity } => {
                let target = [
                    f64::from(color.r),
                    f64::from(color.g),
                    f64::from(color.b),
                ];
                write_blend(pixel, own, target, intensity);
            }
            Self::Invert { intensity } => {
                // The two intensity terms sum to the original value, so this is 255 - v.
                let inverted = own.map(|v| 255.0 - v * intensity - v * (1.0 - intensity));
                write_rgb(pixel, inverted);
            }
            Self::Grayscale { intensity } => {
                let [r, g, b] = source.rgb(y * source.width + x);
                let luma = r * LUMA_R + g * LUMA_G + b * LUMA_B;
                write_blend(pixel, own, [luma; 3], intensity);
            }
        }
    }
}

fn scaled_at_least(scale: f64, intensity: f64, min: usize) -> usize {
    ((scale * intensity).floor() as usize).max(min)
}

/// Mean of in-bounds samples; out-of-bounds positions count toward neither sum nor count.
fn average_of(
    source: &SourceChannels,
    positions: impl Iterator<Item = (i64, i64)>,
) -> Option<[f64; 3]> {
    let mut sum = [0.0_f64; 3];
    let mut count = 0_u32;
    for (nx, ny) in positions {
        let Some(index) = source.index_of(nx, ny) else {
            continue;
        };
        sum[0] += f64::from(source.r[index]);
        sum[1] += f64::from(source.g[index]);
        sum[2] += f64::from(source.b[index]);
        count += 1;
    }
    if count == 0 {
        return None;
    }
    let count = f64::from(count);
    Some(sum.map(|channel| channel / count))
}

fn write_blend(pixel: &mut [u8], own: [f64; 3], target: [f64; 3], intensity: f64) {
    let keep = 1.0 - intensity;
    write_rgb(
        pixel,
        [
            own[0] * keep + target[0] * intensity,
            own[1] * keep + target[1] * intensity,
            own[2] * keep + target[2] * intensity,
        ],
    );
}

fn write_rgb(pixel: &mut [u8], rgb: [f64; 3]) {
    for (channel, value) in pixel.iter_mut().zip(rgb) {
        *channel = clamp_channel(value);
    }
}

/// Saturating 8-bit store: clamp to `[0, 255]`, round half to even.
pub(crate) fn clamp_channel(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 255.0).round_ties_even() as u8
}

use crate::buffer::{PixelBuffer, CHANNELS};
use crate::geometry::{BufferPoint, Color};

/// Paints every pixel whose centre lies within `radius` of the segment `from..to`.
///
/// This is a line of width `2 * radius` with round caps. A zero-length segment
/// degenerates to a filled disc. Returns the number of pixels touched.
pub(crate) fn paint_capsule(
    target: &mut PixelBuffer,
    from: BufferPoint,
    to: BufferPoint,
    radius: f64,
    color: Color,
) -> usize {
    if target.is_empty() || !(radius > 0.0) || !is_finite(from) || !is_finite(to) {
        return 0;
    }

    let width = target.width();
    let height = target.height();
    let Some((x0, y0, x1, y1)) = clipped_span(from, to, radius, width, height) else {
        return 0;
    };

    let radius_sq = radius * radius;
    let stride = width as usize * CHANNELS;
    let data = target.as_raw_mut();
    let mut touched = 0;

    for y in y0..=y1 {
        let cy = f64::from(y) + 0.5;
        let row = y as usize * stride;
        for x in x0..=x1 {
            let cx = f64::from(x) + 0.5;
            if distance_sq_to_segment(cx, cy, from, to) > radius_sq {
                continue;
            }
            let offset = row + x as usize * CHANNELS;
            data[offset..offset + CHANNELS].copy_from_slice(&[color.r, color.g, color.b, 255]);
            touched += 1;
        }
    }

    touched
}

pub(crate) fn paint_disc(
    target: &mut PixelBuffer,
    center: BufferPoint,
    radius: f64,
    color: Color,
) -> usize {
    paint_capsule(target, center, center, radius, color)
}

fn is_finite(point: BufferPoint) -> bool {
    point.x.is_finite() && point.y.is_finite()
}

fn clipped_span(
    from: BufferPoint,
    to: BufferPoint,
    radius: f64,
    width: u32,
    height: u32,
) -> Option<(u32, u32, u32, u32)> {
    let left = (from.x.min(to.x) - radius).floor();
    let right = (from.x.max(to.x) + radius).ceil();
    let top = (from.y.min(to.y) - radius).floor();
    let bottom = (from.y.max(to.y) + radius).ceil();

    let max_x = f64::from(width - 1);
    let max_y = f64::from(height - 1);
    if right < 0.0 || bottom < 0.0 || left > max_x || top > max_y {
        return None;
    }

    Some((
        left.clamp(0.0, max_x) as u32,
        top.clamp(0.0, max_y) as u32,
        right.clamp(0.0, max_x) as u32,
        bottom.clamp(0.0, max_y) as u32,
    ))
}

fn distance_sq_to_segment(px: f64, py: f64, a: BufferPoint, b: BufferPoint) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((px - a.x) * dx + (py - a.y) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let nx = a.x + t * dx - px;
    let ny = a.y + t * dy - py;
    nx * nx + ny * ny
}

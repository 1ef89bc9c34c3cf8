//! Mask authoring: brush strokes rasterized into a mask buffer with an undoable history.

pub mod history;
mod raster;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buffer::{BufferError, PixelBuffer};
use crate::geometry::{BufferPoint, Color, ImageBounds};

pub use history::{HistoryLimits, HistoryLog, HistorySnapshot};

pub const BRUSH_RADIUS_MIN: u16 = 1;
pub const BRUSH_RADIUS_MAX: u16 = 512;
pub const BRUSH_RADIUS_DEFAULT: u16 = 10;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("mask is {actual_width}x{actual_height} but image is {expected_width}x{expected_height}")]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("no stroke in progress")]
    NotDrawing,
    #[error("cannot edit a zero-sized mask")]
    EmptyImage,
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

pub type EditorResult<T> = std::result::Result<T, EditorError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrushMode {
    /// Marks subject (white).
    #[default]
    Draw,
    /// Marks background (black).
    Erase,
}

impl BrushMode {
    pub const fn color(self) -> Color {
        match self {
            Self::Draw => Color::WHITE,
            Self::Erase => Color::BLACK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushOptions {
    pub mode: BrushMode,
    pub radius: u16,
}

impl Default for BrushOptions {
    fn default() -> Self {
        Self {
            mode: BrushMode::Draw,
            radius: BRUSH_RADIUS_DEFAULT,
        }
    }
}

impl BrushOptions {
    pub fn set_mode(&mut self, mode: BrushMode) {
        self.mode = mode;
    }

    pub fn set_radius(&mut self, radius: u16) {
        self.radius = radius.clamp(BRUSH_RADIUS_MIN, BRUSH_RADIUS_MAX);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokePhase {
    Idle,
    Drawing,
}

/// Transient pointer state between pointer-down and pointer-up.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Stroke {
    brush: BrushOptions,
    last_point: BufferPoint,
    painted: bool,
}

/// Outcome of a history navigation, mirroring what a toolbar would report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOutcome {
    Applied,
    Unavailable,
}

impl HistoryOutcome {
    pub const fn applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Owns the live mask buffer and its snapshot history.
#[derive(Debug, Clone)]
pub struct MaskEditor {
    mask: PixelBuffer,
    history: HistoryLog,
    brush: BrushOptions,
    stroke: Option<Stroke>,
}

impl MaskEditor {
    /// Starts with an all-background mask committed as the only snapshot.
    pub fn new(bounds: ImageBounds, limits: HistoryLimits) -> EditorResult<Self> {
        if bounds.is_empty() {
            return Err(EditorError::EmptyImage);
        }
        let mask = PixelBuffer::blank_mask(bounds)?;
        let history = HistoryLog::new(mask.clone(), limits);
        Ok(Self {
            mask,
            history,
            brush: BrushOptions::default(),
            stroke: None,
        })
    }

    pub fn bounds(&self) -> ImageBounds {
        self.mask.bounds()
    }

    /// Live mask, including any stroke still in progress.
    pub fn mask(&self) -> &PixelBuffer {
        &self.mask
    }

    /// Immutable snapshot at the history cursor; safe to hand to another thread.
    pub fn committed_mask(&self) -> HistorySnapshot {
        Arc::clone(self.history.current())
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn brush(&self) -> BrushOptions {
        self.brush
    }

    pub fn set_brush(&mut self, brush: BrushOptions) {
        self.brush.set_mode(brush.mode);
        self.brush.set_radius(brush.radius);
    }

    pub fn set_brush_mode(&mut self, mode: BrushMode) {
        self.brush.set_mode(mode);
    }

    pub fn set_brush_radius(&mut self, radius: u16) {
        self.brush.set_radius(radius);
    }

    pub fn phase(&self) -> StrokePhase {
        if self.stroke.is_some() {
            StrokePhase::Drawing
        } else {
            StrokePhase::Idle
        }
    }

    pub fn begin_stroke(&mut self, point: BufferPoint) {
        if self.stroke.is_some() {
            tracing::debug!("stroke restarted before pointer-up; committing previous stroke");
            self.end_stroke();
        }
        self.stroke = Some(Stroke {
            brush: self.brush,
            last_point: point,
            painted: false,
        });
        self.paint(point);
    }

    pub fn continue_stroke(&mut self, point: BufferPoint) -> EditorResult<()> {
        if self.stroke.is_none() {
            return Err(EditorError::NotDrawing);
        }
        self.paint(point);
        Ok(())
    }

    /// Returns `true` when the stroke produced a new history entry.
    pub fn end_stroke(&mut self) -> bool {
        let Some(stroke) = self.stroke.take() else {
            return false;
        };
        if !stroke.painted {
            return false;
        }
        self.history.commit(self.mask.clone());
        tracing::debug!(
            mode = ?stroke.brush.mode,
            radius = stroke.brush.radius,
            history_len = self.history.len(),
            "stroke committed"
        );
        true
    }

    pub fn pointer_leave(&mut self) -> bool {
        self.end_stroke()
    }

    fn paint(&mut self, point: BufferPoint) {
        let Some(stroke) = self.stroke.as_mut() else {
            return;
        };
        let radius = f64::from(stroke.brush.radius);
        let color = stroke.brush.mode.color();
        raster::paint_capsule(&mut self.mask, stroke.last_point, point, radius, color);
        raster::paint_disc(&mut self.mask, point, radius, color);
        stroke.last_point = point;
        stroke.painted = true;
    }

    pub fn undo(&mut self) -> HistoryOutcome {
        self.abandon_stroke();
        match self.history.undo() {
            Some(snapshot) => {
                self.mask.clone_from(snapshot);
                HistoryOutcome::Applied
            }
            None => HistoryOutcome::Unavailable,
        }
    }

    pub fn redo(&mut self) -> HistoryOutcome {
        self.abandon_stroke();
        match self.history.redo() {
            Some(snapshot) => {
                self.mask.clone_from(snapshot);
                HistoryOutcome::Applied
            }
            None => HistoryOutcome::Unavailable,
        }
    }

    /// Clears to background and records it as its own undoable entry.
    pub fn reset(&mut self) {
        self.abandon_stroke();
        self.mask.fill(Color::BLACK);
        self.history.commit(self.mask.clone());
        tracing::debug!(history_len = self.history.len(), "mask reset");
    }

    /// Replaces the mask with one produced elsewhere, committing it like a stroke.
    pub fn load_external_mask(&mut self, mask: PixelBuffer) -> EditorResult<()> {
        let expected = self.bounds();
        if mask.bounds() != expected {
            tracing::warn!(
                expected_width = expected.width,
                expected_height = expected.height,
                actual_width = mask.width(),
                actual_height = mask.height(),
                "external mask rejected: dimension mismatch"
            );
            return Err(EditorError::DimensionMismatch {
                expected_width: expected.width,
                expected_height: expected.height,
                actual_width: mask.width(),
                actual_height: mask.height(),
            });
        }

        self.abandon_stroke();
        self.mask = mask;
        self.history.commit(self.mask.clone());
        tracing::debug!(history_len = self.history.len(), "external mask committed");
        Ok(())
    }

    /// Drops an uncommitted stroke, restoring the mask to the cursor snapshot.
    fn abandon_stroke(&mut self) {
        if let Some(stroke) = self.stroke.take() {
            if stroke.painted {
                self.mask.clone_from(self.history.current());
            }
        }
    }
}

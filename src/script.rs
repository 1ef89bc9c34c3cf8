//! Replayable mask-authoring scripts for headless runs.
//!
//! A script is a JSON array whose items are either stroke objects or one of the
//! action strings `"undo"`, `"redo"` and `"reset"`.

use serde::Deserialize;
use thiserror::Error;

use crate::editor::BrushMode;
use crate::geometry::{DisplayPoint, DisplaySize};
use crate::session::{SessionController, SessionError};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("invalid stroke script: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
}

pub type ScriptResult<T> = std::result::Result<T, ScriptError>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScriptStep {
    Stroke(StrokeStep),
    Action(ScriptAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptAction {
    Undo,
    Redo,
    Reset,
}

/// One pointer-down/move/up sequence. Points are in display space when `display`
/// is given, otherwise in image pixels.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StrokeStep {
    #[serde(default)]
    pub mode: BrushMode,
    #[serde(default)]
    pub radius: Option<u16>,
    pub points: Vec<[f64; 2]>,
    #[serde(default)]
    pub display: Option<[f64; 2]>,
}

pub fn parse_script(json: &str) -> ScriptResult<Vec<ScriptStep>> {
    Ok(serde_json::from_str(json)?)
}

pub fn apply_script(controller: &mut SessionController, steps: &[ScriptStep]) -> ScriptResult<()> {
    for (index, step) in steps.iter().enumerate() {
        match step {
            ScriptStep::Stroke(stroke) => apply_stroke(controller, stroke)?,
            ScriptStep::Action(ScriptAction::Undo) => {
                if !controller.undo()?.applied() {
                    tracing::debug!(step = index, "undo unavailable; skipped");
                }
            }
            ScriptStep::Action(ScriptAction::Redo) => {
                if !controller.redo()?.applied() {
                    tracing::debug!(step = index, "redo unavailable; skipped");
                }
            }
            ScriptStep::Action(ScriptAction::Reset) => controller.reset_mask()?,
        }
    }
    tracing::info!(steps = steps.len(), "stroke script applied");
    Ok(())
}

fn apply_stroke(controller: &mut SessionController, stroke: &StrokeStep) -> ScriptResult<()> {
    let Some((first, rest)) = stroke.points.split_first() else {
        tracing::warn!("stroke without points ignored");
        return Ok(());
    };
    let display = match stroke.display {
        Some([width, height]) => DisplaySize::new(width, height),
        None => DisplaySize::native(controller.editor()?.bounds()),
    };

    controller.set_brush_mode(stroke.mode)?;
    if let Some(radius) = stroke.radius {
        controller.set_brush_radius(radius)?;
    }

    controller.pointer_down(to_point(*first), display)?;
    for point in rest {
        controller.pointer_move(to_point(*point), display)?;
    }
    controller.pointer_up()?;
    Ok(())
}

fn to_point([x, y]: [f64; 2]) -> DisplayPoint {
    DisplayPoint::new(x, y)
}

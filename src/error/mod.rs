use crate::buffer::BufferError;
use crate::editor::EditorError;
use crate::effects::EffectError;
use crate::geometry::GeometryError;
use crate::script::ScriptError;
use crate::session::{SegmentationError, SessionError};
use crate::state::StateError;
use crate::storage::StorageError;
use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Segmentation(#[from] SegmentationError),
    #[error(transparent)]
    Editor(#[from] EditorError),
    #[error(transparent)]
    Effect(#[from] EffectError),
    #[error(transparent)]
    Buffer(#[from] BufferError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

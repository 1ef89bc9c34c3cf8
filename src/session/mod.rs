//! Session orchestration: image load, mask authoring, segmentation and effect jobs.
//!
//! A [`Session`] lives from one successful image load to the next. Every load bumps
//! an epoch; background results tagged with an older epoch are discarded.

pub mod segmentation;
pub mod worker;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::buffer::{BufferError, BufferResult, PixelBuffer};
use crate::config::AppConfig;
use crate::editor::{BrushMode, EditorError, HistoryOutcome, MaskEditor};
use crate::effects::{
    apply_effect_with_cancel, CancelToken, EffectConfig, EffectError, EffectResult, EffectSpec,
};
use crate::geometry::{
    BufferPoint, CoordinateMapper, DisplayPoint, DisplaySize, GeometryError, ImageBounds,
};
use crate::state::{SessionEvent, SessionState, StateError, StateMachine};

pub use segmentation::{MaskImageBackend, SegmentationBackend, SegmentationError};
pub use worker::{JobHandle, JobWait};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no image is ready (session is {state:?})")]
    NotReady { state: SessionState },
    #[error("result from epoch {epoch} superseded by epoch {current}")]
    Superseded { epoch: u64, current: u64 },
    #[error("effect job {id} superseded (latest job: {current:?})")]
    EffectSuperseded { id: u64, current: Option<u64> },
    #[error("image could not be decoded: {0}")]
    Decode(#[source] BufferError),
    #[error("subject detection failed ({backend}): {message}; draw the subject manually instead")]
    Segmentation { backend: String, message: String },
    #[error("subject detection timed out after {timeout:?} ({backend}); draw the subject manually instead")]
    SegmentationTimeout { backend: String, timeout: Duration },
    #[error("{job} worker exited without a result")]
    WorkerLost { job: &'static str },
    #[error(transparent)]
    Editor(#[from] EditorError),
    #[error(transparent)]
    Effect(#[from] EffectError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    State(#[from] StateError),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Image plus the mask being authored for it.
#[derive(Debug)]
pub struct Session {
    epoch: u64,
    image: Arc<PixelBuffer>,
    editor: MaskEditor,
}

impl Session {
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn image(&self) -> &Arc<PixelBuffer> {
        &self.image
    }

    pub fn bounds(&self) -> ImageBounds {
        self.image.bounds()
    }

    pub fn editor(&self) -> &MaskEditor {
        &self.editor
    }
}

/// Decode started by [`SessionController::begin_load`].
///
/// The session stays in `Loading`/`Reloading` until this is handed back through
/// [`SessionController::finish_load`] or [`SessionController::cancel_load`].
#[derive(Debug)]
pub struct PendingLoad {
    epoch: u64,
    handle: JobHandle<BufferResult<PixelBuffer>>,
}

impl PendingLoad {
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Effect pass started by [`SessionController::start_effect`].
#[derive(Debug)]
pub struct EffectJob {
    epoch: u64,
    id: u64,
    handle: JobHandle<EffectResult<PixelBuffer>>,
}

impl EffectJob {
    pub const fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug)]
struct ActiveEffect {
    id: u64,
    cancel: CancelToken,
}

#[derive(Debug)]
pub struct SessionController {
    config: AppConfig,
    machine: StateMachine,
    epoch: u64,
    session: Option<Session>,
    active_effect: Option<ActiveEffect>,
    next_effect_id: u64,
    output: Option<Arc<PixelBuffer>>,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

impl SessionController {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            machine: StateMachine::new(),
            epoch: 0,
            session: None,
            active_effect: None,
            next_effect_id: 1,
            output: None,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Latest effect result for the current session.
    pub fn output(&self) -> Option<&Arc<PixelBuffer>> {
        self.output.as_ref()
    }

    pub fn editor(&self) -> SessionResult<&MaskEditor> {
        self.ready_session().map(|session| &session.editor)
    }

    fn ready_session(&self) -> SessionResult<&Session> {
        let state = self.machine.state();
        match self.session.as_ref() {
            Some(session) if state.accepts_edits() => Ok(session),
            _ => Err(SessionError::NotReady { state }),
        }
    }

    fn ready_session_mut(&mut self) -> SessionResult<&mut Session> {
        let state = self.machine.state();
        match self.session.as_mut() {
            Some(session) if state.accepts_edits() => Ok(session),
            _ => Err(SessionError::NotReady { state }),
        }
    }

    fn cancel_active_effect(&mut self) {
        if let Some(active) = self.active_effect.take() {
            tracing::debug!(effect_id = active.id, "cancelling in-flight effect");
            active.cancel.cancel();
        }
    }

    /// Starts decoding `bytes`; any earlier pending load or effect job becomes stale.
    pub fn begin_load(&mut self, bytes: Vec<u8>) -> SessionResult<PendingLoad> {
        self.machine.transition(SessionEvent::LoadStarted)?;
        self.epoch += 1;
        self.cancel_active_effect();
        tracing::info!(epoch = self.epoch, bytes = bytes.len(), "image load started");

        let handle = worker::spawn_worker("decode", move || PixelBuffer::decode(&bytes));
        Ok(PendingLoad {
            epoch: self.epoch,
            handle,
        })
    }

    /// Installs the decoded image as a fresh session if `pending` is still the latest load.
    pub fn finish_load(&mut self, pending: PendingLoad) -> SessionResult<ImageBounds> {
        if pending.epoch != self.epoch {
            tracing::warn!(
                epoch = pending.epoch,
                current = self.epoch,
                "discarding superseded image load"
            );
            return Err(SessionError::Superseded {
                epoch: pending.epoch,
                current: self.epoch,
            });
        }

        let decoded = match pending.handle.wait() {
            JobWait::Done(result) => result.map_err(SessionError::Decode),
            JobWait::Lost | JobWait::TimedOut => {
                Err(SessionError::WorkerLost { job: "decode" })
            }
        };
        let installed = decoded.and_then(|image| {
            let mut editor = MaskEditor::new(image.bounds(), self.config.history)?;
            editor.set_brush(self.config.brush);
            Ok(Session {
                epoch: pending.epoch,
                image: Arc::new(image),
                editor,
            })
        });

        match installed {
            Ok(session) => {
                let bounds = session.bounds();
                self.session = Some(session);
                self.output = None;
                self.machine.transition(SessionEvent::LoadFinished)?;
                tracing::info!(
                    epoch = self.epoch,
                    width = bounds.width,
                    height = bounds.height,
                    "image ready"
                );
                Ok(bounds)
            }
            Err(err) => {
                tracing::warn!(%err, epoch = self.epoch, "image load failed");
                self.machine.transition(SessionEvent::LoadFailed)?;
                Err(err)
            }
        }
    }

    /// Abandons `pending`. If it is still the latest load the session returns to
    /// its previous state, as after a failed decode.
    pub fn cancel_load(&mut self, pending: PendingLoad) -> SessionResult<()> {
        if pending.epoch != self.epoch {
            tracing::debug!(epoch = pending.epoch, "cancelled load was already superseded");
            return Ok(());
        }
        self.epoch += 1;
        self.machine.transition(SessionEvent::LoadFailed)?;
        tracing::info!(epoch = pending.epoch, state = ?self.state(), "image load cancelled");
        Ok(())
    }

    pub fn load_image(&mut self, bytes: Vec<u8>) -> SessionResult<ImageBounds> {
        let pending = self.begin_load(bytes)?;
        self.finish_load(pending)
    }

    pub fn close(&mut self) -> SessionResult<()> {
        self.machine.transition(SessionEvent::Closed)?;
        self.epoch += 1;
        self.cancel_active_effect();
        self.session = None;
        self.output = None;
        Ok(())
    }

    fn map_pointer(&self, point: DisplayPoint, display: DisplaySize) -> SessionResult<BufferPoint> {
        let session = self.ready_session()?;
        let mapper = CoordinateMapper::new(session.bounds(), display)?;
        Ok(mapper.to_buffer(point))
    }

    pub fn pointer_down(&mut self, point: DisplayPoint, display: DisplaySize) -> SessionResult<()> {
        let point = self.map_pointer(point, display)?;
        self.ready_session_mut()?.editor.begin_stroke(point);
        Ok(())
    }

    /// Returns `false` when no stroke is in progress; hover moves are ignored.
    pub fn pointer_move(
        &mut self,
        point: DisplayPoint,
        display: DisplaySize,
    ) -> SessionResult<bool> {
        let point = self.map_pointer(point, display)?;
        match self.ready_session_mut()?.editor.continue_stroke(point) {
            Ok(()) => Ok(true),
            Err(EditorError::NotDrawing) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    pub fn pointer_up(&mut self) -> SessionResult<bool> {
        Ok(self.ready_session_mut()?.editor.end_stroke())
    }

    pub fn pointer_leave(&mut self) -> SessionResult<bool> {
        Ok(self.ready_session_mut()?.editor.pointer_leave())
    }

    pub fn set_brush_mode(&mut self, mode: BrushMode) -> SessionResult<()> {
        self.ready_session_mut()?.editor.set_brush_mode(mode);
        Ok(())
    }

    pub fn set_brush_radius(&mut self, radius: u16) -> SessionResult<()> {
        self.ready_session_mut()?.editor.set_brush_radius(radius);
        Ok(())
    }

    pub fn undo(&mut self) -> SessionResult<HistoryOutcome> {
        Ok(self.ready_session_mut()?.editor.undo())
    }

    pub fn redo(&mut self) -> SessionResult<HistoryOutcome> {
        Ok(self.ready_session_mut()?.editor.redo())
    }

    pub fn reset_mask(&mut self) -> SessionResult<()> {
        self.ready_session_mut()?.editor.reset();
        Ok(())
    }

    pub fn detect_subject(&mut self, backend: Arc<dyn SegmentationBackend>) -> SessionResult<()> {
        let timeout = self.config.segmentation_timeout();
        self.detect_subject_within(backend, timeout)
    }

    /// Runs `backend` off-thread and commits its mask. On failure or timeout the
    /// mask and history are left as they were.
    pub fn detect_subject_within(
        &mut self,
        backend: Arc<dyn SegmentationBackend>,
        timeout: Duration,
    ) -> SessionResult<()> {
        let image = Arc::clone(self.ready_session()?.image());
        let name = backend.name().to_string();
        tracing::info!(backend = %name, ?timeout, "subject detection started");

        let handle = worker::spawn_worker("segment", move || backend.segment(&image));
        let mask = match handle.wait_timeout(timeout) {
            JobWait::Done(Ok(mask)) => mask,
            JobWait::Done(Err(err)) => {
                tracing::warn!(%err, backend = %name, "subject detection failed");
                return Err(SessionError::Segmentation {
                    backend: name,
                    message: err.to_string(),
                });
            }
            JobWait::TimedOut => {
                tracing::warn!(backend = %name, ?timeout, "subject detection timed out");
                return Err(SessionError::SegmentationTimeout {
                    backend: name,
                    timeout,
                });
            }
            JobWait::Lost => {
                tracing::warn!(backend = %name, "subject detection worker lost");
                return Err(SessionError::Segmentation {
                    backend: name,
                    message: "worker exited without a result".to_string(),
                });
            }
        };

        self.ready_session_mut()?.editor.load_external_mask(mask)?;
        tracing::info!(backend = %name, "subject mask applied");
        Ok(())
    }

    /// Runs the engine against the image and the committed mask snapshot. Any
    /// previously started effect is cancelled.
    pub fn start_effect(&mut self, spec: EffectSpec) -> SessionResult<EffectJob> {
        let session = self.ready_session()?;
        let image = Arc::clone(session.image());
        let mask = session.editor.committed_mask();
        let epoch = self.epoch;

        self.cancel_active_effect();
        let id = self.next_effect_id;
        self.next_effect_id += 1;
        let cancel = CancelToken::new();
        self.active_effect = Some(ActiveEffect {
            id,
            cancel: cancel.clone(),
        });
        tracing::debug!(effect_id = id, effect = ?spec.effect.kind(), "effect job started");

        let handle = worker::spawn_worker("effect", move || {
            apply_effect_with_cancel(&image, &mask, &spec, &cancel)
        });
        Ok(EffectJob { epoch, id, handle })
    }

    /// Stores the job's output if it is still the latest request for the current image.
    pub fn finish_effect(&mut self, job: EffectJob) -> SessionResult<Arc<PixelBuffer>> {
        let result = match job.handle.wait() {
            JobWait::Done(result) => result,
            JobWait::Lost | JobWait::TimedOut => {
                return Err(SessionError::WorkerLost { job: "effect" })
            }
        };

        if job.epoch != self.epoch {
            tracing::debug!(effect_id = job.id, "discarding effect result for a replaced image");
            return Err(SessionError::Superseded {
                epoch: job.epoch,
                current: self.epoch,
            });
        }
        let latest = self.active_effect.as_ref().map(|active| active.id);
        if latest != Some(job.id) {
            tracing::debug!(effect_id = job.id, ?latest, "discarding superseded effect result");
            return Err(SessionError::EffectSuperseded {
                id: job.id,
                current: latest,
            });
        }

        self.active_effect = None;
        let output = Arc::new(result?);
        self.output = Some(Arc::clone(&output));
        tracing::info!(effect_id = job.id, "effect output ready");
        Ok(output)
    }

    pub fn apply_effect(&mut self, spec: EffectSpec) -> SessionResult<Arc<PixelBuffer>> {
        let job = self.start_effect(spec)?;
        self.finish_effect(job)
    }

    pub fn apply_effect_config(
        &mut self,
        config: &EffectConfig,
    ) -> SessionResult<Arc<PixelBuffer>> {
        let spec = config.to_spec()?;
        self.apply_effect(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::MaskClass;
    use crate::effects::{Effect, Intensity, MotionDirection};
    use crate::geometry::Color;
    use crate::storage::encode_png;
    use super::segmentation::SegmentationResult;
    use std::sync::mpsc;
    use std::sync::Mutex;

    fn png(width: u32, height: u32, color: Color) -> Vec<u8> {
        encode_png(&PixelBuffer::filled(width, height, color).expect("buffer"))
            .expect("png encode")
    }

    fn checker_png(width: u32, height: u32) -> Vec<u8> {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                let v = ((x * 40 + y * 25) % 256) as u8;
                data.extend_from_slice(&[v, 255 - v, v / 2, 255]);
            }
        }
        encode_png(&PixelBuffer::from_raw(width, height, data).expect("buffer")).expect("png")
    }

    fn ready(width: u32, height: u32) -> SessionController {
        let mut controller = SessionController::default();
        controller
            .load_image(checker_png(width, height))
            .expect("image should load");
        controller
    }

    struct FixedMask(PixelBuffer);
    impl SegmentationBackend for FixedMask {
        fn name(&self) -> &str {
            "fixed"
        }

        fn segment(&self, _image: &PixelBuffer) -> SegmentationResult<PixelBuffer> {
            Ok(self.0.clone())
        }
    }

    struct FailingModel;
    impl SegmentationBackend for FailingModel {
        fn name(&self) -> &str {
            "failing"
        }

        fn segment(&self, _image: &PixelBuffer) -> SegmentationResult<PixelBuffer> {
            Err(SegmentationError::Unavailable {
                message: "model weights missing".to_string(),
            })
        }
    }

    struct BlockedModel(Mutex<mpsc::Receiver<()>>);
    impl SegmentationBackend for BlockedModel {
        fn name(&self) -> &str {
            "blocked"
        }

        fn segment(&self, image: &PixelBuffer) -> SegmentationResult<PixelBuffer> {
            if let Ok(rx) = self.0.lock() {
                let _ = rx.recv();
            }
            Ok(PixelBuffer::filled(image.width(), image.height(), Color::WHITE)
                .expect("mask"))
        }
    }

    #[test]
    fn load_creates_ready_session_with_blank_mask() {
        let controller = ready(6, 4);
        assert_eq!(controller.state(), SessionState::Ready);
        let editor = controller.editor().expect("session is ready");
        assert_eq!(editor.bounds(), ImageBounds::new(6, 4));
        assert_eq!(editor.history().len(), 1);
        assert!(controller.output().is_none());
    }

    #[test]
    fn operations_before_load_are_rejected() {
        let mut controller = SessionController::default();
        assert!(matches!(
            controller.undo(),
            Err(SessionError::NotReady {
                state: SessionState::Empty
            })
        ));
        assert!(matches!(
            controller.apply_effect(EffectSpec::new(Effect::Invert, Intensity::FULL)),
            Err(SessionError::NotReady { .. })
        ));
    }

    #[test]
    fn decode_failure_on_first_load_returns_to_empty() {
        let mut controller = SessionController::default();
        let err = controller
            .load_image(b"definitely not an image".to_vec())
            .expect_err("garbage should fail");
        assert!(matches!(err, SessionError::Decode(_)));
        assert_eq!(controller.state(), SessionState::Empty);
        assert!(controller.session().is_none());
    }

    #[test]
    fn decode_failure_on_reload_keeps_previous_session() {
        let mut controller = ready(5, 5);
        controller
            .pointer_down(DisplayPoint::new(2.0, 2.0), DisplaySize::new(5.0, 5.0))
            .expect("ready");
        controller.pointer_up().expect("ready");

        let err = controller
            .load_image(b"broken".to_vec())
            .expect_err("garbage should fail");
        assert!(matches!(err, SessionError::Decode(_)));
        assert_eq!(controller.state(), SessionState::Ready);
        assert_eq!(controller.editor().expect("still ready").history().len(), 2);
    }

    #[test]
    fn newer_load_supersedes_pending_one() {
        let mut controller = SessionController::default();
        let first = controller.begin_load(png(3, 3, Color::BLACK)).expect("load a");
        let second = controller.begin_load(png(7, 2, Color::WHITE)).expect("load b");

        let err = controller.finish_load(first).expect_err("stale load");
        assert!(matches!(err, SessionError::Superseded { epoch: 1, current: 2 }));
        assert_eq!(controller.state(), SessionState::Loading);

        let bounds = controller.finish_load(second).expect("latest load");
        assert_eq!(bounds, ImageBounds::new(7, 2));
        assert_eq!(controller.state(), SessionState::Ready);
        assert_eq!(controller.session().map(Session::epoch), Some(2));
    }

    #[test]
    fn pointer_events_are_mapped_from_display_space() {
        let mut controller = ready(20, 20);
        controller.set_brush_radius(1).expect("ready");
        let display = DisplaySize::new(10.0, 10.0);

        controller
            .pointer_down(DisplayPoint::new(2.0, 2.0), display)
            .expect("ready");
        assert!(controller
            .pointer_move(DisplayPoint::new(8.0, 2.0), display)
            .expect("ready"));
        assert!(controller.pointer_up().expect("ready"));
        assert!(!controller
            .pointer_move(DisplayPoint::new(1.0, 1.0), display)
            .expect("hover move is ignored"));

        let editor = controller.editor().expect("ready");
        for x in 4..16 {
            assert_eq!(editor.mask().class_at(x, 4), Some(MaskClass::Subject), "x={x}");
        }
        assert_eq!(editor.mask().class_at(4, 10), Some(MaskClass::Background));
        assert_eq!(editor.history().len(), 2);
    }

    #[test]
    fn pointer_on_unlaid_out_display_fails_without_painting() {
        let mut controller = ready(4, 4);
        let err = controller
            .pointer_down(DisplayPoint::new(1.0, 1.0), DisplaySize::new(0.0, 0.0))
            .expect_err("zero display should fail");
        assert!(matches!(err, SessionError::Geometry(_)));
        assert!(!controller.pointer_up().expect("ready"));
    }

    #[test]
    fn detected_subject_is_committed_to_history() {
        let mut controller = ready(3, 3);
        let mask = PixelBuffer::filled(3, 3, Color::WHITE).expect("mask");
        controller
            .detect_subject(Arc::new(FixedMask(mask.clone())))
            .expect("detection should succeed");

        let editor = controller.editor().expect("ready");
        assert_eq!(editor.mask(), &mask);
        assert_eq!(editor.history().len(), 2);
    }

    #[test]
    fn failed_detection_suggests_manual_and_keeps_history() {
        let mut controller = ready(3, 3);
        controller.set_brush_mode(BrushMode::Draw).expect("ready");
        controller
            .pointer_down(DisplayPoint::new(1.0, 1.0), DisplaySize::new(3.0, 3.0))
            .expect("ready");
        controller.pointer_up().expect("ready");
        let before = controller.editor().expect("ready").mask().clone();

        let err = controller
            .detect_subject(Arc::new(FailingModel))
            .expect_err("model failure should surface");
        assert!(err.to_string().contains("manually"));

        let editor = controller.editor().expect("ready");
        assert_eq!(editor.mask(), &before);
        assert_eq!(editor.history().len(), 2);
    }

    #[test]
    fn detection_timeout_leaves_mask_untouched() {
        let mut controller = ready(3, 3);
        let (release_tx, release_rx) = mpsc::channel();
        let err = controller
            .detect_subject_within(
                Arc::new(BlockedModel(Mutex::new(release_rx))),
                Duration::from_millis(20),
            )
            .expect_err("blocked model should time out");
        drop(release_tx);

        assert!(matches!(err, SessionError::SegmentationTimeout { .. }));
        assert!(err.to_string().contains("manually"));
        assert_eq!(controller.editor().expect("ready").history().len(), 1);
    }

    #[test]
    fn detected_mask_with_wrong_size_is_rejected() {
        let mut controller = ready(3, 3);
        let mask = PixelBuffer::filled(2, 2, Color::WHITE).expect("mask");
        let err = controller
            .detect_subject(Arc::new(FixedMask(mask)))
            .expect_err("size mismatch should fail");
        assert!(matches!(
            err,
            SessionError::Editor(EditorError::DimensionMismatch { .. })
        ));
        assert_eq!(controller.editor().expect("ready").history().len(), 1);
    }

    #[test]
    fn grayscale_over_full_background_writes_luma_everywhere() {
        let mut controller = ready(4, 4);
        let output = controller
            .apply_effect(EffectSpec::new(Effect::Grayscale, Intensity::FULL))
            .expect("effect should apply");

        let image = Arc::clone(controller.session().expect("ready").image());
        for (out, src) in output
            .as_raw()
            .chunks_exact(4)
            .zip(image.as_raw().chunks_exact(4))
        {
            let luma =
                f64::from(src[0]) * 0.30 + f64::from(src[1]) * 0.59 + f64::from(src[2]) * 0.11;
            let expected = luma.clamp(0.0, 255.0).round_ties_even() as u8;
            assert_eq!(&out[..3], &[expected; 3]);
            assert_eq!(out[3], src[3]);
        }
        assert_eq!(controller.output(), Some(&output));
    }

    #[test]
    fn full_subject_mask_leaves_image_identical() {
        let mut controller = ready(2, 2);
        controller
            .detect_subject(Arc::new(FixedMask(
                PixelBuffer::filled(2, 2, Color::WHITE).expect("mask"),
            )))
            .expect("detection should succeed");

        let image = Arc::clone(controller.session().expect("ready").image());
        for config in [
            EffectConfig {
                kind: crate::effects::EffectKind::Pixelate,
                intensity: 100,
                direction: None,
                color: None,
            },
            EffectConfig {
                kind: crate::effects::EffectKind::MotionBlur,
                intensity: 65,
                direction: Some(MotionDirection::Diagonal1),
                color: None,
            },
        ] {
            let output = controller
                .apply_effect_config(&config)
                .expect("effect should apply");
            assert_eq!(*output, *image);
        }
    }

    #[test]
    fn reset_after_three_strokes_is_undoable() {
        let mut controller = ready(12, 12);
        controller.set_brush_radius(2).expect("ready");
        let display = DisplaySize::new(12.0, 12.0);
        for (x, y) in [(2.0, 2.0), (6.0, 6.0), (10.0, 10.0)] {
            controller
                .pointer_down(DisplayPoint::new(x, y), display)
                .expect("ready");
            controller.pointer_up().expect("ready");
        }
        let third = controller.editor().expect("ready").mask().clone();

        controller.reset_mask().expect("ready");
        let editor = controller.editor().expect("ready");
        assert_eq!(editor.history().len(), 5);
        assert!(editor
            .mask()
            .as_raw()
            .chunks_exact(4)
            .all(|px| px == [0, 0, 0, 255]));

        assert!(controller.undo().expect("ready").applied());
        assert_eq!(controller.editor().expect("ready").mask(), &third);
        assert!(controller.redo().expect("ready").applied());
    }

    #[test]
    fn newer_effect_request_wins() {
        let mut controller = ready(16, 16);
        let first = controller
            .start_effect(EffectSpec::new(Effect::Blur, Intensity::FULL))
            .expect("ready");
        let second = controller
            .start_effect(EffectSpec::new(Effect::Invert, Intensity::FULL))
            .expect("ready");
        let (first_id, second_id) = (first.id(), second.id());
        assert_ne!(first_id, second_id);

        let stale = controller.finish_effect(first).expect_err("older job loses");
        assert!(matches!(
            stale,
            SessionError::EffectSuperseded { id, current: Some(current) }
                if id == first_id && current == second_id
        ));
        assert_eq!(
            stale.to_string(),
            format!("effect job {first_id} superseded (latest job: Some({second_id}))")
        );

        let output = controller.finish_effect(second).expect("latest job wins");
        let image = Arc::clone(controller.session().expect("ready").image());
        assert_eq!(output.pixel(0, 0).map(|p| p[0]), image.pixel(0, 0).map(|p| 255 - p[0]));
        assert!(controller.output().is_some());
    }

    #[test]
    fn new_image_load_invalidates_running_effect() {
        let mut controller = ready(8, 8);
        let job = controller
            .start_effect(EffectSpec::new(Effect::Blur, Intensity::FULL))
            .expect("ready");
        let pending = controller.begin_load(png(2, 2, Color::WHITE)).expect("reload");
        assert_eq!(controller.state(), SessionState::Reloading);

        assert!(matches!(
            controller.finish_effect(job),
            Err(SessionError::Superseded { epoch: 1, current: 2 })
        ));
        assert!(controller.output().is_none());

        controller.finish_load(pending).expect("reload finishes");
        assert_eq!(
            controller.editor().expect("ready").bounds(),
            ImageBounds::new(2, 2)
        );
    }

    #[test]
    fn cancelled_reload_restores_ready_session() {
        let mut controller = ready(3, 3);
        let pending = controller.begin_load(png(5, 5, Color::WHITE)).expect("reload");
        assert_eq!(controller.state(), SessionState::Reloading);

        controller.cancel_load(pending).expect("latest load cancels");
        assert_eq!(controller.state(), SessionState::Ready);
        assert_eq!(
            controller.editor().expect("edits accepted again").bounds(),
            ImageBounds::new(3, 3)
        );
        assert!(controller.undo().is_ok());
    }

    #[test]
    fn cancelled_first_load_returns_to_empty() {
        let mut controller = SessionController::default();
        let stale = controller.begin_load(png(2, 2, Color::BLACK)).expect("load a");
        let latest = controller.begin_load(png(4, 4, Color::BLACK)).expect("load b");

        controller.cancel_load(stale).expect("stale cancel is a no-op");
        assert_eq!(controller.state(), SessionState::Loading);

        let epoch = latest.epoch();
        controller.cancel_load(latest).expect("latest load cancels");
        assert_eq!(controller.state(), SessionState::Empty);
        assert!(controller.epoch() > epoch);
        assert!(matches!(
            controller.undo(),
            Err(SessionError::NotReady {
                state: SessionState::Empty
            })
        ));
    }

    #[test]
    fn close_drops_session() {
        let mut controller = ready(2, 2);
        controller.close().expect("ready -> closed");
        assert_eq!(controller.state(), SessionState::Empty);
        assert!(controller.session().is_none());
        assert!(controller.close().is_err());
    }
}

pub mod buffer;
pub mod config;
pub mod editor;
pub mod effects;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod script;
pub mod session;
pub mod state;
pub mod storage;
pub use error::{AppError, AppResult};

use std::path::PathBuf;
use std::sync::Arc;

use config::AppConfig;
use effects::EffectConfig;
use script::ScriptStep;
use session::{MaskImageBackend, SessionController};

/// Everything one headless run needs, already read from disk.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub image: Vec<u8>,
    /// Pre-computed subject mask, applied before any strokes.
    pub mask: Option<PathBuf>,
    pub steps: Vec<ScriptStep>,
    pub effect: EffectConfig,
    pub output: PathBuf,
}

/// Entrypoint used by the CLI binary: load, author the mask, apply the effect, save.
pub fn run(config: AppConfig, job: RenderJob) -> AppResult<PathBuf> {
    logging::init();
    tracing::info!(effect = job.effect.kind.as_str(), "starting backdrop");

    let mut controller = SessionController::new(config);
    controller.load_image(job.image)?;

    if let Some(mask) = job.mask {
        controller.detect_subject(Arc::new(MaskImageBackend::new(mask)))?;
    }
    script::apply_script(&mut controller, &job.steps)?;

    let output = controller.apply_effect_config(&job.effect)?;
    storage::save_png(&output, &job.output)?;

    tracing::info!(
        "render complete with state={:?}",
        controller.state()
    );
    Ok(job.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use buffer::PixelBuffer;
    use effects::EffectKind;
    use geometry::Color;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("backdrop-run-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("scratch dir should be creatable");
        dir
    }

    fn invert_job(dir: &std::path::Path, mask: Option<PathBuf>, steps: Vec<ScriptStep>) -> RenderJob {
        let image = PixelBuffer::filled(4, 4, Color::new(10, 20, 30)).expect("image");
        RenderJob {
            image: storage::encode_png(&image).expect("png"),
            mask,
            steps,
            effect: EffectConfig {
                kind: EffectKind::Invert,
                intensity: 100,
                direction: None,
                color: None,
            },
            output: dir.join("out").join(storage::DEFAULT_OUTPUT_FILE_NAME),
        }
    }

    fn read_output(path: &std::path::Path) -> PixelBuffer {
        PixelBuffer::decode(&std::fs::read(path).expect("output exists")).expect("output decodes")
    }

    #[test]
    fn run_without_mask_processes_whole_image() {
        let dir = scratch_dir("plain");
        let path = run(AppConfig::default(), invert_job(&dir, None, Vec::new()))
            .expect("run should succeed");

        let output = read_output(&path);
        assert!(output
            .as_raw()
            .chunks_exact(4)
            .all(|px| px == [245, 235, 225, 255]));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn run_keeps_scripted_subject_untouched() {
        let dir = scratch_dir("scripted");
        let steps = script::parse_script(r#"[{"radius": 1, "points": [[0.5, 0.5]]}]"#)
            .expect("script should parse");
        let path = run(AppConfig::default(), invert_job(&dir, None, steps))
            .expect("run should succeed");

        let output = read_output(&path);
        assert_eq!(output.pixel(0, 0), Some([10, 20, 30, 255]));
        assert_eq!(output.pixel(3, 3), Some([245, 235, 225, 255]));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn run_rejects_mask_of_wrong_size() {
        let dir = scratch_dir("mask");
        let mask_path = dir.join("mask.png");
        storage::save_png(
            &PixelBuffer::filled(2, 2, Color::WHITE).expect("mask"),
            &mask_path,
        )
        .expect("mask should save");

        let job = invert_job(&dir, Some(mask_path), Vec::new());
        let output = job.output.clone();
        let err = run(AppConfig::default(), job).expect_err("mismatched mask should fail");
        assert!(matches!(err, AppError::Session(_)));
        assert!(!output.exists());

        let _ = std::fs::remove_dir_all(dir);
    }
}

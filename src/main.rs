use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;

use backdrop::config::{self, AppConfig};
use backdrop::effects::{
    parse_effect_kind, parse_motion_direction, EffectConfig, EffectKind, MotionDirection,
};
use backdrop::script::{self, ScriptStep};
use backdrop::storage::DEFAULT_OUTPUT_FILE_NAME;
use backdrop::RenderJob;

/// Apply a pixel effect to everything outside the subject of an image.
///
/// The subject mask comes from a pre-computed mask image, a stroke script, or both
/// (the mask is loaded first, strokes refine it). With neither, the whole image is
/// treated as background.
#[derive(Parser, Debug)]
#[command(name = "backdrop", version, about = "Subject-aware background effects")]
struct Cli {
    /// Source image (any format the decoder recognises).
    #[arg(long, value_name = "FILE")]
    image: PathBuf,

    /// Subject mask image; near-white pixels mark the subject.
    #[arg(long, value_name = "FILE")]
    mask: Option<PathBuf>,

    /// JSON stroke script replayed onto the mask.
    #[arg(long, value_name = "FILE")]
    strokes: Option<PathBuf>,

    /// blur, motionBlur, pixelate, colorize, invert or grayscale.
    #[arg(long, value_parser = effect_kind)]
    effect: Option<EffectKind>,

    /// Effect strength, 0-100.
    #[arg(long, value_name = "0-100")]
    intensity: Option<u8>,

    /// Motion blur direction: horizontal, vertical, diagonal1 or diagonal2.
    #[arg(long, value_parser = motion_direction)]
    direction: Option<MotionDirection>,

    /// Colorize target as #rrggbb.
    #[arg(long, value_name = "HEX")]
    color: Option<String>,

    /// JSON effect configuration; individual flags override its fields.
    #[arg(long, value_name = "FILE")]
    effect_config: Option<PathBuf>,

    /// Output PNG path.
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Use this config.json instead of the one under the XDG config directory.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn effect_kind(value: &str) -> Result<EffectKind, String> {
    parse_effect_kind(value).ok_or_else(|| format!("unknown effect {value:?}"))
}

fn motion_direction(value: &str) -> Result<MotionDirection, String> {
    parse_motion_direction(value).ok_or_else(|| format!("unknown direction {value:?}"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli) {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("backdrop: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<PathBuf> {
    let config = match cli.config.as_deref() {
        Some(path) if !path.exists() => bail!("config file {} does not exist", path.display()),
        Some(path) => config::load_app_config_from(path),
        None => config::load_app_config(),
    };

    let image = std::fs::read(&cli.image)
        .with_context(|| format!("failed to read image {}", cli.image.display()))?;
    let steps = match cli.strokes.as_deref() {
        Some(path) => read_steps(path)?,
        None => Vec::new(),
    };
    let effect = resolve_effect(&cli, &config)?;
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_FILE_NAME));

    let job = RenderJob {
        image,
        mask: cli.mask,
        steps,
        effect,
        output,
    };
    backdrop::run(config, job).context("render failed")
}

fn read_steps(path: &Path) -> Result<Vec<ScriptStep>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read stroke script {}", path.display()))?;
    script::parse_script(&json).with_context(|| format!("in {}", path.display()))
}

fn resolve_effect(cli: &Cli, config: &AppConfig) -> Result<EffectConfig> {
    let mut effect = match cli.effect_config.as_deref() {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read effect config {}", path.display()))?;
            serde_json::from_str(&json)
                .with_context(|| format!("invalid effect config {}", path.display()))?
        }
        None => config.effect.clone(),
    };

    if let Some(kind) = cli.effect {
        effect.kind = kind;
    }
    if let Some(intensity) = cli.intensity {
        effect.intensity = intensity;
    }
    if let Some(direction) = cli.direction {
        effect.direction = Some(direction);
    }
    if let Some(color) = cli.color.clone() {
        effect.color = Some(color);
    }
    Ok(effect)
}

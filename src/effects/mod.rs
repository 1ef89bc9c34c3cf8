//! Background effects and their configuration surface.

mod engine;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{Color, GeometryError};

pub use engine::{apply_effect, apply_effect_with_cancel, CancelToken};

pub const DEFAULT_COLORIZE_HEX: &str = "#6432c8";
pub const DEFAULT_INTENSITY_PERCENT: u8 = 50;
const INTENSITY_PERCENT_MAX: u8 = 100;

#[derive(Debug, Error)]
pub enum EffectError {
    #[error("effect input buffer is empty")]
    EmptyBuffer,
    #[error("effect computation cancelled")]
    Cancelled,
    #[error("invalid colorize color {value:?}")]
    InvalidColor {
        value: String,
        #[source]
        source: GeometryError,
    },
}

pub type EffectResult<T> = std::result::Result<T, EffectError>;

/// Normalized effect strength in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Intensity(f64);

impl Intensity {
    pub const ZERO: Self = Self(0.0);
    pub const FULL: Self = Self(1.0);

    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn from_percent(percent: u8) -> Self {
        Self(f64::from(percent.min(INTENSITY_PERCENT_MAX)) / 100.0)
    }

    pub const fn get(self) -> f64 {
        self.0
    }
}

impl Default for Intensity {
    fn default() -> Self {
        Self::from_percent(DEFAULT_INTENSITY_PERCENT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MotionDirection {
    #[default]
    Horizontal,
    Vertical,
    /// Bottom-left to top-right: `(x + k, y - k)`.
    Diagonal1,
    /// Top-left to bottom-right: `(x + k, y + k)`.
    Diagonal2,
}

impl MotionDirection {
    pub const fn step(self) -> (i64, i64) {
        match self {
            Self::Horizontal => (1, 0),
            Self::Vertical => (0, 1),
            Self::Diagonal1 => (1, -1),
            Self::Diagonal2 => (1, 1),
        }
    }

    pub const ALL: [Self; 4] = [
        Self::Horizontal,
        Self::Vertical,
        Self::Diagonal1,
        Self::Diagonal2,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Horizontal => "horizontal",
            Self::Vertical => "vertical",
            Self::Diagonal1 => "diagonal1",
            Self::Diagonal2 => "diagonal2",
        }
    }
}

pub fn parse_motion_direction(value: &str) -> Option<MotionDirection> {
    MotionDirection::ALL
        .into_iter()
        .find(|direction| direction.as_str().eq_ignore_ascii_case(value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Blur,
    MotionBlur { direction: MotionDirection },
    Pixelate,
    Colorize { color: Color },
    Invert,
    Grayscale,
}

impl Effect {
    pub const fn kind(&self) -> EffectKind {
        match self {
            Self::Blur => EffectKind::Blur,
            Self::MotionBlur { .. } => EffectKind::MotionBlur,
            Self::Pixelate => EffectKind::Pixelate,
            Self::Colorize { .. } => EffectKind::Colorize,
            Self::Invert => EffectKind::Invert,
            Self::Grayscale => EffectKind::Grayscale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectSpec {
    pub effect: Effect,
    pub intensity: Intensity,
}

impl EffectSpec {
    pub const fn new(effect: Effect, intensity: Intensity) -> Self {
        Self { effect, intensity }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectKind {
    #[default]
    Blur,
    MotionBlur,
    Pixelate,
    Colorize,
    Invert,
    Grayscale,
}

impl EffectKind {
    pub const ALL: [Self; 6] = [
        Self::Blur,
        Self::MotionBlur,
        Self::Pixelate,
        Self::Colorize,
        Self::Invert,
        Self::Grayscale,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blur => "blur",
            Self::MotionBlur => "motionBlur",
            Self::Pixelate => "pixelate",
            Self::Colorize => "colorize",
            Self::Invert => "invert",
            Self::Grayscale => "grayscale",
        }
    }
}

pub fn parse_effect_kind(value: &str) -> Option<EffectKind> {
    EffectKind::ALL
        .into_iter()
        .find(|kind| kind.as_str().eq_ignore_ascii_case(value))
}

/// Wire form of an effect request: integer percent intensity and optional
/// per-effect parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectConfig {
    pub kind: EffectKind,
    #[serde(default = "default_intensity_percent")]
    pub intensity: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<MotionDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

fn default_intensity_percent() -> u8 {
    DEFAULT_INTENSITY_PERCENT
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            kind: EffectKind::Blur,
            intensity: DEFAULT_INTENSITY_PERCENT,
            direction: None,
            color: None,
        }
    }
}

impl EffectConfig {
    pub fn to_spec(&self) -> EffectResult<EffectSpec> {
        if self.intensity > INTENSITY_PERCENT_MAX {
            tracing::debug!(intensity = self.intensity, "effect intensity clamped to 100");
        }
        let effect = match self.kind {
            EffectKind::Blur => Effect::Blur,
            EffectKind::MotionBlur => Effect::MotionBlur {
                direction: self.direction.unwrap_or_default(),
            },
            EffectKind::Pixelate => Effect::Pixelate,
            EffectKind::Colorize => {
                let value = self.color.as_deref().unwrap_or(DEFAULT_COLORIZE_HEX);
                let color = Color::from_hex(value).map_err(|source| EffectError::InvalidColor {
                    value: value.to_string(),
                    source,
                })?;
                Effect::Colorize { color }
            }
            EffectKind::Invert => Effect::Invert,
            EffectKind::Grayscale => Effect::Grayscale,
        };
        Ok(EffectSpec::new(effect, Intensity::from_percent(self.intensity)))
    }
}

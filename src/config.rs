use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use tracing::warn;

use crate::events::Amounts;

pub const MAX_BLUR_AMOUNT: u32 = 500;
pub const MAX_DIM_AMOUNT: u32 = 255;
pub const MAX_GREY_AMOUNT: u32 = 500;

pub const DEFAULT_BLUR: u32 = 250;
pub const DEFAULT_DIM: u32 = 128;
pub const DEFAULT_GREY: u32 = 0;

// Demo mode pins the amounts so screenshots look the same everywhere.
pub const DEMO_BLUR: u32 = 250;
pub const DEMO_DIM: u32 = 64;
pub const DEMO_GREY: u32 = 0;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Directory holding the artwork rotation.
    pub artwork_library_path: PathBuf,

    /// Blur strength, 0..=500. Maps to a pixel radius relative to the
    /// render height.
    pub blur_amount: u32,
    /// Maximum dim overlay alpha, 0..=255.
    pub dim_amount: u32,
    /// Desaturation strength, 0..=500.
    pub grey_amount: u32,

    /// Number of blurred keyframes between sharp and fully blurred.
    pub blur_keyframes: u32,
    /// Collapse the keyframe ladder to a single blurred frame
    /// (memory-constrained devices).
    pub reduced_keyframes: bool,

    #[serde(with = "humantime_serde")]
    pub crossfade_duration: Duration,
    #[serde(with = "humantime_serde")]
    pub blur_duration: Duration,
    /// How often to advance to the next artwork.
    #[serde(with = "humantime_serde")]
    pub advance_interval: Duration,
    /// Quiet period before a settings change forces a reload.
    #[serde(with = "humantime_serde")]
    pub settings_debounce: Duration,

    pub demo_mode: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            artwork_library_path: PathBuf::new(),
            blur_amount: DEFAULT_BLUR,
            dim_amount: DEFAULT_DIM,
            grey_amount: DEFAULT_GREY,
            blur_keyframes: 2,
            reduced_keyframes: false,
            crossfade_duration: Duration::from_millis(750),
            blur_duration: Duration::from_millis(750),
            advance_interval: Duration::from_secs(60 * 60),
            settings_debounce: Duration::from_millis(250),
            demo_mode: false,
        }
    }
}

impl Configuration {
    /// Validate runtime invariants; out-of-range amounts are clamped rather
    /// than rejected.
    pub fn validated(mut self) -> Result<Self> {
        ensure!(
            self.blur_keyframes >= 1,
            "blur-keyframes must be at least one"
        );
        ensure!(
            self.crossfade_duration > Duration::ZERO,
            "crossfade-duration must be positive"
        );
        ensure!(
            self.blur_duration > Duration::ZERO,
            "blur-duration must be positive"
        );
        ensure!(
            self.advance_interval > Duration::ZERO,
            "advance-interval must be positive"
        );
        self.blur_amount = clamp_amount("blur-amount", self.blur_amount, MAX_BLUR_AMOUNT);
        self.dim_amount = clamp_amount("dim-amount", self.dim_amount, MAX_DIM_AMOUNT);
        self.grey_amount = clamp_amount("grey-amount", self.grey_amount, MAX_GREY_AMOUNT);
        Ok(self)
    }

    /// Keyframe count after the memory accommodation.
    pub const fn effective_keyframes(&self) -> u32 {
        if self.reduced_keyframes {
            1
        } else {
            self.blur_keyframes
        }
    }

    pub const fn amounts(&self) -> Amounts {
        if self.demo_mode {
            Amounts {
                blur: DEMO_BLUR,
                dim: DEMO_DIM,
                grey: DEMO_GREY,
            }
        } else {
            Amounts {
                blur: self.blur_amount,
                dim: self.dim_amount,
                grey: self.grey_amount,
            }
        }
    }
}

fn clamp_amount(name: &str, value: u32, max: u32) -> u32 {
    if value > max {
        warn!(name, value, max, "amount out of range; clamping");
        max
    } else {
        value
    }
}

pub fn from_yaml_file(path: &Path) -> Result<Configuration> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    Ok(serde_yaml::from_str(&s)?)
}

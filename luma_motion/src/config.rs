// THEORY:
// `DetectorConfig` gathers every tunable constant of the detection pipeline in one
// place. The defaults reproduce the behaviour the detector was tuned with on a
// phone preview stream; a host can override any of them from a TOML file, from
// `LUMA_MOTION_*` environment variables, or by building the struct directly.
//
// Resolution order is: defaults -> file -> environment -> validate.

use crate::core_modules::motion_mask::ScaleRule;
use crate::error::{DetectError, DetectResult};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_MOTION_THRESHOLD: u8 = 20;
pub const DEFAULT_MIN_MOTION_AREA: u32 = 400;
pub const DEFAULT_MAX_OBJECTS: usize = 3;
pub const DEFAULT_MIN_COMPONENT_CELLS: usize = 10;
pub const DEFAULT_MIN_MOTION_PIXELS: usize = 10;
pub const DEFAULT_SCALE_LOW_RES: u32 = 4;
pub const DEFAULT_SCALE_HIGH_RES: u32 = 6;
pub const DEFAULT_HIGH_RES_WIDTH: u32 = 1920;
pub const DEFAULT_HIGH_RES_HEIGHT: u32 = 1080;

const ENV_PREFIX: &str = "LUMA_MOTION_";

/// Tunable behaviour of the `MotionDetector`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// A sampled pixel is "moving" when its luma changed by strictly more than this.
    pub motion_threshold: u8,
    /// Minimum motion area in full-resolution pixels for a component to become a region.
    pub min_motion_area: u32,
    /// Hard cap on the number of regions returned per frame.
    pub max_objects: usize,
    /// Components with this many cells or fewer are discarded as noise.
    pub min_component_cells: usize,
    /// Below this many moving cells the frame is reported as still without
    /// running the later stages.
    pub min_motion_pixels: usize,
    /// Downsample factor for frames below the high-resolution switchover.
    pub scale_low_res: u32,
    /// Downsample factor for frames at or above the high-resolution switchover.
    pub scale_high_res: u32,
    /// Frames at least this wide use `scale_high_res`.
    pub high_res_width: u32,
    /// Frames at least this tall use `scale_high_res`.
    pub high_res_height: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            motion_threshold: DEFAULT_MOTION_THRESHOLD,
            min_motion_area: DEFAULT_MIN_MOTION_AREA,
            max_objects: DEFAULT_MAX_OBJECTS,
            min_component_cells: DEFAULT_MIN_COMPONENT_CELLS,
            min_motion_pixels: DEFAULT_MIN_MOTION_PIXELS,
            scale_low_res: DEFAULT_SCALE_LOW_RES,
            scale_high_res: DEFAULT_SCALE_HIGH_RES,
            high_res_width: DEFAULT_HIGH_RES_WIDTH,
            high_res_height: DEFAULT_HIGH_RES_HEIGHT,
        }
    }
}

impl DetectorConfig {
    /// Loads a config file, applies environment overrides and validates the result.
    pub fn load(path: &Path) -> DetectResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut cfg = Self::from_toml_str(&contents)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parses a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> DetectResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Overrides fields from `LUMA_MOTION_*` environment variables.
    pub fn apply_env(&mut self) -> DetectResult<()> {
        self.apply_overrides(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Overrides fields from an arbitrary key lookup. Keys are the
    /// upper-case names without the `LUMA_MOTION_` prefix.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> DetectResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("THRESHOLD") {
            self.motion_threshold = parse_override("THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("MIN_AREA") {
            self.min_motion_area = parse_override("MIN_AREA", &v)?;
        }
        if let Some(v) = lookup("MAX_OBJECTS") {
            self.max_objects = parse_override("MAX_OBJECTS", &v)?;
        }
        if let Some(v) = lookup("MIN_COMPONENT_CELLS") {
            self.min_component_cells = parse_override("MIN_COMPONENT_CELLS", &v)?;
        }
        if let Some(v) = lookup("MIN_MOTION_PIXELS") {
            self.min_motion_pixels = parse_override("MIN_MOTION_PIXELS", &v)?;
        }
        if let Some(v) = lookup("SCALE_LOW_RES") {
            self.scale_low_res = parse_override("SCALE_LOW_RES", &v)?;
        }
        if let Some(v) = lookup("SCALE_HIGH_RES") {
            self.scale_high_res = parse_override("SCALE_HIGH_RES", &v)?;
        }
        if let Some(v) = lookup("HIGH_RES_WIDTH") {
            self.high_res_width = parse_override("HIGH_RES_WIDTH", &v)?;
        }
        if let Some(v) = lookup("HIGH_RES_HEIGHT") {
            self.high_res_height = parse_override("HIGH_RES_HEIGHT", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> DetectResult<()> {
        if self.scale_low_res == 0 || self.scale_high_res == 0 {
            return Err(DetectError::invalid_config("downsample scales must be at least 1"));
        }
        if self.max_objects == 0 {
            return Err(DetectError::invalid_config("max_objects must be at least 1"));
        }
        if self.high_res_width == 0 || self.high_res_height == 0 {
            return Err(DetectError::invalid_config(
                "high resolution switchover dimensions must be non-zero",
            ));
        }
        Ok(())
    }

    /// The downsample factor for a frame geometry. Never cached: a geometry
    /// change picks up the right factor on the very next call.
    pub fn scale_for(&self, width: u32, height: u32) -> u32 {
        self.scale_rule().for_geometry(width, height)
    }

    pub fn scale_rule(&self) -> ScaleRule {
        ScaleRule {
            low_res: self.scale_low_res,
            high_res: self.scale_high_res,
            high_res_width: self.high_res_width,
            high_res_height: self.high_res_height,
        }
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> DetectResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| {
            DetectError::invalid_config(format!("{ENV_PREFIX}{key}: cannot parse '{value}'"))
        })
}

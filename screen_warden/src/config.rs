// THEORY:
// `WardenConfig` is the single bundle of user-tunable behavior. It is owned by
// whatever surface the user edits it through and is read fresh on every tick
// and every processed frame; the core never caches it beyond the current step.
//
// It can be seeded from a TOML file at startup. Every field has a default so a
// partial (or empty) file is valid. Nothing is ever written back.

use crate::error::{Result, WardenError};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

pub const MIN_IDLE_TIMEOUT_SEC: u32 = 5;
pub const MAX_IDLE_TIMEOUT_SEC: u32 = 3600;
pub const MIN_NORMAL_FPS: u32 = 1;
pub const MAX_NORMAL_FPS: u32 = 30;
pub const MIN_ECO_INTERVAL_SEC: f64 = 0.05;
pub const MAX_ECO_INTERVAL_SEC: f64 = 60.0;

/// Pixel-sum thresholds for the two frame detectors.
///
/// The sums are over binarized (0 or 255) pixels, so they are tied to the capture
/// resolution. The defaults are calibrated for a 640x480 capture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionThresholds {
    /// Per-pixel delta against the running background that counts as changed.
    pub motion_pixel_delta: u8,
    /// Binarized sum above which a frame is reported as motion.
    pub motion_sum: u64,
    /// Per-pixel delta against the empty-room reference that counts as changed.
    pub presence_pixel_delta: u8,
    /// Binarized sum above which a frame is reported as presence.
    pub presence_sum: u64,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            motion_pixel_delta: 25,
            motion_sum: 12_000,
            presence_pixel_delta: 30,
            presence_sum: 50_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub auto_off_enabled: bool,
    pub idle_timeout_sec: u32,
    pub auto_on_enabled: bool,
    pub smart_wake_enabled: bool,
    /// Off-duration (minutes) after which a wake requires sustained motion.
    pub smart_wake_stale_minutes: u32,
    /// Seconds of continuous motion required to wake after a long sleep.
    pub smart_wake_motion_sec: u32,
    pub reference_mode_enabled: bool,
    pub optical_load_optimize_enabled: bool,
    pub normal_fps: u32,
    pub eco_interval_sec: f64,
    pub scroll_lock_feedback: bool,
    pub detection: DetectionThresholds,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            auto_off_enabled: true,
            idle_timeout_sec: 10,
            auto_on_enabled: true,
            smart_wake_enabled: false,
            smart_wake_stale_minutes: 3,
            smart_wake_motion_sec: 10,
            reference_mode_enabled: false,
            optical_load_optimize_enabled: true,
            normal_fps: 3,
            eco_interval_sec: 2.0,
            scroll_lock_feedback: true,
            detection: DetectionThresholds::default(),
        }
    }
}

impl WardenConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_toml_str(&data)
    }

    pub fn from_toml_str(data: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(data)
            .map_err(|e| WardenError::config(format!("toml parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_IDLE_TIMEOUT_SEC..=MAX_IDLE_TIMEOUT_SEC).contains(&self.idle_timeout_sec) {
            return Err(WardenError::config(format!(
                "idle_timeout_sec must be within {MIN_IDLE_TIMEOUT_SEC}..={MAX_IDLE_TIMEOUT_SEC}, got {}",
                self.idle_timeout_sec
            )));
        }
        if !(MIN_NORMAL_FPS..=MAX_NORMAL_FPS).contains(&self.normal_fps) {
            return Err(WardenError::config(format!(
                "normal_fps must be within {MIN_NORMAL_FPS}..={MAX_NORMAL_FPS}, got {}",
                self.normal_fps
            )));
        }
        if !(MIN_ECO_INTERVAL_SEC..=MAX_ECO_INTERVAL_SEC).contains(&self.eco_interval_sec) {
            return Err(WardenError::config(format!(
                "eco_interval_sec must be within {MIN_ECO_INTERVAL_SEC}..={MAX_ECO_INTERVAL_SEC}, got {}",
                self.eco_interval_sec
            )));
        }
        Ok(())
    }

    /// Applies a `field value` assignment coming from a text control surface.
    pub fn set_field(&mut self, field: &str, value: &str) -> Result<()> {
        let mut next = self.clone();
        match field {
            "auto_off_enabled" => next.auto_off_enabled = parse_value(field, value)?,
            "idle_timeout_sec" => next.idle_timeout_sec = parse_value(field, value)?,
            "auto_on_enabled" => next.auto_on_enabled = parse_value(field, value)?,
            "smart_wake_enabled" => next.smart_wake_enabled = parse_value(field, value)?,
            "smart_wake_stale_minutes" => next.smart_wake_stale_minutes = parse_value(field, value)?,
            "smart_wake_motion_sec" => next.smart_wake_motion_sec = parse_value(field, value)?,
            "reference_mode_enabled" => next.reference_mode_enabled = parse_value(field, value)?,
            "optical_load_optimize_enabled" => {
                next.optical_load_optimize_enabled = parse_value(field, value)?
            }
            "normal_fps" => next.normal_fps = parse_value(field, value)?,
            "eco_interval_sec" => next.eco_interval_sec = parse_value(field, value)?,
            "scroll_lock_feedback" => next.scroll_lock_feedback = parse_value(field, value)?,
            "detection.motion_pixel_delta" => {
                next.detection.motion_pixel_delta = parse_value(field, value)?
            }
            "detection.motion_sum" => next.detection.motion_sum = parse_value(field, value)?,
            "detection.presence_pixel_delta" => {
                next.detection.presence_pixel_delta = parse_value(field, value)?
            }
            "detection.presence_sum" => next.detection.presence_sum = parse_value(field, value)?,
            other => return Err(WardenError::config(format!("unknown field: {other}"))),
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(field: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| WardenError::config(format!("invalid value for {field}: {value}")))
}

use std::{fmt, path::PathBuf, str::FromStr};

use crate::{
    core::{Fps, Resolution},
    error::{DepthsweepError, DepthsweepResult},
};

/// Largest per-pixel blur radius the depth-of-field pass will run with.
pub const MAX_BOKEH_RADIUS_PX: f64 = 64.0;

/// Camera trajectory shape for one animation cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationType {
    /// Camera sweeps left-right along a sine.
    HorizontalSwitch,
    /// Camera sweeps up-down along a sine.
    VerticalSwitch,
    /// Camera orbits a full circle.
    Circular,
}

impl AnimationType {
    pub const ALL: [AnimationType; 3] = [
        AnimationType::HorizontalSwitch,
        AnimationType::VerticalSwitch,
        AnimationType::Circular,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::HorizontalSwitch => "horizontal_switch",
            Self::VerticalSwitch => "vertical_switch",
            Self::Circular => "circular",
        }
    }
}

impl fmt::Display for AnimationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AnimationType {
    type Err = DepthsweepError;

    /// Unknown names fail here, at configuration time, never mid-export.
    fn from_str(s: &str) -> DepthsweepResult<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| DepthsweepError::UnsupportedAnimationType(s.to_string()))
    }
}

/// Caller-supplied animation parameters, read-only during an export.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnimationConfig {
    pub animation: AnimationType,
    /// Sweep amplitude as a fraction of image size.
    pub intensity: f64,
    /// Seconds per animation cycle.
    pub interval_secs: f64,
    /// How many cycles the clip plays.
    pub repeat_count: u32,
    /// Depth value that stays in focus.
    pub focal_point: f64,
    /// Depth distance from the focal point that stays sharp.
    pub focal_range: f64,
    /// Blur radius ceiling in output pixels; 0 disables depth of field.
    pub bokeh_radius: f64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            animation: AnimationType::HorizontalSwitch,
            intensity: 0.05,
            interval_secs: 2.0,
            repeat_count: 5,
            focal_point: 0.0,
            focal_range: 5.0,
            bokeh_radius: 10.0,
        }
    }
}

impl AnimationConfig {
    pub fn validate(&self) -> DepthsweepResult<()> {
        if !self.intensity.is_finite() || self.intensity < 0.0 {
            return Err(DepthsweepError::validation(
                "animation intensity must be finite and >= 0",
            ));
        }
        if !self.interval_secs.is_finite() || self.interval_secs <= 0.0 {
            return Err(DepthsweepError::validation(
                "animation interval must be finite and > 0 seconds",
            ));
        }
        if self.repeat_count < 1 {
            return Err(DepthsweepError::validation(
                "animation repeat_count must be >= 1",
            ));
        }
        if !self.focal_point.is_finite() {
            return Err(DepthsweepError::validation(
                "animation focal_point must be finite",
            ));
        }
        if !self.focal_range.is_finite() || self.focal_range <= 0.0 {
            return Err(DepthsweepError::validation(
                "animation focal_range must be finite and > 0",
            ));
        }
        if !self.bokeh_radius.is_finite()
            || self.bokeh_radius < 0.0
            || self.bokeh_radius > MAX_BOKEH_RADIUS_PX
        {
            return Err(DepthsweepError::validation(format!(
                "animation bokeh_radius must be within 0..={MAX_BOKEH_RADIUS_PX} pixels"
            )));
        }
        Ok(())
    }

    pub fn total_duration_secs(&self) -> f64 {
        self.interval_secs * f64::from(self.repeat_count)
    }
}

/// Where and how the finished video is written.
///
/// The output path is explicit per-export configuration; nothing in the
/// pipeline assumes a shared temp location.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OutputConfig {
    pub resolution: Resolution,
    pub fps: Fps,
    pub out_path: PathBuf,
    /// Background color (straight RGBA) used to flatten transparent sources.
    pub bg_rgba: [u8; 4],
}

impl OutputConfig {
    pub fn mp4(out_path: impl Into<PathBuf>, resolution: Resolution, fps: Fps) -> Self {
        Self {
            resolution,
            fps,
            out_path: out_path.into(),
            bg_rgba: [0, 0, 0, 255],
        }
    }

    pub fn validate(&self) -> DepthsweepResult<()> {
        if self.resolution.width == 0 || self.resolution.height == 0 {
            return Err(DepthsweepError::validation(
                "output width/height must be non-zero",
            ));
        }
        if !self.resolution.width.is_multiple_of(2) || !self.resolution.height.is_multiple_of(2) {
            // yuv420p subsamples chroma 2x2.
            return Err(DepthsweepError::validation(
                "output width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(DepthsweepError::validation("output fps must be non-zero"));
        }
        if self.out_path.as_os_str().is_empty() {
            return Err(DepthsweepError::validation("output path must be non-empty"));
        }
        Ok(())
    }
}

use crate::error::{DepthsweepError, DepthsweepResult};

pub use kurbo::Vec2;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> DepthsweepResult<Self> {
        if den == 0 {
            return Err(DepthsweepError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(DepthsweepError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    pub fn frames_to_secs(self, frames: u64) -> f64 {
        (frames as f64) * self.frame_duration_secs()
    }

    pub fn secs_to_frames_round(self, secs: f64) -> u64 {
        (secs * self.as_f64()).round().max(0.0) as u64
    }

    /// Playback time of frame `idx`: `idx / fps` seconds.
    ///
    /// Timestamp assignment belongs to the encoder side; producers only ever
    /// hand over frame indices.
    pub fn presentation_time_secs(self, idx: FrameIndex) -> f64 {
        self.frames_to_secs(idx.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    pub fn rgba_len(self) -> usize {
        self.pixel_count() * 4
    }
}

/// Per-frame camera displacement plus the normalized cycle phase it was
/// derived from. `dx`/`dy` already carry the configured intensity.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CameraOffset {
    pub dx: f64,
    pub dy: f64,
    pub t: f64,
}

impl CameraOffset {
    pub const ZERO: Self = Self {
        dx: 0.0,
        dy: 0.0,
        t: 0.0,
    };

    pub fn displacement(self) -> Vec2 {
        Vec2::new(self.dx, self.dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_rejects_zero_terms() {
        assert!(Fps::new(0, 1).is_err());
        assert!(Fps::new(30, 0).is_err());
        assert!(Fps::new(30, 1).is_ok());
    }

    #[test]
    fn fps_frames_secs_roundtrip_round() {
        let fps = Fps::new(30000, 1001).unwrap();
        let secs = fps.frames_to_secs(123);
        assert_eq!(fps.secs_to_frames_round(secs), 123);
    }

    #[test]
    fn presentation_times_are_spaced_by_frame_duration() {
        let fps = Fps::new(30, 1).unwrap();
        for i in 1..90u64 {
            let prev = fps.presentation_time_secs(FrameIndex(i - 1));
            let cur = fps.presentation_time_secs(FrameIndex(i));
            assert!(cur > prev);
            assert!((cur - prev - fps.frame_duration_secs()).abs() < 1e-12);
        }
        assert_eq!(fps.presentation_time_secs(FrameIndex(0)), 0.0);
    }

    #[test]
    fn camera_offset_displacement_matches_components() {
        let off = CameraOffset {
            dx: 0.05,
            dy: -0.02,
            t: 0.25,
        };
        assert_eq!(off.displacement(), Vec2::new(0.05, -0.02));
        assert_eq!(CameraOffset::ZERO.displacement(), Vec2::ZERO);
    }
}

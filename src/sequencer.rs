use crate::{
    config::{AnimationConfig, AnimationType},
    core::{CameraOffset, Fps, FrameIndex},
    error::{DepthsweepError, DepthsweepResult},
};

/// Maps frame indices to camera offsets for a validated animation config.
///
/// Pure and total: the same `(config, fps, index)` always produces the same
/// offset, so frames can be rendered from any thread in any order.
#[derive(Clone, Copy, Debug)]
pub struct Sequencer {
    anim: AnimationConfig,
    fps: Fps,
}

impl Sequencer {
    pub fn new(anim: AnimationConfig, fps: Fps) -> DepthsweepResult<Self> {
        anim.validate()?;
        if fps.num == 0 || fps.den == 0 {
            return Err(DepthsweepError::validation("sequencer fps must be non-zero"));
        }
        Ok(Self { anim, fps })
    }

    pub fn animation(&self) -> &AnimationConfig {
        &self.anim
    }

    pub fn fps(&self) -> Fps {
        self.fps
    }

    /// Frames in one animation cycle, `round(fps * interval)`, at least 1.
    pub fn frames_per_cycle(&self) -> u64 {
        self.fps.secs_to_frames_round(self.anim.interval_secs).max(1)
    }

    /// Total frames across all cycles, `round(fps * interval * repeat)`,
    /// at least 1.
    pub fn frame_count(&self) -> u64 {
        self.fps
            .secs_to_frames_round(self.anim.total_duration_secs())
            .max(1)
    }

    /// Normalized phase in `[0, 1)` for a frame index.
    ///
    /// The cycle is divided by `frames_per_cycle - 1` so the last frame of
    /// each cycle lands on phase 1, which wraps to exactly 0.0. That makes
    /// the closing frame of every loop bit-identical to its opening frame,
    /// the seam contract for videos played on repeat.
    pub fn phase(&self, idx: FrameIndex) -> f64 {
        let cycle = self.frames_per_cycle();
        if cycle <= 1 {
            return 0.0;
        }
        let wrapped = idx.0 % cycle;
        let t = wrapped as f64 / (cycle - 1) as f64;
        if t >= 1.0 { 0.0 } else { t }
    }

    pub fn offset_for_frame(&self, idx: FrameIndex) -> CameraOffset {
        self.offset_at_phase(self.phase(idx))
    }

    /// Camera offset at an explicit phase in `[0, 1)`, for callers that
    /// want a single preview frame rather than a sequence.
    pub fn offset_at_phase(&self, t: f64) -> CameraOffset {
        let t = t.rem_euclid(1.0);
        let theta = std::f64::consts::TAU * t;
        let amp = self.anim.intensity;

        let (dx, dy) = match self.anim.animation {
            AnimationType::HorizontalSwitch => (amp * theta.sin(), 0.0),
            AnimationType::VerticalSwitch => (0.0, amp * theta.sin()),
            AnimationType::Circular => (amp * theta.cos(), amp * theta.sin()),
        };

        CameraOffset { dx, dy, t }
    }
}

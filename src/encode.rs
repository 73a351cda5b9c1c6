use crate::core::{Fps, FrameIndex, Resolution};
use crate::error::{DepthsweepError, DepthsweepResult};
use crate::parallax::FrameRgba;

/// Everything a sink needs to know before the first frame arrives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub resolution: Resolution,
    pub fps: Fps,
}

/// Receives rendered frames in strict presentation order.
///
/// The sink owns timing: frame `i` is presented at `i / fps`, derived from
/// the index alone. Callers never pass timestamps. `push_frame` must see
/// indices 0, 1, 2, ... with no gaps and no repeats; anything else is a
/// write error. A sink that fails mid-session is left for `abort`, which
/// must release resources and remove partial output.
pub trait FrameSink: Send {
    fn begin(&mut self, config: SessionConfig) -> DepthsweepResult<()>;
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRgba) -> DepthsweepResult<()>;
    fn finish(&mut self) -> DepthsweepResult<()>;
    fn abort(&mut self);
}

/// A recorded frame with the presentation time the sink assigned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    pub idx: FrameIndex,
    pub pts_secs: f64,
    pub data: Vec<u8>,
}

/// Sink that keeps every frame in memory. Used by tests and by callers that
/// postprocess frames themselves.
#[derive(Debug, Default)]
pub struct InMemorySink {
    config: Option<SessionConfig>,
    next: u64,
    pub frames: Vec<RecordedFrame>,
    pub finished: bool,
    pub aborted: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<SessionConfig> {
        self.config
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, config: SessionConfig) -> DepthsweepResult<()> {
        if self.config.is_some() {
            return Err(DepthsweepError::codec_open("sink session already begun"));
        }
        self.config = Some(config);
        self.next = 0;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRgba) -> DepthsweepResult<()> {
        let config = self
            .config
            .ok_or_else(|| DepthsweepError::codec_write("push_frame before begin"))?;
        if idx.0 != self.next {
            return Err(DepthsweepError::codec_write(format!(
                "frame {} arrived out of order, expected {}",
                idx.0, self.next
            )));
        }
        if frame.width != config.resolution.width || frame.height != config.resolution.height {
            return Err(DepthsweepError::codec_write(format!(
                "frame {} is {}x{}, session is {}x{}",
                idx.0, frame.width, frame.height, config.resolution.width, config.resolution.height
            )));
        }
        self.frames.push(RecordedFrame {
            idx,
            pts_secs: config.fps.presentation_time_secs(idx),
            data: frame.data.clone(),
        });
        self.next += 1;
        Ok(())
    }

    fn finish(&mut self) -> DepthsweepResult<()> {
        if self.config.is_none() {
            return Err(DepthsweepError::codec_write("finish before begin"));
        }
        self.finished = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex, OnceLock,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    time::Instant,
};

use crate::{
    config::{AnimationConfig, OutputConfig},
    core::FrameIndex,
    encode::{FrameSink, SessionConfig},
    encode_ffmpeg::FfmpegEncoder,
    error::{DepthsweepError, DepthsweepResult, ErrorKind},
    parallax::{FrameRgba, ParallaxImage},
    render::render_frame,
    sequencer::Sequencer,
};

/// Export lifecycle, published through the state callback.
///
/// States only ever move forward: `Idle`, then `Rendering` with a
/// non-decreasing percentage, then `Saving`, then exactly one of
/// `Finished` or `Failed`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum ExportState {
    Idle,
    Rendering(u8),
    Saving,
    Finished(PathBuf),
    Failed(ErrorKind),
}

impl ExportState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished(_) | Self::Failed(_))
    }
}

/// Cooperative cancellation flag shared between an export and its caller.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Debug)]
pub struct ExportOptions {
    /// Rendered frames buffered ahead of the encoder. The channel is
    /// bounded, so a slow encoder stalls rendering instead of growing
    /// memory without limit.
    pub channel_capacity: usize,
    pub cancel: Option<CancelToken>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            channel_capacity: 4,
            cancel: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ExportStats {
    pub frames_total: u64,
    pub frames_encoded: u64,
    pub elapsed_secs: f64,
}

struct FrameMsg {
    idx: FrameIndex,
    frame: FrameRgba,
}

/// Render the full animation and stream it into `sink`.
///
/// Rendering happens on the caller thread while a scoped encoder thread
/// feeds the sink, so a frame is always being encoded while the next one
/// is being rendered. On any failure the sink is aborted and the final
/// published state is `Failed`; `Finished` is only published after the
/// sink reports a durable end of stream.
pub fn export_to_sink(
    image: &ParallaxImage,
    anim: &AnimationConfig,
    output: &OutputConfig,
    sink: &mut dyn FrameSink,
    opts: &ExportOptions,
    on_state: &mut dyn FnMut(ExportState),
) -> DepthsweepResult<ExportStats> {
    match run_export(image, anim, output, sink, opts, on_state) {
        Ok(stats) => Ok(stats),
        Err(e) => {
            sink.abort();
            on_state(ExportState::Failed(e.kind()));
            Err(e)
        }
    }
}

fn run_export(
    image: &ParallaxImage,
    anim: &AnimationConfig,
    output: &OutputConfig,
    sink: &mut dyn FrameSink,
    opts: &ExportOptions,
    on_state: &mut dyn FnMut(ExportState),
) -> DepthsweepResult<ExportStats> {
    let started = Instant::now();

    output.validate()?;
    let seq = Sequencer::new(*anim, output.fps)?;
    let total = seq.frame_count();

    tracing::debug!(
        frames = total,
        width = output.resolution.width,
        height = output.resolution.height,
        "starting export"
    );
    on_state(ExportState::Rendering(0));

    let session = SessionConfig {
        resolution: output.resolution,
        fps: output.fps,
    };
    let cap = opts.channel_capacity.max(1);

    let frames_encoded = std::thread::scope(|scope| -> DepthsweepResult<u64> {
        let (tx, rx) = mpsc::sync_channel::<FrameMsg>(cap);
        let sink_ref: &mut dyn FrameSink = sink;

        let enc = scope.spawn(move || -> DepthsweepResult<u64> {
            sink_ref.begin(session)?;
            let mut encoded = 0u64;
            while let Ok(msg) = rx.recv() {
                sink_ref.push_frame(msg.idx, &msg.frame)?;
                encoded += 1;
            }
            Ok(encoded)
        });

        let mut produce_res: DepthsweepResult<()> = Ok(());
        for i in 0..total {
            if opts.cancel.as_ref().is_some_and(CancelToken::is_canceled) {
                produce_res = Err(DepthsweepError::Canceled);
                break;
            }

            let idx = FrameIndex(i);
            let frame = match render_frame(image, seq.offset_for_frame(idx), anim, output.resolution)
            {
                Ok(frame) => frame,
                Err(e) => {
                    produce_res = Err(e);
                    break;
                }
            };

            // A send failure means the encoder thread exited early; its
            // join result carries the actual cause.
            if tx.send(FrameMsg { idx, frame }).is_err() {
                break;
            }
            on_state(ExportState::Rendering(progress_pct(i + 1, total)));
        }

        drop(tx);
        let enc_res = enc
            .join()
            .map_err(|_| DepthsweepError::codec_write("encoder thread panicked"))?;

        match (produce_res, enc_res) {
            (Ok(()), Ok(encoded)) => Ok(encoded),
            (Err(e), _) => Err(e),
            (Ok(()), Err(e)) => Err(e),
        }
    })?;

    on_state(ExportState::Saving);
    sink.finish()?;
    on_state(ExportState::Finished(output.out_path.clone()));

    Ok(ExportStats {
        frames_total: total,
        frames_encoded,
        elapsed_secs: started.elapsed().as_secs_f64(),
    })
}

/// Render the full animation and encode it to the mp4 at
/// `output.out_path`.
///
/// At most one export per destination path may be in flight at a time,
/// process-wide. A second caller gets `ExportInFlight` immediately instead
/// of two encoders racing on the same file.
#[tracing::instrument(skip_all, fields(out = %output.out_path.display()))]
pub fn export_video(
    image: &ParallaxImage,
    anim: &AnimationConfig,
    output: &OutputConfig,
    opts: &ExportOptions,
    on_state: &mut dyn FnMut(ExportState),
) -> DepthsweepResult<ExportStats> {
    let _guard = match InFlightGuard::acquire(&output.out_path) {
        Ok(guard) => guard,
        Err(e) => {
            on_state(ExportState::Failed(e.kind()));
            return Err(e);
        }
    };

    let mut sink = FfmpegEncoder::new(&output.out_path, output.bg_rgba);
    export_to_sink(image, anim, output, &mut sink, opts, on_state)
}

fn progress_pct(done: u64, total: u64) -> u8 {
    ((done * 100) / total.max(1)) as u8
}

static IN_FLIGHT: OnceLock<Mutex<BTreeSet<PathBuf>>> = OnceLock::new();

/// Membership in the process-wide set of destinations being written.
/// Dropping the guard releases the path.
#[derive(Debug)]
struct InFlightGuard {
    path: PathBuf,
}

impl InFlightGuard {
    fn acquire(path: &Path) -> DepthsweepResult<Self> {
        let abs = std::path::absolute(path).map_err(|e| DepthsweepError::filesystem(path, e))?;
        let set = IN_FLIGHT.get_or_init(|| Mutex::new(BTreeSet::new()));
        let mut set = set.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(abs.clone()) {
            return Err(DepthsweepError::ExportInFlight(abs));
        }
        Ok(Self { path: abs })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some(set) = IN_FLIGHT.get() {
            let mut set = set.lock().unwrap_or_else(|e| e.into_inner());
            set.remove(&self.path);
        }
    }
}

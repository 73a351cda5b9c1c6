use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use depthsweep::{
    AnimationConfig, AnimationType, ExportOptions, ExportState, Fps, FrameSource, OutputConfig,
    ParallaxImage, Resolution, Sequencer, encode_ffmpeg::flatten_to_opaque_rgba8, export_video,
    render_frame,
};

#[derive(Parser, Debug)]
#[command(name = "depthsweep", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Render a single preview frame as a PNG.
    Frame(FrameArgs),
    /// Render the full animation as an MP4 (requires `ffmpeg` on PATH).
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct InputArgs {
    /// Input photo (png, jpeg and friends).
    #[arg(long)]
    diffuse: PathBuf,

    /// Grayscale depth map; white is near, black is far.
    #[arg(long)]
    depth: PathBuf,

    /// Output width in pixels. Defaults to the photo width.
    #[arg(long)]
    width: Option<u32>,

    /// Output height in pixels. Defaults to the photo height.
    #[arg(long)]
    height: Option<u32>,
}

#[derive(Parser, Debug)]
struct AnimArgs {
    /// Camera path: horizontal_switch, vertical_switch or circular.
    #[arg(long, default_value_t = AnimationType::HorizontalSwitch)]
    animation: AnimationType,

    /// Camera travel as a fraction of the image size.
    #[arg(long, default_value_t = AnimationConfig::default().intensity)]
    intensity: f64,

    /// Seconds per animation cycle.
    #[arg(long, default_value_t = AnimationConfig::default().interval_secs)]
    interval: f64,

    /// Number of cycles in the exported clip.
    #[arg(long, default_value_t = AnimationConfig::default().repeat_count)]
    repeat: u32,

    /// Depth value that stays in focus (0 = far, 1 = near).
    #[arg(long, default_value_t = AnimationConfig::default().focal_point)]
    focal_point: f64,

    /// Depth band around the focal point that stays sharp.
    #[arg(long, default_value_t = AnimationConfig::default().focal_range)]
    focal_range: f64,

    /// Maximum out-of-focus blur radius in pixels (0 disables blur).
    #[arg(long, default_value_t = AnimationConfig::default().bokeh_radius)]
    bokeh_radius: f64,
}

impl AnimArgs {
    fn to_config(&self) -> AnimationConfig {
        AnimationConfig {
            animation: self.animation,
            intensity: self.intensity,
            interval_secs: self.interval,
            repeat_count: self.repeat,
            focal_point: self.focal_point,
            focal_range: self.focal_range,
            bokeh_radius: self.bokeh_radius,
        }
    }
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    inputs: InputArgs,

    #[command(flatten)]
    anim: AnimArgs,

    /// Cycle phase to preview in [0, 1). 0.25 is peak displacement for
    /// the switch paths.
    #[arg(long, default_value_t = 0.25)]
    t: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    inputs: InputArgs,

    #[command(flatten)]
    anim: AnimArgs,

    /// Output frame rate.
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Emit state changes as JSON lines on stdout instead of progress
    /// text on stderr.
    #[arg(long)]
    progress_json: bool,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn load_image(inputs: &InputArgs) -> anyhow::Result<ParallaxImage> {
    let diffuse = FrameSource::file(&inputs.diffuse);
    let depth = FrameSource::file(&inputs.depth);
    Ok(ParallaxImage::from_sources(&diffuse, &depth)?)
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let image = load_image(&args.inputs)?;
    let anim = args.anim.to_config();

    let resolution = Resolution::new(
        args.inputs.width.unwrap_or_else(|| image.width()),
        args.inputs.height.unwrap_or_else(|| image.height()),
    );

    let seq = Sequencer::new(anim, Fps::new(30, 1)?)?;
    let frame = render_frame(&image, seq.offset_at_phase(args.t), &anim, resolution)?;

    let mut opaque = vec![0u8; frame.data.len()];
    flatten_to_opaque_rgba8(&mut opaque, &frame.data, frame.premultiplied, [0, 0, 0, 255])?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &opaque,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let image = load_image(&args.inputs)?;
    let anim = args.anim.to_config();

    let resolution = Resolution::new(
        args.inputs
            .width
            .unwrap_or_else(|| even_floor(image.width(), "width")),
        args.inputs
            .height
            .unwrap_or_else(|| even_floor(image.height(), "height")),
    );

    let fps = Fps::new(args.fps, 1)?;
    let output = OutputConfig::mp4(&args.out, resolution, fps);

    let progress_json = args.progress_json;
    let mut last_decile = None;
    let stats = export_video(
        &image,
        &anim,
        &output,
        &ExportOptions::default(),
        &mut |state| {
            if progress_json {
                if let Ok(line) = serde_json::to_string(&state) {
                    println!("{line}");
                }
                return;
            }
            match state {
                ExportState::Rendering(pct) => {
                    let decile = pct / 10;
                    if last_decile != Some(decile) {
                        last_decile = Some(decile);
                        eprintln!("rendering {pct}%");
                    }
                }
                ExportState::Saving => eprintln!("finalizing mp4"),
                _ => {}
            }
        },
    )?;

    eprintln!(
        "wrote {} ({} frames in {:.1}s)",
        args.out.display(),
        stats.frames_encoded,
        stats.elapsed_secs
    );
    Ok(())
}

/// mp4 output is yuv420p, which needs even dimensions. Only applied to
/// sizes inferred from the photo; explicit flags are validated as given.
fn even_floor(n: u32, axis: &str) -> u32 {
    if n.is_multiple_of(2) {
        n
    } else {
        let e = (n - 1).max(2);
        eprintln!("photo {axis} {n} is odd, exporting at {e}");
        e
    }
}

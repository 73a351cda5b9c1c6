//! Turn a photo plus a depth map into a short parallax animation and
//! export it as an mp4.
//!
//! The pieces compose left to right: [`source`] decodes the two input
//! images, [`parallax`] pairs them into a validated [`ParallaxImage`],
//! [`sequencer`] turns an [`AnimationConfig`] into per-frame camera
//! offsets, [`render`] reprojects pixels for one offset, and
//! [`pipeline`] drives the whole frame sequence into a [`FrameSink`]
//! such as the bundled ffmpeg-backed mp4 encoder.

#![forbid(unsafe_code)]

pub mod config;
pub mod core;
pub mod encode;
pub mod encode_ffmpeg;
pub mod error;
pub mod parallax;
pub mod pipeline;
pub mod render;
pub mod sequencer;
pub mod source;

mod bokeh_cpu;
mod parallax_cpu;

pub use config::{AnimationConfig, AnimationType, OutputConfig};
pub use core::{CameraOffset, Fps, FrameIndex, Resolution, Vec2};
pub use encode::{FrameSink, InMemorySink, SessionConfig};
pub use encode_ffmpeg::FfmpegEncoder;
pub use error::{DepthsweepError, DepthsweepResult, ErrorKind};
pub use parallax::{DepthMap, FrameRgba, ParallaxImage};
pub use pipeline::{
    CancelToken, ExportOptions, ExportState, ExportStats, export_to_sink, export_video,
};
pub use render::render_frame;
pub use sequencer::Sequencer;
pub use source::FrameSource;

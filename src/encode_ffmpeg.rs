use std::{
    fs,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
    thread::JoinHandle,
};

use crate::{
    core::FrameIndex,
    encode::{FrameSink, SessionConfig},
    error::{DepthsweepError, DepthsweepResult},
    parallax::FrameRgba,
};

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> DepthsweepResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| DepthsweepError::filesystem(parent, e))?;
    }
    Ok(())
}

/// MP4 sink backed by a piped `ffmpeg` subprocess.
///
/// We intentionally use the system `ffmpeg` binary rather than `ffmpeg-next`
/// to avoid native FFmpeg dev header/lib requirements. Frames are streamed
/// as rawvideo rgba over stdin; the input `-r` rate makes ffmpeg assign
/// frame `i` the timestamp `i / fps`, so pacing is fully determined by the
/// frame indices this sink checks. A full stdin pipe blocks `push_frame`
/// until the encoder catches up; frames are never dropped.
pub struct FfmpegEncoder {
    out_path: PathBuf,
    bg_rgba: [u8; 4],
    session: Option<EncodeSession>,
}

struct EncodeSession {
    config: SessionConfig,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    scratch: Vec<u8>,
    next: u64,
}

impl FfmpegEncoder {
    pub fn new(out_path: impl Into<PathBuf>, bg_rgba: [u8; 4]) -> Self {
        Self {
            out_path: out_path.into(),
            bg_rgba,
            session: None,
        }
    }

    pub fn out_path(&self) -> &Path {
        &self.out_path
    }
}

impl FrameSink for FfmpegEncoder {
    fn begin(&mut self, config: SessionConfig) -> DepthsweepResult<()> {
        if self.session.is_some() {
            return Err(DepthsweepError::codec_open("encode session already begun"));
        }

        let (width, height) = (config.resolution.width, config.resolution.height);
        if width == 0 || height == 0 {
            return Err(DepthsweepError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if !width.is_multiple_of(2) || !height.is_multiple_of(2) {
            // We target yuv420p output for maximum player compatibility.
            return Err(DepthsweepError::validation(
                "encode width/height must be even (required for yuv420p mp4 output)",
            ));
        }

        if !is_ffmpeg_on_path() {
            return Err(DepthsweepError::codec_open(
                "ffmpeg is required for mp4 export, but was not found on PATH",
            ));
        }

        ensure_parent_dir(&self.out_path)?;

        // Replace, never append to, whatever was at the destination.
        if self.out_path.exists() {
            fs::remove_file(&self.out_path)
                .map_err(|e| DepthsweepError::filesystem(&self.out_path, e))?;
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{width}x{height}"),
            "-r",
            &format!("{}/{}", config.fps.num, config.fps.den),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ])
        .arg(&self.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            DepthsweepError::codec_open(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DepthsweepError::codec_open("failed to open ffmpeg stdin"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DepthsweepError::codec_open("failed to open ffmpeg stderr"))?;

        // Drain stderr on its own thread so a chatty ffmpeg can never
        // deadlock against our frame writes.
        let stderr_drain = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
            use std::io::Read as _;
            let mut stderr = stderr;
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf)?;
            Ok(buf)
        });

        tracing::debug!(
            out = %self.out_path.display(),
            width,
            height,
            "started ffmpeg encode session"
        );

        self.session = Some(EncodeSession {
            config,
            child,
            stdin: Some(stdin),
            stderr_drain: Some(stderr_drain),
            scratch: vec![0u8; config.resolution.rgba_len()],
            next: 0,
        });
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRgba) -> DepthsweepResult<()> {
        let Some(session) = self.session.as_mut() else {
            return Err(DepthsweepError::codec_write("push_frame before begin"));
        };

        if idx.0 != session.next {
            return Err(DepthsweepError::codec_write(format!(
                "frame {} arrived out of order, expected {}",
                idx.0, session.next
            )));
        }

        let res = session.config.resolution;
        if frame.width != res.width || frame.height != res.height {
            return Err(DepthsweepError::codec_write(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, res.width, res.height
            )));
        }
        if frame.data.len() != session.scratch.len() {
            return Err(DepthsweepError::codec_write(
                "frame.data size mismatch with width*height*4",
            ));
        }

        flatten_to_opaque_rgba8(
            &mut session.scratch,
            &frame.data,
            frame.premultiplied,
            self.bg_rgba,
        )?;

        let Some(stdin) = session.stdin.as_mut() else {
            return Err(DepthsweepError::codec_write(
                "ffmpeg encoder is already finalized",
            ));
        };

        use std::io::Write as _;
        stdin.write_all(&session.scratch).map_err(|e| {
            DepthsweepError::codec_write(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;

        session.next += 1;
        Ok(())
    }

    fn finish(&mut self) -> DepthsweepResult<()> {
        let Some(mut session) = self.session.take() else {
            return Err(DepthsweepError::codec_write("finish before begin"));
        };

        // Closing stdin tells ffmpeg the stream is complete.
        drop(session.stdin.take());

        let status = session.child.wait();
        let stderr = session
            .stderr_drain
            .take()
            .and_then(|h| h.join().ok())
            .and_then(|r| r.ok())
            .unwrap_or_default();

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                let _ = fs::remove_file(&self.out_path);
                return Err(DepthsweepError::codec_write(format!(
                    "failed to wait for ffmpeg to finish: {e}"
                )));
            }
        };

        if !status.success() {
            // A truncated container is worse than no file at all.
            let _ = fs::remove_file(&self.out_path);
            let tail = String::from_utf8_lossy(&stderr);
            return Err(DepthsweepError::codec_write(format!(
                "ffmpeg exited with status {status}: {}",
                tail.trim()
            )));
        }

        tracing::debug!(
            out = %self.out_path.display(),
            frames = session.next,
            "finished ffmpeg encode session"
        );
        Ok(())
    }

    fn abort(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        drop(session.stdin.take());
        let _ = session.child.kill();
        let _ = session.child.wait();
        if let Some(handle) = session.stderr_drain.take() {
            let _ = handle.join();
        }
        // Partial output is worse than no output.
        let _ = fs::remove_file(&self.out_path);
        tracing::debug!(out = %self.out_path.display(), "aborted ffmpeg encode session");
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if self.session.is_some() {
            self.abort();
        }
    }
}

pub fn flatten_to_opaque_rgba8(
    dst: &mut [u8],
    src: &[u8],
    src_is_premul: bool,
    bg_rgba: [u8; 4],
) -> DepthsweepResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(DepthsweepError::validation(
            "flatten_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg_r = bg_rgba[0] as u16;
    let bg_g = bg_rgba[1] as u16;
    let bg_b = bg_rgba[2] as u16;

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = s[3] as u16;
        if a == 255 {
            d.copy_from_slice(s);
            d[3] = 255;
            continue;
        }

        let inv = 255u16 - a;

        let (r, g, b) = if src_is_premul {
            (
                s[0] as u16 + mul_div255(bg_r, inv),
                s[1] as u16 + mul_div255(bg_g, inv),
                s[2] as u16 + mul_div255(bg_b, inv),
            )
        } else {
            (
                mul_div255(s[0] as u16, a) + mul_div255(bg_r, inv),
                mul_div255(s[1] as u16, a) + mul_div255(bg_g, inv),
                mul_div255(s[2] as u16, a) + mul_div255(bg_b, inv),
            )
        };

        d[0] = r.min(255) as u8;
        d[1] = g.min(255) as u8;
        d[2] = b.min(255) as u8;
        d[3] = 255;
    }

    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Fps, Resolution};

    #[test]
    fn begin_rejects_odd_dimensions_before_spawning() {
        let mut enc = FfmpegEncoder::new("out/never_written.mp4", [0, 0, 0, 255]);
        let err = enc
            .begin(SessionConfig {
                resolution: Resolution::new(11, 10),
                fps: Fps::new(30, 1).unwrap(),
            })
            .unwrap_err();
        assert!(matches!(err, DepthsweepError::Validation(_)));

        let err = enc
            .begin(SessionConfig {
                resolution: Resolution::new(0, 10),
                fps: Fps::new(30, 1).unwrap(),
            })
            .unwrap_err();
        assert!(matches!(err, DepthsweepError::Validation(_)));
    }

    #[test]
    fn push_and_finish_without_begin_are_write_errors() {
        let mut enc = FfmpegEncoder::new("out/never_written.mp4", [0, 0, 0, 255]);
        let frame = FrameRgba::new_premultiplied(2, 2);
        assert!(matches!(
            enc.push_frame(FrameIndex(0), &frame).unwrap_err(),
            DepthsweepError::CodecWrite(_)
        ));
        assert!(matches!(
            enc.finish().unwrap_err(),
            DepthsweepError::CodecWrite(_)
        ));
    }

    #[test]
    fn flatten_premul_over_black_produces_expected_rgb() {
        // Premultiplied red @ 50% alpha => rgb is 128,0,0 when premul.
        let src = vec![128u8, 0u8, 0u8, 128u8];
        let mut dst = vec![0u8; 4];
        flatten_to_opaque_rgba8(&mut dst, &src, true, [0, 0, 0, 255]).unwrap();
        assert_eq!(dst, vec![128u8, 0u8, 0u8, 255u8]);
    }

    #[test]
    fn flatten_straight_over_black_produces_expected_rgb() {
        // Straight red @ 50% alpha => rgb becomes 128,0,0 over black.
        let src = vec![255u8, 0u8, 0u8, 128u8];
        let mut dst = vec![0u8; 4];
        flatten_to_opaque_rgba8(&mut dst, &src, false, [0, 0, 0, 255]).unwrap();
        assert_eq!(dst, vec![128u8, 0u8, 0u8, 255u8]);
    }

    #[test]
    fn flatten_over_white_lifts_transparent_pixels() {
        let src = vec![0u8, 0u8, 0u8, 0u8];
        let mut dst = vec![0u8; 4];
        flatten_to_opaque_rgba8(&mut dst, &src, true, [255, 255, 255, 255]).unwrap();
        assert_eq!(dst, vec![255u8, 255u8, 255u8, 255u8]);
    }
}

use std::path::PathBuf;

use crate::{
    error::{DepthsweepError, DepthsweepResult},
    parallax::{DepthMap, FrameRgba},
};

/// Where an input image comes from.
///
/// Closed set on purpose: every way of obtaining pixels is a named variant,
/// not an opaque callback handed in from outside.
#[derive(Clone, Debug)]
pub enum FrameSource {
    /// Read and decode a file on disk (PNG, JPEG, anything the `image`
    /// crate understands).
    FileUrl(PathBuf),
    /// Use an already-decoded image.
    InMemory(image::DynamicImage),
}

impl FrameSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::FileUrl(path.into())
    }

    /// Decode as the diffuse (color) input: RGBA8, premultiplied.
    pub fn load_diffuse(&self) -> DepthsweepResult<FrameRgba> {
        let img = self.decode()?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        let mut data = rgba.into_raw();
        premultiply_rgba8_in_place(&mut data);
        FrameRgba::from_premul_data(width, height, data)
    }

    /// Decode as the depth input: single channel, normalized to `[0, 1]`.
    /// Brighter means nearer (see [`DepthMap`] for the full contract).
    pub fn load_depth(&self) -> DepthsweepResult<DepthMap> {
        let img = self.decode()?;
        let luma = img.to_luma8();
        let (width, height) = luma.dimensions();
        DepthMap::from_luma8(width, height, &luma.into_raw())
    }

    fn decode(&self) -> DepthsweepResult<image::DynamicImage> {
        match self {
            Self::FileUrl(path) => {
                let bytes = std::fs::read(path)
                    .map_err(|e| DepthsweepError::filesystem(path.clone(), e))?;
                image::load_from_memory(&bytes).map_err(|e| {
                    DepthsweepError::frame_extraction(format!(
                        "failed to decode image '{}': {e}",
                        path.display()
                    ))
                })
            }
            Self::InMemory(img) => Ok(img.clone()),
        }
    }
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 255 {
            continue;
        }
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

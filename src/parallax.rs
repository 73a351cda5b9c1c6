use crate::{
    error::{DepthsweepError, DepthsweepResult},
    source::FrameSource,
};

/// One RGBA8 pixel buffer, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRgba {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    /// r,g,b already multiplied by a.
    pub premultiplied: bool,
}

impl FrameRgba {
    pub fn new_premultiplied(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; rgba_len(width, height)],
            premultiplied: true,
        }
    }

    pub fn from_premul_data(width: u32, height: u32, data: Vec<u8>) -> DepthsweepResult<Self> {
        if width == 0 || height == 0 {
            return Err(DepthsweepError::validation(
                "FrameRgba width/height must be non-zero",
            ));
        }
        if data.len() != rgba_len(width, height) {
            return Err(DepthsweepError::validation(
                "FrameRgba data must be width*height*4 bytes",
            ));
        }
        Ok(Self {
            width,
            height,
            data,
            premultiplied: true,
        })
    }

    /// Bilinear tap at pixel-space coordinates, clamped to the image rect.
    ///
    /// Sampling outside the rect returns the nearest edge pixel, which is the
    /// fill rule for regions no source pixel maps onto.
    pub fn sample_bilinear_px(&self, x: f32, y: f32) -> [u8; 4] {
        let (x0, x1, fx) = bilinear_taps(x, self.width);
        let (y0, y1, fy) = bilinear_taps(y, self.height);
        let w = self.width as usize;

        let idx = |px: usize, py: usize| (py * w + px) * 4;
        let p00 = &self.data[idx(x0, y0)..idx(x0, y0) + 4];
        let p10 = &self.data[idx(x1, y0)..idx(x1, y0) + 4];
        let p01 = &self.data[idx(x0, y1)..idx(x0, y1) + 4];
        let p11 = &self.data[idx(x1, y1)..idx(x1, y1) + 4];

        let mut out = [0u8; 4];
        for c in 0..4 {
            let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
            let bot = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
            out[c] = (top * (1.0 - fy) + bot * fy + 0.5) as u8;
        }
        out
    }
}

fn rgba_len(width: u32, height: u32) -> usize {
    (width as usize) * (height as usize) * 4
}

/// Single-channel depth plane, normalized to `[0, 1]`.
///
/// Convention (hard contract): `1.0` is near/foreground, `0.0` is
/// far/background. Parallax displacement scales with `1 - depth`, so the
/// foreground stays anchored while the background sweeps. Out-of-range or
/// non-finite input values are clamped at construction, never rejected.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthMap {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl DepthMap {
    pub fn new(width: u32, height: u32, mut values: Vec<f32>) -> DepthsweepResult<Self> {
        if width == 0 || height == 0 {
            return Err(DepthsweepError::validation(
                "DepthMap width/height must be non-zero",
            ));
        }
        if values.len() != (width as usize) * (height as usize) {
            return Err(DepthsweepError::validation(
                "DepthMap values must be width*height entries",
            ));
        }
        for v in &mut values {
            *v = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    pub fn from_luma8(width: u32, height: u32, luma: &[u8]) -> DepthsweepResult<Self> {
        if luma.len() != (width as usize) * (height as usize) {
            return Err(DepthsweepError::validation(
                "DepthMap luma must be width*height bytes",
            ));
        }
        let values = luma.iter().map(|&v| f32::from(v) / 255.0).collect();
        Self::new(width, height, values)
    }

    pub fn uniform(width: u32, height: u32, value: f32) -> Self {
        let value = if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            width,
            height,
            values: vec![value; (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bilinear tap at pixel-space coordinates, clamped to the plane rect.
    pub fn sample_bilinear_px(&self, x: f32, y: f32) -> f32 {
        let (x0, x1, fx) = bilinear_taps(x, self.width);
        let (y0, y1, fy) = bilinear_taps(y, self.height);
        let w = self.width as usize;

        let v00 = self.values[y0 * w + x0];
        let v10 = self.values[y0 * w + x1];
        let v01 = self.values[y1 * w + x0];
        let v11 = self.values[y1 * w + x1];

        let top = v00 * (1.0 - fx) + v10 * fx;
        let bot = v01 * (1.0 - fx) + v11 * fx;
        top * (1.0 - fy) + bot * fy
    }
}

/// Resolve a continuous coordinate to two taps and an interpolation weight,
/// clamping both taps into `[0, size)`.
fn bilinear_taps(coord: f32, size: u32) -> (usize, usize, f32) {
    let max = (size - 1) as f32;
    let c = coord.clamp(0.0, max);
    let i0 = c.floor();
    let frac = c - i0;
    let i0 = i0 as usize;
    let i1 = (i0 + 1).min(size as usize - 1);
    (i0, i1, frac)
}

/// Immutable diffuse + depth pair with matching pixel dimensions.
///
/// Built once per export and read-only afterward; the dimension invariant is
/// checked here so the renderer never sees mismatched inputs.
#[derive(Clone, Debug)]
pub struct ParallaxImage {
    diffuse: FrameRgba,
    depth: DepthMap,
}

impl ParallaxImage {
    pub fn new(diffuse: FrameRgba, depth: DepthMap) -> DepthsweepResult<Self> {
        if diffuse.width != depth.width || diffuse.height != depth.height {
            return Err(DepthsweepError::DimensionMismatch {
                diffuse_width: diffuse.width,
                diffuse_height: diffuse.height,
                depth_width: depth.width,
                depth_height: depth.height,
            });
        }
        Ok(Self { diffuse, depth })
    }

    /// Decode both inputs and pair them up.
    pub fn from_sources(diffuse: &FrameSource, depth: &FrameSource) -> DepthsweepResult<Self> {
        Self::new(diffuse.load_diffuse()?, depth.load_depth()?)
    }

    pub fn diffuse(&self) -> &FrameRgba {
        &self.diffuse
    }

    pub fn depth(&self) -> &DepthMap {
        &self.depth
    }

    pub fn width(&self) -> u32 {
        self.diffuse.width
    }

    pub fn height(&self) -> u32 {
        self.diffuse.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, px: [u8; 4]) -> FrameRgba {
        FrameRgba::from_premul_data(width, height, px.repeat((width * height) as usize)).unwrap()
    }

    #[test]
    fn mismatched_dimensions_are_rejected_with_both_sizes() {
        let diffuse = solid_frame(100, 100, [1, 2, 3, 255]);
        let depth = DepthMap::uniform(50, 50, 0.5);
        let err = ParallaxImage::new(diffuse, depth).unwrap_err();
        match err {
            DepthsweepError::DimensionMismatch {
                diffuse_width: 100,
                diffuse_height: 100,
                depth_width: 50,
                depth_height: 50,
            } => {}
            other => panic!("expected DimensionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn depth_values_are_clamped_not_rejected() {
        let d = DepthMap::new(2, 1, vec![-0.5, 3.0]).unwrap();
        assert_eq!(d.sample_bilinear_px(0.0, 0.0), 0.0);
        assert_eq!(d.sample_bilinear_px(1.0, 0.0), 1.0);

        let d = DepthMap::new(2, 1, vec![f32::NAN, f32::INFINITY]).unwrap();
        assert_eq!(d.sample_bilinear_px(0.0, 0.0), 0.0);
        assert_eq!(d.sample_bilinear_px(1.0, 0.0), 1.0);
    }

    #[test]
    fn bilinear_at_pixel_centers_returns_exact_pixels() {
        let mut data = vec![0u8; 2 * 2 * 4];
        data[0..4].copy_from_slice(&[10, 20, 30, 255]);
        data[4..8].copy_from_slice(&[50, 60, 70, 255]);
        data[8..12].copy_from_slice(&[90, 100, 110, 255]);
        data[12..16].copy_from_slice(&[130, 140, 150, 255]);
        let f = FrameRgba::from_premul_data(2, 2, data).unwrap();

        assert_eq!(f.sample_bilinear_px(0.0, 0.0), [10, 20, 30, 255]);
        assert_eq!(f.sample_bilinear_px(1.0, 0.0), [50, 60, 70, 255]);
        assert_eq!(f.sample_bilinear_px(0.0, 1.0), [90, 100, 110, 255]);
        assert_eq!(f.sample_bilinear_px(1.0, 1.0), [130, 140, 150, 255]);
    }

    #[test]
    fn sampling_outside_rect_clamps_to_edge() {
        let f = solid_frame(3, 2, [7, 8, 9, 255]);
        assert_eq!(f.sample_bilinear_px(-10.0, -10.0), [7, 8, 9, 255]);
        assert_eq!(f.sample_bilinear_px(100.0, 100.0), [7, 8, 9, 255]);

        let d = DepthMap::from_luma8(2, 2, &[0, 255, 0, 255]).unwrap();
        assert_eq!(d.sample_bilinear_px(-5.0, 0.0), 0.0);
        assert_eq!(d.sample_bilinear_px(5.0, 0.0), 1.0);
    }

    #[test]
    fn bilinear_midpoint_interpolates() {
        let d = DepthMap::from_luma8(2, 1, &[0, 255]).unwrap();
        let mid = d.sample_bilinear_px(0.5, 0.0);
        assert!((mid - 0.5).abs() < 1e-3);
    }
}

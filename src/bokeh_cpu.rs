use rayon::prelude::*;

use crate::error::{DepthsweepError, DepthsweepResult};

/// Depth-of-field pass: blur each pixel with its own radius.
///
/// `radii` holds one blur radius per pixel, in pixels. Radius 0 copies the
/// pixel through. Each blurred pixel is a normalized gaussian-weighted
/// window gather with clamp-to-edge addressing, computed in Q16 fixed point
/// so results are reproducible bit-for-bit. Per-pixel radii rule out a
/// separable two-pass blur; the window gather is the defined policy.
pub(crate) fn depth_of_field(
    src: &[u8],
    radii: &[u8],
    width: u32,
    height: u32,
) -> DepthsweepResult<Vec<u8>> {
    let pixels = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| DepthsweepError::validation("depth of field buffer size overflow"))?;
    if src.len() != pixels * 4 {
        return Err(DepthsweepError::validation(
            "depth_of_field expects src matching width*height*4",
        ));
    }
    if radii.len() != pixels {
        return Err(DepthsweepError::validation(
            "depth_of_field expects one radius per pixel",
        ));
    }

    let max_radius = radii.iter().copied().max().unwrap_or(0);
    if max_radius == 0 {
        return Ok(src.to_vec());
    }

    // One kernel per radius in use; kernel r sums to exactly 1<<16.
    let kernels: Vec<Vec<u32>> = (0..=u32::from(max_radius))
        .map(gaussian_kernel_q16)
        .collect();

    let w = width as i32;
    let h = height as i32;
    let mut out = vec![0u8; src.len()];

    out.par_chunks_mut(width as usize * 4)
        .enumerate()
        .for_each(|(y, out_row)| {
            let y = y as i32;
            for x in 0..w {
                let r = radii[(y * w + x) as usize];
                let out_idx = (x as usize) * 4;
                if r == 0 {
                    let src_idx = ((y * w + x) as usize) * 4;
                    out_row[out_idx..out_idx + 4].copy_from_slice(&src[src_idx..src_idx + 4]);
                    continue;
                }

                let k = &kernels[r as usize];
                let radius = i32::from(r);
                let mut acc = [0u64; 4];
                for (kj, &kwy) in k.iter().enumerate() {
                    let sy = (y + kj as i32 - radius).clamp(0, h - 1);
                    for (ki, &kwx) in k.iter().enumerate() {
                        let sx = (x + ki as i32 - radius).clamp(0, w - 1);
                        let weight = u64::from(kwy) * u64::from(kwx);
                        let idx = ((sy * w + sx) as usize) * 4;
                        for c in 0..4 {
                            acc[c] += weight * u64::from(src[idx + c]);
                        }
                    }
                }
                for c in 0..4 {
                    out_row[out_idx + c] = q32_to_u8(acc[c]);
                }
            }
        });

    Ok(out)
}

/// Gaussian kernel of length `2*radius + 1` in Q16, summing to exactly
/// 1<<16. Sigma follows the radius (`radius / 2`, floor 0.5) so the window
/// tails stay meaningful at every size.
fn gaussian_kernel_q16(radius: u32) -> Vec<u32> {
    if radius == 0 {
        return vec![1 << 16];
    }

    let sigma = (radius as f64 / 2.0).max(0.5);
    let r = radius as i32;
    let denom = 2.0 * sigma * sigma;
    let mut weights_f = Vec::<f64>::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    for i in -r..=r {
        let x = i as f64;
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }

    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = ((wf / sum) * 65536.0).round() as i64;
        let q = q.clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }

    // Push the rounding residue into the center tap so the sum is exact.
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        let new_mid = (i64::from(weights[mid]) + delta).clamp(0, 65536);
        weights[mid] = new_mid as u32;
    }

    weights
}

fn q32_to_u8(acc: u64) -> u8 {
    let v = (acc + (1 << 31)) >> 32;
    v.min(255) as u8
}

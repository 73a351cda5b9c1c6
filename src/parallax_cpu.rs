use rayon::prelude::*;

use crate::{
    config::AnimationConfig,
    core::{CameraOffset, Resolution},
    parallax::ParallaxImage,
};

/// Parallax reprojection pass.
///
/// Gathers each output pixel from the diffuse image at a coordinate
/// displaced by `(1 - depth) * offset`, scaled to source pixels. Sampling is
/// clamped to the source rect, so disoccluded regions replicate the nearest
/// edge pixel. Also emits the per-pixel depth-of-field radius plane used by
/// the bokeh pass (all zeros when the config keeps everything in focus).
///
/// Rows are computed in parallel; each row writes only its own output, so
/// the result does not depend on scheduling.
pub(crate) fn reproject(
    image: &ParallaxImage,
    offset: CameraOffset,
    anim: &AnimationConfig,
    resolution: Resolution,
) -> (Vec<u8>, Vec<u8>) {
    let diffuse = image.diffuse();
    let depth = image.depth();

    let out_w = resolution.width as usize;
    let out_h = resolution.height as usize;
    let sx = image.width() as f32 / resolution.width as f32;
    let sy = image.height() as f32 / resolution.height as f32;

    // Displacement at depth 0 (far plane), in source pixels.
    let disp_x = (offset.dx * f64::from(image.width())) as f32;
    let disp_y = (offset.dy * f64::from(image.height())) as f32;

    let focal_point = anim.focal_point as f32;
    let focal_range = anim.focal_range as f32;
    let bokeh_radius = anim.bokeh_radius as f32;
    let bokeh_enabled = bokeh_radius > 0.0;

    let mut rgba = vec![0u8; out_w * out_h * 4];
    let mut radii = vec![0u8; out_w * out_h];

    rgba.par_chunks_mut(out_w * 4)
        .zip(radii.par_chunks_mut(out_w))
        .enumerate()
        .for_each(|(y, (rgba_row, radii_row))| {
            let by = (y as f32 + 0.5) * sy - 0.5;
            for x in 0..out_w {
                let bx = (x as f32 + 0.5) * sx - 0.5;

                let d = depth.sample_bilinear_px(bx, by);
                let k = 1.0 - d;
                let px = bx + k * disp_x;
                let py = by + k * disp_y;

                let sample = diffuse.sample_bilinear_px(px, py);
                rgba_row[x * 4..x * 4 + 4].copy_from_slice(&sample);

                if bokeh_enabled {
                    // Blur follows the depth of the content shown here, not
                    // the depth of the output location.
                    let dc = depth.sample_bilinear_px(px, py);
                    let excess = ((dc - focal_point).abs() - focal_range).max(0.0);
                    radii_row[x] = (excess.min(1.0) * bokeh_radius).round() as u8;
                }
            }
        });

    (rgba, radii)
}

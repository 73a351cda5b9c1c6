use crate::{
    bokeh_cpu,
    config::AnimationConfig,
    core::{CameraOffset, Resolution},
    error::{DepthsweepError, DepthsweepResult},
    parallax::{FrameRgba, ParallaxImage},
    parallax_cpu,
};

/// Render one parallax frame at the requested output resolution.
///
/// Pure function of its inputs: no shared state, byte-identical output for
/// identical inputs, safe to call from any thread. The output resolution is
/// independent of the source resolution; sources are sampled through
/// continuous coordinates, and `offset.dx`/`offset.dy` are fractions of the
/// source width/height respectively.
///
/// Two passes: parallax reprojection (with nearest-edge fill for disoccluded
/// regions), then depth-of-field when the config enables it.
pub fn render_frame(
    image: &ParallaxImage,
    offset: CameraOffset,
    anim: &AnimationConfig,
    resolution: Resolution,
) -> DepthsweepResult<FrameRgba> {
    anim.validate()?;
    if resolution.width == 0 || resolution.height == 0 {
        return Err(DepthsweepError::validation(
            "render resolution must be non-zero",
        ));
    }

    let (rgba, blur_radii) = parallax_cpu::reproject(image, offset, anim, resolution);

    let data = if blur_radii.iter().any(|&r| r != 0) {
        bokeh_cpu::depth_of_field(&rgba, &blur_radii, resolution.width, resolution.height)?
    } else {
        rgba
    };

    Ok(FrameRgba {
        width: resolution.width,
        height: resolution.height,
        data,
        premultiplied: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallax::DepthMap;

    fn gradient_image(width: u32, height: u32) -> ParallaxImage {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[
                    (x * 7 % 256) as u8,
                    (y * 13 % 256) as u8,
                    ((x + y) * 5 % 256) as u8,
                    255,
                ]);
            }
        }
        let diffuse = FrameRgba::from_premul_data(width, height, data).unwrap();
        let mut depth = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                depth.push(((x + y) % 256) as u8);
            }
        }
        let depth = DepthMap::from_luma8(width, height, &depth).unwrap();
        ParallaxImage::new(diffuse, depth).unwrap()
    }

    #[test]
    fn zero_offset_same_resolution_is_identity() {
        let image = gradient_image(16, 12);
        let frame = render_frame(
            &image,
            CameraOffset::ZERO,
            &AnimationConfig::default(),
            Resolution::new(16, 12),
        )
        .unwrap();
        assert_eq!(frame.data, image.diffuse().data);
    }

    #[test]
    fn rendering_twice_is_byte_identical() {
        let image = gradient_image(24, 18);
        let offset = CameraOffset {
            dx: 0.03,
            dy: -0.02,
            t: 0.4,
        };
        let anim = AnimationConfig {
            focal_range: 0.1,
            bokeh_radius: 4.0,
            ..AnimationConfig::default()
        };
        let res = Resolution::new(32, 20);

        let a = render_frame(&image, offset, &anim, res).unwrap();
        let b = render_frame(&image, offset, &anim, res).unwrap();
        assert_eq!(a.data, b.data);
        assert_eq!(a.width, 32);
        assert_eq!(a.height, 20);
    }

    #[test]
    fn output_resolution_is_decoupled_from_source() {
        let image = gradient_image(64, 48);
        for (w, h) in [(64, 48), (32, 24), (128, 96), (20, 50)] {
            let frame = render_frame(
                &image,
                CameraOffset::ZERO,
                &AnimationConfig::default(),
                Resolution::new(w, h),
            )
            .unwrap();
            assert_eq!(frame.width, w);
            assert_eq!(frame.height, h);
            assert_eq!(frame.data.len(), (w * h * 4) as usize);
        }
    }

    #[test]
    fn invalid_anim_or_resolution_is_rejected() {
        let image = gradient_image(8, 8);
        let bad_anim = AnimationConfig {
            intensity: -1.0,
            ..AnimationConfig::default()
        };
        assert!(
            render_frame(
                &image,
                CameraOffset::ZERO,
                &bad_anim,
                Resolution::new(8, 8)
            )
            .is_err()
        );
        assert!(
            render_frame(
                &image,
                CameraOffset::ZERO,
                &AnimationConfig::default(),
                Resolution::new(0, 8)
            )
            .is_err()
        );
    }
}

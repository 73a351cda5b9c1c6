use depthsweep::{
    AnimationConfig, CameraOffset, DepthMap, DepthsweepError, FrameRgba, ParallaxImage, Resolution,
    render_frame,
};

fn solid_columns(width: u32, height: u32, left: [u8; 4], right: [u8; 4]) -> FrameRgba {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..height {
        for x in 0..width {
            let px = if x < width / 2 { left } else { right };
            data.extend_from_slice(&px);
        }
    }
    FrameRgba::from_premul_data(width, height, data).unwrap()
}

fn ramp_image(width: u32, height: u32) -> ParallaxImage {
    let mut rgba = Vec::with_capacity((width * height * 4) as usize);
    let mut depth = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let v = ((x * 7 + y * 13) % 256) as u8;
            rgba.extend_from_slice(&[v, v.wrapping_add(40), v.wrapping_add(90), 255]);
            depth.push(x as f32 / (width - 1).max(1) as f32);
        }
    }
    ParallaxImage::new(
        FrameRgba::from_premul_data(width, height, rgba).unwrap(),
        DepthMap::new(width, height, depth).unwrap(),
    )
    .unwrap()
}

#[test]
fn mismatched_depth_dimensions_are_rejected() {
    let diffuse = FrameRgba::new_premultiplied(100, 100);
    let depth = DepthMap::uniform(50, 50, 0.5);

    let err = ParallaxImage::new(diffuse, depth).unwrap_err();
    match err {
        DepthsweepError::DimensionMismatch {
            diffuse_width,
            diffuse_height,
            depth_width,
            depth_height,
        } => {
            assert_eq!((diffuse_width, diffuse_height), (100, 100));
            assert_eq!((depth_width, depth_height), (50, 50));
        }
        other => panic!("expected DimensionMismatch, got {other:?}"),
    }
}

#[test]
fn near_depth_is_anchored_for_any_offset() {
    // Depth 1.0 means the content sits on the camera plane and never moves.
    let diffuse = solid_columns(8, 4, [200, 10, 10, 255], [10, 10, 200, 255]);
    let image = ParallaxImage::new(diffuse, DepthMap::uniform(8, 4, 1.0)).unwrap();
    let anim = AnimationConfig::default();

    let expected = image.diffuse().data.clone();
    for offset in [
        CameraOffset::ZERO,
        CameraOffset {
            dx: 0.5,
            dy: 0.0,
            t: 0.25,
        },
        CameraOffset {
            dx: -0.3,
            dy: 0.4,
            t: 0.7,
        },
    ] {
        let frame = render_frame(&image, offset, &anim, Resolution::new(8, 4)).unwrap();
        assert_eq!(frame.data, expected);
    }
}

#[test]
fn far_depth_shifts_content_by_the_full_offset() {
    // Left half red, right half blue, everything at the far plane.
    let diffuse = solid_columns(8, 2, [200, 10, 10, 255], [10, 10, 200, 255]);
    let image = ParallaxImage::new(diffuse, DepthMap::uniform(8, 2, 0.0)).unwrap();
    let anim = AnimationConfig::default();

    // dx of half the width moves the sampling window 4 pixels right, so
    // the first output pixel lands in the blue half.
    let offset = CameraOffset {
        dx: 0.5,
        dy: 0.0,
        t: 0.25,
    };
    let frame = render_frame(&image, offset, &anim, Resolution::new(8, 2)).unwrap();
    assert_eq!(&frame.data[0..4], &[10, 10, 200, 255]);

    // Negative dx looks the other way; the last pixel turns red.
    let offset = CameraOffset {
        dx: -0.5,
        dy: 0.0,
        t: 0.75,
    };
    let frame = render_frame(&image, offset, &anim, Resolution::new(8, 2)).unwrap();
    let last = frame.data.len() - 4;
    assert_eq!(&frame.data[last..], &[200, 10, 10, 255]);
}

#[test]
fn disocclusion_replicates_the_nearest_edge() {
    let diffuse = solid_columns(4, 2, [200, 10, 10, 255], [10, 10, 200, 255]);
    let image = ParallaxImage::new(diffuse, DepthMap::uniform(4, 2, 0.0)).unwrap();
    let anim = AnimationConfig::default();

    // An offset far past the image width drags every sample off the right
    // edge; the edge column fills the whole frame deterministically.
    let offset = CameraOffset {
        dx: 10.0,
        dy: 0.0,
        t: 0.25,
    };
    let frame = render_frame(&image, offset, &anim, Resolution::new(4, 2)).unwrap();
    for px in frame.data.chunks_exact(4) {
        assert_eq!(px, &[10, 10, 200, 255]);
    }
}

#[test]
fn rendering_is_deterministic_with_blur_enabled() {
    let image = ramp_image(24, 16);
    let anim = AnimationConfig {
        focal_point: 0.5,
        focal_range: 0.05,
        bokeh_radius: 6.0,
        ..AnimationConfig::default()
    };
    let offset = CameraOffset {
        dx: 0.03,
        dy: -0.02,
        t: 0.6,
    };

    let a = render_frame(&image, offset, &anim, Resolution::new(24, 16)).unwrap();
    let b = render_frame(&image, offset, &anim, Resolution::new(24, 16)).unwrap();
    assert_eq!(a.data, b.data);
}

#[test]
fn output_resolution_is_independent_of_source_resolution() {
    let image = ramp_image(64, 64);
    let anim = AnimationConfig::default();
    let offset = CameraOffset {
        dx: 0.02,
        dy: 0.01,
        t: 0.1,
    };

    let small = render_frame(&image, offset, &anim, Resolution::new(30, 20)).unwrap();
    assert_eq!(small.width, 30);
    assert_eq!(small.height, 20);
    assert_eq!(small.data.len(), 30 * 20 * 4);

    let large = render_frame(&image, offset, &anim, Resolution::new(100, 80)).unwrap();
    assert_eq!(large.data.len(), 100 * 80 * 4);
}

#[test]
fn opaque_input_stays_opaque_through_blur() {
    let image = ramp_image(16, 16);
    let anim = AnimationConfig {
        focal_point: 1.0,
        focal_range: 0.1,
        bokeh_radius: 8.0,
        ..AnimationConfig::default()
    };
    let offset = CameraOffset {
        dx: 0.05,
        dy: 0.0,
        t: 0.25,
    };

    let frame = render_frame(&image, offset, &anim, Resolution::new(16, 16)).unwrap();
    assert!(frame.premultiplied);
    for px in frame.data.chunks_exact(4) {
        assert_eq!(px[3], 255);
    }
}

use image::{Rgba, RgbaImage};

use mural::blur::{Blurrer, MAX_SUPPORTED_BLUR_PIXELS, scale_exact};

fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x * 13 % 256) as u8,
            (y * 23 % 256) as u8,
            ((x ^ y) * 5 % 256) as u8,
            255,
        ])
    })
}

#[test]
fn blur_at_zero_is_pixel_identical() {
    let img = gradient(32, 24);
    let mut blurrer = Blurrer::new(&img);
    let out = blurrer.blur(0.0, 0.0);
    assert_eq!(out, img);
}

#[test]
fn blur_smooths_a_step_edge() {
    // Left half black, right half white; after blurring, the edge column
    // must sit strictly between the extremes.
    let img = RgbaImage::from_fn(40, 20, |x, _| {
        if x < 20 {
            Rgba([0, 0, 0, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    });
    let mut blurrer = Blurrer::new(&img);
    let out = blurrer.blur(8.0, 0.0);
    let edge = out.get_pixel(20, 10).0[0];
    assert!(edge > 20 && edge < 235, "edge not smoothed: {edge}");
    // Far away from the edge the halves keep their tone.
    assert!(out.get_pixel(2, 10).0[0] < 30);
    assert!(out.get_pixel(38, 10).0[0] > 225);
}

#[test]
fn full_desaturation_equals_luma_of_blurred_pixels() {
    let img = gradient(32, 24);
    // Same radius twice: once plain, once fully desaturated.
    let plain = Blurrer::new(&img).blur(4.0, 0.0);
    let grey = Blurrer::new(&img).blur(4.0, 1.0);
    for (p, g) in plain.pixels().zip(grey.pixels()) {
        let luma =
            0.299 * p.0[0] as f32 + 0.587 * p.0[1] as f32 + 0.114 * p.0[2] as f32;
        assert_eq!(g.0[0], g.0[1]);
        assert_eq!(g.0[1], g.0[2]);
        assert!(
            (g.0[0] as f32 - luma).abs() <= 1.0,
            "channel {} vs luma {luma}",
            g.0[0]
        );
    }
}

#[test]
fn partial_desaturation_moves_toward_grey_without_reaching_it() {
    let img = gradient(32, 24);
    let plain = Blurrer::new(&img).blur(4.0, 0.0);
    let half = Blurrer::new(&img).blur(4.0, 0.5);
    let mut any_color_left = false;
    for (p, h) in plain.pixels().zip(half.pixels()) {
        let spread_before = p.0[0].abs_diff(p.0[1]).max(p.0[1].abs_diff(p.0[2]));
        let spread_after = h.0[0].abs_diff(h.0[1]).max(h.0[1].abs_diff(h.0[2]));
        assert!(spread_after <= spread_before + 1);
        if spread_after > 2 {
            any_color_left = true;
        }
    }
    assert!(any_color_left, "half desaturation flattened all color");
}

#[test]
fn radius_at_the_supported_maximum_works() {
    let img = gradient(64, 48);
    let mut blurrer = Blurrer::new(&img);
    let out = blurrer.blur(MAX_SUPPORTED_BLUR_PIXELS as f32, 0.3);
    assert_eq!(out.dimensions(), img.dimensions());
}

#[test]
fn prescale_produces_backend_friendly_dimensions() {
    let img = gradient(333, 191);
    // The blur source is snapped to an even height and mult-of-4 width.
    let out = scale_exact(&img, 188, 108).unwrap();
    assert_eq!(out.dimensions(), (188, 108));
    assert_eq!(out.width() % 4, 0);
    assert_eq!(out.height() % 2, 0);
}

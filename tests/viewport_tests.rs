//! Pan/zoom viewport properties.

use mural::render::picture_set::pan_viewport;
use mural::render::viewport::default_viewport;

const SCREEN: f32 = 16.0 / 9.0;

#[test]
fn image_always_at_least_covers_the_screen_width() {
    // Across a spread of artwork aspects, the visible horizontal span
    // never exceeds the picture, i.e. no bars appear at the sides.
    for bitmap_aspect in [0.4f32, 0.75, 1.0, SCREEN, 2.5, 4.0] {
        for offset in [0.0f32, 0.25, 0.5, 1.0] {
            let vp = pan_viewport(SCREEN, bitmap_aspect, offset).unwrap();
            assert!(vp.left >= -1.0 - 1e-4, "aspect {bitmap_aspect} offset {offset}");
            assert!(vp.right <= 1.0 + 1e-4, "aspect {bitmap_aspect} offset {offset}");
            assert!(vp.right > vp.left);
        }
    }
}

#[test]
fn zoom_keeps_vertical_extent_centered_and_clipped() {
    for bitmap_aspect in [0.5f32, 1.0, 3.0] {
        let vp = pan_viewport(SCREEN, bitmap_aspect, 0.5).unwrap();
        assert!((vp.top + vp.bottom).abs() < 1e-5, "not vertically centered");
        assert!(vp.top <= 1.0 && vp.top > 0.0);
    }
}

#[test]
fn narrow_artwork_still_gets_parallax_headroom() {
    // The 1.15x over-zoom guarantees some pan range even when the artwork
    // is exactly screen-shaped.
    let at_zero = pan_viewport(SCREEN, SCREEN, 0.0).unwrap();
    let at_one = pan_viewport(SCREEN, SCREEN, 1.0).unwrap();
    assert!(at_one.left > at_zero.left + 1e-4);
}

#[test]
fn pan_is_linear_between_its_extremes() {
    let lo = pan_viewport(SCREEN, 4.0, 0.0).unwrap();
    let mid = pan_viewport(SCREEN, 4.0, 0.5).unwrap();
    let hi = pan_viewport(SCREEN, 4.0, 1.0).unwrap();
    let expected_mid = (lo.left + hi.left) / 2.0;
    assert!((mid.left - expected_mid).abs() < 1e-4);
    // Width of the visible span is offset-independent.
    assert!(((hi.right - hi.left) - (lo.right - lo.left)).abs() < 1e-5);
}

#[test]
fn pan_range_is_capped_for_very_wide_artwork() {
    // An extremely wide panorama pans at most 1.8 screen widths, not its
    // whole width.
    let vp0 = pan_viewport(SCREEN, 20.0, 0.0).unwrap();
    let vp1 = pan_viewport(SCREEN, 20.0, 1.0).unwrap();
    let span = vp0.right - vp0.left;
    let travel = vp1.left - vp0.left;
    // Travel in units of visible spans: at most 1.8 - 1 spans of motion
    // (panning one screen width moves the left edge by one span).
    assert!(travel <= span * 0.8 + 1e-4, "travel {travel} vs span {span}");
    assert!(travel > 0.0);
}

#[test]
fn default_detail_viewport_matches_fit() {
    // Wider than the screen: full height, horizontally centered.
    let rect = default_viewport(3.0, SCREEN);
    assert_eq!((rect.top, rect.bottom), (0.0, 1.0));
    assert!((rect.left + rect.right - 1.0).abs() < 1e-6);
    // Taller than the screen: full width, vertically centered.
    let rect = default_viewport(0.8, SCREEN);
    assert_eq!((rect.left, rect.right), (0.0, 1.0));
    assert!((rect.top + rect.bottom - 1.0).abs() < 1e-6);
}

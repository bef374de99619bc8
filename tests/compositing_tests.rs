//! Properties of the keyframe alpha recomposition and the dim derivation.

use mural::render::picture_set::{dim_amount_for_darkness, recompose_alpha};

/// Reference compositing: blend `lo` over `dst`, `hi` over that, where the
/// lo/hi pair was first composed internally and then faded by `global`.
fn reference(dst: f32, lo: f32, hi: f32, global: f32, local_hi: f32) -> f32 {
    let inner = lo * (1.0 - local_hi) + hi * local_hi;
    dst * (1.0 - global) + inner * global
}

/// What the renderer actually does: two back-to-front draws with the
/// recomposed alpha pair, no intermediate buffer.
fn recomposed(dst: f32, lo: f32, hi: f32, global: f32, local_hi: f32) -> f32 {
    let (new_lo, new_hi) = recompose_alpha(global, local_hi);
    let after_lo = dst * (1.0 - new_lo) + lo * new_lo;
    after_lo * (1.0 - new_hi) + hi * new_hi
}

#[test]
fn recomposition_matches_nested_blending_over_the_unit_grid() {
    // Dense grid over global x local_hi, several color triples.
    let colors = [
        (0.0f32, 1.0f32, 0.5f32),
        (0.3, 0.9, 0.2),
        (1.0, 0.0, 0.7),
        (0.5, 0.5, 0.5),
    ];
    for g_step in 0..100 {
        for l_step in 0..=100 {
            let global = g_step as f32 / 100.0;
            let local_hi = l_step as f32 / 100.0;
            for (dst, lo, hi) in colors {
                let want = reference(dst, lo, hi, global, local_hi);
                let got = recomposed(dst, lo, hi, global, local_hi);
                assert!(
                    (want - got).abs() < 1e-4,
                    "g={global} l={local_hi} dst={dst}: {want} vs {got}"
                );
            }
        }
    }
}

#[test]
fn zero_global_alpha_contributes_nothing() {
    for l_step in 0..=10 {
        let local_hi = l_step as f32 / 10.0;
        let (new_lo, new_hi) = recompose_alpha(0.0, local_hi);
        assert_eq!(new_lo, 0.0);
        assert_eq!(new_hi, 0.0);
        // The destination is untouched.
        assert!((recomposed(0.42, 1.0, 1.0, 0.0, local_hi) - 0.42).abs() < 1e-6);
    }
}

#[test]
fn recomposed_alphas_stay_in_range() {
    for g_step in 0..=100 {
        for l_step in 0..=100 {
            let global = g_step as f32 / 100.0;
            let local_hi = l_step as f32 / 100.0;
            let (new_lo, new_hi) = recompose_alpha(global, local_hi);
            assert!((0.0..=1.0).contains(&new_lo), "lo={new_lo} g={global} l={local_hi}");
            assert!((0.0..=1.0).contains(&new_hi), "hi={new_hi} g={global} l={local_hi}");
        }
    }
}

#[test]
fn dim_amount_is_monotone_and_spans_half_to_full() {
    for max_dim in [64u32, 128, 255] {
        let mut prev = 0;
        for step in 0..=1000 {
            let dim = dim_amount_for_darkness(max_dim, step as f32 / 1000.0);
            assert!(dim >= prev, "max_dim {max_dim} step {step}");
            prev = dim;
        }
        let expected_floor = (max_dim as f32 * 0.5).round() as u32;
        assert_eq!(dim_amount_for_darkness(max_dim, 0.0), expected_floor);
        assert_eq!(dim_amount_for_darkness(max_dim, 1.0), max_dim);
    }
}

#[test]
fn darker_artwork_never_gets_more_dim_than_brighter() {
    let dark = dim_amount_for_darkness(128, 0.1);
    let bright = dim_amount_for_darkness(128, 0.9);
    assert!(dark < bright);
}

//! Small numeric helpers shared across the rendering pipeline.

use std::f32::consts::PI;

#[inline]
pub fn interpolate(from: f32, to: f32, fraction: f32) -> f32 {
    from + (to - from) * fraction
}

/// Inverse of [`interpolate`]: where does `value` sit between `from` and `to`?
#[inline]
pub fn uninterpolate(from: f32, to: f32, value: f32) -> f32 {
    debug_assert!((to - from).abs() > f32::EPSILON, "degenerate range");
    (value - from) / (to - from)
}

/// Accelerate/decelerate easing: slow start, fast middle, slow end.
#[inline]
pub fn ease_in_out(t: f32) -> f32 {
    ((t + 1.0) * PI).cos() / 2.0 + 0.5
}

/// Largest even number that is `<= value`.
#[inline]
pub const fn floor_even(value: u32) -> u32 {
    value & !1
}

/// Nearest multiple of four (rounding half up).
#[inline]
pub const fn round_mult4(value: u32) -> u32 {
    (value + 2) & !3
}

/// Smallest power-of-two subsampling factor such that `raw / factor` does
/// not exceed `target`.
pub fn sample_size(raw: u32, target: u32) -> u32 {
    let mut factor = 1;
    while target > 0 && raw / factor > target {
        factor <<= 1;
    }
    factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ease_hits_endpoints_and_midpoint() {
        assert!(ease_in_out(0.0).abs() < 1e-6);
        assert!((ease_in_out(1.0) - 1.0).abs() < 1e-6);
        assert!((ease_in_out(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn ease_is_monotonic() {
        let mut prev = ease_in_out(0.0);
        for i in 1..=100 {
            let next = ease_in_out(i as f32 / 100.0);
            assert!(next >= prev, "not monotonic at step {i}");
            prev = next;
        }
    }

    #[test]
    fn rounding_helpers() {
        assert_eq!(floor_even(7), 6);
        assert_eq!(floor_even(8), 8);
        assert_eq!(round_mult4(5), 4);
        assert_eq!(round_mult4(6), 8);
        assert_eq!(round_mult4(8), 8);
    }

    #[test]
    fn sample_size_is_power_of_two_and_sufficient() {
        assert_eq!(sample_size(4000, 1080), 4);
        assert_eq!(sample_size(1000, 1080), 1);
        assert_eq!(sample_size(9000, 1080), 16);
        for raw in [100u32, 1000, 5000, 20000] {
            let s = sample_size(raw, 64);
            assert!(s.is_power_of_two());
            // Downsampled size stays within the target, and the factor is
            // the smallest that achieves it.
            assert!(raw / s <= 64);
            assert!(s == 1 || raw / (s / 2) > 64);
        }
    }

    #[test]
    fn uninterpolate_inverts_interpolate() {
        let v = interpolate(-1.0, 1.0, 0.25);
        assert!((uninterpolate(-1.0, 1.0, v) - 0.25).abs() < 1e-6);
    }
}

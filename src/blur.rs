//! CPU blur and desaturation used to build the blurred keyframes.
//!
//! The blurrer holds one prescaled source bitmap (already reduced to the
//! blur target size) and produces blurred, optionally desaturated copies of
//! it — one per keyframe. Scratch planes are allocated once and reused
//! across keyframes.

use image::RgbaImage;
use tracing::warn;

use crate::mathutil::interpolate;

/// Largest blur radius the separable pass supports. Requests beyond this are
/// clamped; the prescale sample size is chosen so the effective radius stays
/// within it.
pub const MAX_SUPPORTED_BLUR_PIXELS: u32 = 25;

// Rec.601 luma weights, matching the desaturation color matrix.
const LUMA_R: f32 = 0.299;
const LUMA_G: f32 = 0.587;
const LUMA_B: f32 = 0.114;

pub struct Blurrer {
    width: u32,
    height: u32,
    original: RgbaImage,
    source: Vec<f32>,
    front: Vec<f32>,
    back: Vec<f32>,
}

impl Blurrer {
    pub fn new(source: &RgbaImage) -> Self {
        let planes = rgba_to_f32(source);
        let len = planes.len();
        Self {
            width: source.width(),
            height: source.height(),
            original: source.clone(),
            source: planes,
            front: vec![0.0; len],
            back: vec![0.0; len],
        }
    }

    /// Blurs the held bitmap by `radius` pixels, then desaturates the result
    /// by `desaturate` in [0, 1]. A radius that truncates to zero returns a
    /// pixel-identical copy of the source.
    pub fn blur(&mut self, radius: f32, desaturate: f32) -> RgbaImage {
        debug_assert!(
            radius <= MAX_SUPPORTED_BLUR_PIXELS as f32,
            "blur radius {radius} exceeds the supported maximum"
        );
        let radius = radius.clamp(0.0, MAX_SUPPORTED_BLUR_PIXELS as f32) as u32;
        if radius == 0 {
            return self.original.clone();
        }

        let weights = gaussian_kernel(radius);
        blur_pass(
            &self.source,
            &mut self.front,
            self.width as usize,
            self.height as usize,
            radius as usize,
            &weights,
            true,
        );
        blur_pass(
            &self.front,
            &mut self.back,
            self.width as usize,
            self.height as usize,
            radius as usize,
            &weights,
            false,
        );

        let desaturate = desaturate.clamp(0.0, 1.0);
        if desaturate > 0.0 {
            desaturate_in_place(&mut self.back, desaturate);
        }

        f32_to_rgba(self.width, self.height, &self.back)
    }
}

/// Normalized gaussian weights over `[-radius, radius]` with sigma chosen so
/// the kernel support ends at the requested radius.
fn gaussian_kernel(radius: u32) -> Vec<f32> {
    let sigma = (radius as f32 / 3.0).max(0.01);
    let radius = radius as i32;
    let denom = 2.0 * sigma * sigma;
    let mut weights = Vec::with_capacity((radius * 2 + 1) as usize);
    let mut sum = 0.0;
    for i in -radius..=radius {
        let x = i as f32;
        let w = (-x * x / denom).exp();
        weights.push(w);
        sum += w;
    }
    if sum > 0.0 {
        for w in &mut weights {
            *w /= sum;
        }
    }
    weights
}

fn blur_pass(
    src: &[f32],
    dst: &mut [f32],
    width: usize,
    height: usize,
    radius: usize,
    weights: &[f32],
    horizontal: bool,
) {
    let kernel = &weights[..(2 * radius + 1)];
    for y in 0..height {
        for x in 0..width {
            let mut acc = [0.0f32; 4];
            for (idx, &weight) in kernel.iter().enumerate() {
                let offset = idx as isize - radius as isize;
                let sample_index = if horizontal {
                    let sx = clamp_i(x as isize + offset, width as isize);
                    (y * width + sx) * 4
                } else {
                    let sy = clamp_i(y as isize + offset, height as isize);
                    (sy * width + x) * 4
                };
                for (a, &s) in acc.iter_mut().zip(&src[sample_index..sample_index + 4]) {
                    *a += s * weight;
                }
            }
            let out = (y * width + x) * 4;
            dst[out..out + 4].copy_from_slice(&acc);
        }
    }
}

fn desaturate_in_place(planes: &mut [f32], amount: f32) {
    for pixel in planes.chunks_exact_mut(4) {
        let luma = LUMA_R * pixel[0] + LUMA_G * pixel[1] + LUMA_B * pixel[2];
        pixel[0] = interpolate(pixel[0], luma, amount);
        pixel[1] = interpolate(pixel[1], luma, amount);
        pixel[2] = interpolate(pixel[2], luma, amount);
    }
}

#[inline]
fn clamp_i(value: isize, max: isize) -> usize {
    value.clamp(0, max.saturating_sub(1)) as usize
}

fn rgba_to_f32(image: &RgbaImage) -> Vec<f32> {
    image
        .pixels()
        .flat_map(|p| p.0.iter().map(|&c| (c as f32) / 255.0))
        .collect()
}

fn f32_to_rgba(width: u32, height: u32, data: &[f32]) -> RgbaImage {
    let mut out = RgbaImage::new(width, height);
    for (i, pixel) in out.pixels_mut().enumerate() {
        let base = i * 4;
        pixel.0 = [
            to_u8(data[base]),
            to_u8(data[base + 1]),
            to_u8(data[base + 2]),
            to_u8(data[base + 3]),
        ];
    }
    out
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Resizes `source` to exactly `target_w` x `target_h` for the blur
/// prescale. Falls back to `None` (caller degrades to the unscaled bitmap)
/// if the resize backend rejects the request.
pub fn scale_exact(source: &RgbaImage, target_w: u32, target_h: u32) -> Option<RgbaImage> {
    use fast_image_resize as fir;

    if target_w == 0 || target_h == 0 {
        return None;
    }
    if source.width() == target_w && source.height() == target_h {
        return Some(source.clone());
    }

    let src_view = match fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    ) {
        Ok(view) => view,
        Err(err) => {
            warn!("blur prescale source view failed: {err:?}");
            return None;
        }
    };
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options =
        fir::ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Bilinear));
    let mut resizer = fir::Resizer::new();
    if let Err(err) = resizer.resize(&src_view, &mut dst_image, Some(&options)) {
        warn!("blur prescale resize failed: {err:?}");
        return None;
    }
    RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
}

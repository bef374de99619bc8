//! One wallpaper slot: the sharp picture plus its blurred keyframes, the
//! darkness-derived dim amount, and the pan/zoom/focus viewport math.

use std::sync::Arc;

use image::RgbaImage;
use tracing::warn;

use crate::blur::{self, Blurrer};
use crate::mathutil::{ease_in_out, floor_even, interpolate, round_mult4, uninterpolate};
use crate::region::RegionSource;
use crate::render::context::GraphicsContext;
use crate::render::matrix::{self, Mat4};
use crate::render::picture::TiledPicture;
use crate::render::viewport::{DetailViewports, RectF};

/// Fraction of the configured maximum dim that darkness modulates; the rest
/// always applies.
pub const DIM_RANGE: f32 = 0.5;

/// Everything a slot needs to (re)build its pictures, derived by the
/// renderer from settings and surface size.
#[derive(Debug, Clone, Copy)]
pub struct RenderParams {
    pub max_dim: u32,
    pub max_grey: u32,
    pub max_prescaled_blur_px: u32,
    pub blurred_sample_size: u32,
    pub render_height: u32,
    pub demo_mode: bool,
}

/// Per-frame viewport inputs shared by both slots.
#[derive(Debug, Clone, Copy)]
pub struct ViewState {
    pub screen_aspect: f32,
    pub normal_offset_x: f32,
    /// How far the blur has resolved toward sharp, in [0, 1].
    pub focus_amount: f32,
    /// Whether the focus blend toward the detail rectangle applies.
    pub focus_active: bool,
    /// Whether a freshly computed viewport should be published as the
    /// slot's default detail rectangle.
    pub publish_default: bool,
}

/// One pending picture draw: which picture, at which transform and alpha.
pub struct PictureDraw<'a> {
    pub picture: &'a TiledPicture,
    pub transform: Mat4,
    pub alpha: f32,
}

pub struct PictureSet {
    id: usize,
    keyframes: u32,
    pictures: Vec<Option<Arc<TiledPicture>>>,
    has_bitmap: bool,
    bitmap_aspect: f32,
    dim_amount: u32,
    viewport: RectF,
    projection: Mat4,
}

impl PictureSet {
    pub fn new(id: usize, keyframes: u32) -> Self {
        Self {
            id,
            keyframes,
            pictures: (0..=keyframes).map(|_| None).collect(),
            has_bitmap: false,
            bitmap_aspect: 1.0,
            dim_amount: 0,
            viewport: RectF::new(-1.0, 1.0, 1.0, -1.0),
            projection: matrix::IDENTITY,
        }
    }

    pub const fn id(&self) -> usize {
        self.id
    }

    pub const fn dim_amount(&self) -> u32 {
        self.dim_amount
    }

    pub const fn has_bitmap(&self) -> bool {
        self.has_bitmap
    }

    pub const fn bitmap_aspect(&self) -> f32 {
        self.bitmap_aspect
    }

    /// The clip-space rectangle currently visible for this slot.
    pub const fn viewport(&self) -> RectF {
        self.viewport
    }

    /// Builds keyframe 0 at full render resolution plus the blurred
    /// keyframes 1..=K from `source`, and derives the dim amount from the
    /// artwork's average luma.
    pub fn load(&mut self, ctx: &GraphicsContext, source: &RegionSource, params: &RenderParams) {
        let (width, height) = (source.width(), source.height());
        self.has_bitmap = width != 0 && height != 0;
        self.bitmap_aspect = if self.has_bitmap {
            width as f32 / height as f32
        } else {
            1.0
        };
        self.dim_amount = params.max_dim;
        self.destroy_pictures();
        if !self.has_bitmap {
            return;
        }

        // A tiny decode of the whole artwork decides the dim strength.
        let darkness = source
            .decode_scaled(64, 64)
            .map(|small| average_darkness(&small))
            .unwrap_or(0.0);
        self.dim_amount = if params.demo_mode {
            params.max_dim
        } else {
            dim_amount_for_darkness(params.max_dim, darkness)
        };

        let sharp = TiledPicture::from_region_source(ctx, source, params.render_height);
        let sharp = (!sharp.is_empty()).then(|| Arc::new(sharp));
        self.pictures[0] = sharp.clone();

        if params.max_prescaled_blur_px == 0 && params.max_grey == 0 {
            // Neither blur nor grey configured: the blurred keyframes alias
            // the sharp picture and no pixel work happens at all.
            for frame in 1..=self.keyframes as usize {
                self.pictures[frame] = sharp.clone();
            }
            return;
        }

        let Some(scaled) = self.decode_blur_source(source, params) else {
            warn!("blur source decode failed; keyframes left unset");
            return;
        };
        let mut blurrer = Blurrer::new(&scaled);
        for frame in 1..=self.keyframes {
            let t = frame as f32 / self.keyframes as f32;
            let radius = if params.max_prescaled_blur_px > 0 {
                params.max_prescaled_blur_px as f32 * ease_in_out(t)
            } else {
                0.0
            };
            let desaturate = params.max_grey as f32 / 500.0 * t;
            let blurred = blurrer.blur(radius, desaturate);
            let picture = TiledPicture::from_bitmap(ctx, &blurred);
            self.pictures[frame as usize] = (!picture.is_empty()).then(|| Arc::new(picture));
        }
    }

    /// Decodes the artwork at the blur target size: height floored to even,
    /// width rounded to a multiple of four for backend alignment.
    fn decode_blur_source(
        &self,
        source: &RegionSource,
        params: &RenderParams,
    ) -> Option<RgbaImage> {
        let target_height = if params.max_prescaled_blur_px > 0 {
            params.render_height / params.blurred_sample_size.max(1)
        } else {
            params.render_height
        };
        let scaled_height = floor_even(target_height).max(2);
        let scaled_width = round_mult4((scaled_height as f32 * self.bitmap_aspect) as u32).max(4);
        let decoded = source.decode_scaled(scaled_width, scaled_height)?;
        // The subsampled decode lands near the target; snap it to the exact
        // even/multiple-of-4 dimensions the blur backend expects.
        Some(blur::scale_exact(&decoded, scaled_width, scaled_height).unwrap_or(decoded))
    }

    pub fn destroy_pictures(&mut self) {
        for picture in &mut self.pictures {
            picture.take();
        }
    }

    /// Recomputes the slot's viewport and projection from the pan offset,
    /// zoom, and (when focused) the externally supplied detail rectangle.
    pub fn recompute_transform(&mut self, view: &ViewState, detail: &mut DetailViewports) {
        if !self.has_bitmap {
            return;
        }
        let Some(mut vp) = pan_viewport(
            view.screen_aspect,
            self.bitmap_aspect,
            view.normal_offset_x,
        ) else {
            return;
        };

        if view.focus_active && view.focus_amount > 0.0 {
            let focus = detail.get(self.id);
            if focus.is_empty() {
                if view.publish_default {
                    // No detail rectangle yet: the just-computed viewport
                    // becomes this slot's default, in normalized terms.
                    detail.set(
                        self.id,
                        RectF::new(
                            uninterpolate(-1.0, 1.0, vp.left),
                            uninterpolate(1.0, -1.0, vp.top),
                            uninterpolate(-1.0, 1.0, vp.right),
                            uninterpolate(1.0, -1.0, vp.bottom),
                        ),
                    );
                }
            } else {
                vp = RectF::new(
                    interpolate(
                        vp.left,
                        interpolate(-1.0, 1.0, focus.left),
                        view.focus_amount,
                    ),
                    interpolate(vp.top, interpolate(1.0, -1.0, focus.top), view.focus_amount),
                    interpolate(
                        vp.right,
                        interpolate(-1.0, 1.0, focus.right),
                        view.focus_amount,
                    ),
                    interpolate(
                        vp.bottom,
                        interpolate(1.0, -1.0, focus.bottom),
                        view.focus_amount,
                    ),
                );
            }
        }

        self.viewport = vp;
        self.projection = matrix::ortho(vp.left, vp.right, vp.bottom, vp.top);
    }

    /// Collects the draws for this slot at `global_alpha`, interpolating
    /// between the two keyframes bracketing `blur_progress`.
    pub fn draw_frame<'a>(
        &'a self,
        global_alpha: f32,
        blur_progress: f32,
        out: &mut Vec<PictureDraw<'a>>,
    ) {
        if !self.has_bitmap || global_alpha <= 0.0 {
            return;
        }
        let max_frame = self.keyframes as usize;
        let lo = (blur_progress.floor() as usize).min(max_frame);
        let hi = (blur_progress.ceil() as usize).min(max_frame);
        let local_hi_alpha = blur_progress - lo as f32;

        if lo == hi {
            if let Some(picture) = &self.pictures[lo] {
                out.push(PictureDraw {
                    picture: picture.as_ref(),
                    transform: self.projection,
                    alpha: global_alpha,
                });
            }
            return;
        }

        let (Some(lo_picture), Some(hi_picture)) = (&self.pictures[lo], &self.pictures[hi]) else {
            return;
        };
        let (lo_alpha, hi_alpha) = if global_alpha >= 1.0 {
            (1.0, local_hi_alpha)
        } else {
            recompose_alpha(global_alpha, local_hi_alpha)
        };
        out.push(PictureDraw {
            picture: lo_picture.as_ref(),
            transform: self.projection,
            alpha: lo_alpha,
        });
        out.push(PictureDraw {
            picture: hi_picture.as_ref(),
            transform: self.projection,
            alpha: hi_alpha,
        });
    }
}

/// Average Rec.709-weighted luma of a small bitmap, in [0, 1].
pub fn average_darkness(image: &RgbaImage) -> f32 {
    let mut total = 0.0f32;
    let mut count = 0u32;
    for pixel in image.pixels() {
        total += 0.21 * pixel.0[0] as f32 + 0.71 * pixel.0[1] as f32 + 0.07 * pixel.0[2] as f32;
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }
    (total / count as f32 / 255.0).clamp(0.0, 1.0)
}

/// Dim overlay strength for an artwork of the given darkness: dark artwork
/// needs less dimming, scaled through a square root so mid-tones are not
/// over-darkened.
pub fn dim_amount_for_darkness(max_dim: u32, darkness: f32) -> u32 {
    let darkness = darkness.clamp(0.0, 1.0);
    (max_dim as f32 * ((1.0 - DIM_RANGE) + DIM_RANGE * darkness.sqrt())).round() as u32
}

/// Splits `global_alpha` across the lo/hi keyframe pair so that drawing lo
/// then hi back-to-front matches compositing them first and fading the
/// result — without an intermediate buffer.
pub fn recompose_alpha(global_alpha: f32, local_hi_alpha: f32) -> (f32, f32) {
    let denominator = global_alpha * local_hi_alpha - 1.0;
    let new_lo = if denominator.abs() < f32::EPSILON {
        0.0
    } else {
        global_alpha * (local_hi_alpha - 1.0) / denominator
    };
    (new_lo, global_alpha * local_hi_alpha)
}

/// Pan/zoom viewport in clip coordinates: the artwork is zoomed so it is
/// always a little wider than the screen, and the pan range is capped at
/// 1.8 screen widths.
pub fn pan_viewport(screen_aspect: f32, bitmap_aspect: f32, offset_x: f32) -> Option<RectF> {
    let screen_to_bitmap = screen_aspect / bitmap_aspect;
    if !screen_to_bitmap.is_finite() || screen_to_bitmap <= 0.0 {
        return None;
    }
    let zoom = 1.0f32.max(1.15 * screen_to_bitmap);
    let scaled_to_screen = zoom / screen_to_bitmap;
    let max_pan_screen_widths = 1.8f32.min(scaled_to_screen);

    let left = interpolate(
        -1.0,
        1.0,
        interpolate(
            (1.0 - max_pan_screen_widths / scaled_to_screen) / 2.0,
            (1.0 + (max_pan_screen_widths - 2.0) / scaled_to_screen) / 2.0,
            offset_x.clamp(0.0, 1.0),
        ),
    );
    Some(RectF::new(
        left,
        1.0 / zoom,
        left + 2.0 / scaled_to_screen,
        -1.0 / zoom,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn darkness_of_flat_images() {
        let black = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]));
        assert!(average_darkness(&black) < 1e-6);
        let white = RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 255]));
        assert!((average_darkness(&white) - (0.21 + 0.71 + 0.07)).abs() < 1e-3);
    }

    #[test]
    fn dim_amount_is_monotonic_in_darkness() {
        let mut prev = 0;
        for step in 0..=100 {
            let dim = dim_amount_for_darkness(128, step as f32 / 100.0);
            assert!(dim >= prev, "dim decreased at step {step}");
            prev = dim;
        }
        // Endpoints: half the max at full dark, the max at full bright.
        assert_eq!(dim_amount_for_darkness(128, 0.0), 64);
        assert_eq!(dim_amount_for_darkness(128, 1.0), 128);
    }

    #[test]
    fn viewport_zooms_so_image_covers_screen_width() {
        // Tall artwork on a wide screen needs zoom well above one.
        let vp = pan_viewport(16.0 / 9.0, 2.0 / 3.0, 0.0).unwrap();
        // Visible width in picture space never exceeds the full picture.
        assert!(vp.left >= -1.0 - 1e-5);
        assert!(vp.right - vp.left <= 2.0 + 1e-5);
        // The vertical extent is symmetric and zoomed in.
        assert!(vp.top > 0.0 && (vp.top + vp.bottom).abs() < 1e-6);
        assert!(vp.top < 1.0);
    }

    #[test]
    fn viewport_pans_monotonically_with_offset() {
        let mut prev_left = f32::NEG_INFINITY;
        for step in 0..=10 {
            let vp = pan_viewport(16.0 / 9.0, 4.0 / 3.0, step as f32 / 10.0).unwrap();
            assert!(vp.left >= prev_left, "pan not monotonic at step {step}");
            prev_left = vp.left;
        }
        // Even a wide artwork keeps a little parallax headroom.
        let at_zero = pan_viewport(16.0 / 9.0, 4.0, 0.0).unwrap();
        let at_one = pan_viewport(16.0 / 9.0, 4.0, 1.0).unwrap();
        assert!(at_one.left > at_zero.left);
    }

    #[test]
    fn degenerate_aspect_yields_no_viewport() {
        assert!(pan_viewport(0.0, 1.0, 0.0).is_none());
        assert!(pan_viewport(1.0, 0.0, 0.0).is_none());
    }

    #[test]
    fn recomposed_alpha_matches_nested_compositing() {
        // dst blended with lo at a1, then hi at a2, must equal dst blended
        // with the recomposed pair when the whole result fades by g.
        for g_step in 0..10 {
            for l_step in 0..=10 {
                let g = g_step as f32 / 10.0;
                let l = l_step as f32 / 10.0;
                let (new_lo, new_hi) = recompose_alpha(g, l);

                let dst = 0.3f32;
                let lo_color = 0.9f32;
                let hi_color = 0.2f32;
                // Reference: compose hi over lo first, then fade by g.
                let inner = lo_color * (1.0 - l) + hi_color * l;
                let reference = dst * (1.0 - g) + inner * g;
                // Actual: two back-to-front draws with recomposed alphas.
                let after_lo = dst * (1.0 - new_lo) + lo_color * new_lo;
                let actual = after_lo * (1.0 - new_hi) + hi_color * new_hi;
                assert!(
                    (reference - actual).abs() < 1e-4,
                    "mismatch at g={g} l={l}: {reference} vs {actual}"
                );
            }
        }
    }
}

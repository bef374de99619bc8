//! The blur renderer: two picture-set slots, the crossfade and blur
//! animators, and the per-frame draw orchestration.
//!
//! Slot lifecycle: empty, then showing slot A; a newly consumed artwork
//! loads into slot B and fades in over A; when the fade lands the slots
//! swap and the old one is torn down. At most one crossfade runs at a time;
//! an artwork arriving mid-fade waits in a one-deep queue (latest wins) and
//! is consumed when the fade completes.

use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::blur::MAX_SUPPORTED_BLUR_PIXELS;
use crate::config::Configuration;
use crate::events::{Amounts, ArtworkSize, Notifier, SwitchingPhotos};
use crate::handoff::SingleSlot;
use crate::mathutil::interpolate;
use crate::region::RegionSource;
use crate::render::animator::{Tick, TickingFloatAnimator};
use crate::render::context::{DrawUniform, GraphicsContext};
use crate::render::matrix;
use crate::render::overlay::ColorOverlay;
use crate::render::picture::TiledPicture;
use crate::render::picture_set::{PictureDraw, PictureSet, RenderParams, ViewState};
use crate::render::viewport::DetailViewports;

pub struct BlurRenderer {
    demo_mode: bool,
    keyframes: u32,
    amounts: Amounts,
    max_prescaled_blur_px: u32,
    blurred_sample_size: u32,
    aspect_ratio: f32,
    current_height: u32,
    normal_offset_x: f32,
    is_blurred: bool,
    blur_related_to_detail: bool,
    blur_animator: TickingFloatAnimator,
    crossfade_animator: TickingFloatAnimator,
    current: PictureSet,
    next: PictureSet,
    queued_source: SingleSlot<RegionSource>,
    overlay: ColorOverlay,
    detail: DetailViewports,
    switching: watch::Sender<Option<SwitchingPhotos>>,
    artwork_size: watch::Sender<Option<ArtworkSize>>,
}

impl BlurRenderer {
    pub fn new(
        ctx: &GraphicsContext,
        cfg: &Configuration,
        notifier: Notifier,
        width: u32,
        height: u32,
    ) -> Self {
        let keyframes = cfg.effective_keyframes();
        let Notifier {
            switching,
            viewport,
            artwork_size,
        } = notifier;
        let mut renderer = Self {
            demo_mode: cfg.demo_mode,
            keyframes,
            amounts: cfg.amounts(),
            max_prescaled_blur_px: 0,
            blurred_sample_size: 4,
            aspect_ratio: width.max(1) as f32 / height.max(1) as f32,
            current_height: height,
            normal_offset_x: 0.0,
            is_blurred: true,
            blur_related_to_detail: false,
            // Wallpapers come up blurred; the animator starts parked at K.
            blur_animator: TickingFloatAnimator::new(
                cfg.blur_duration * if cfg.demo_mode { 5 } else { 1 },
                keyframes as f32,
            ),
            crossfade_animator: TickingFloatAnimator::new(cfg.crossfade_duration, 0.0),
            current: PictureSet::new(0, keyframes),
            next: PictureSet::new(1, keyframes),
            queued_source: SingleSlot::new(),
            overlay: ColorOverlay::new(ctx),
            detail: DetailViewports::new(viewport),
            switching,
            artwork_size,
        };
        renderer.recompute_max_prescaled_blur();
        renderer
    }

    pub const fn is_blurred(&self) -> bool {
        self.is_blurred
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect_ratio = width.max(1) as f32 / height.max(1) as f32;
        self.current_height = height;
        if !self.demo_mode {
            self.detail.clear_all();
        }
        self.recompute_max_prescaled_blur();
        self.recompute_transforms();
    }

    pub fn set_normal_offset_x(&mut self, offset: f32) {
        self.normal_offset_x = offset.clamp(0.0, 1.0);
        self.recompute_transforms();
    }

    pub fn set_amounts(&mut self, amounts: Amounts) {
        if self.demo_mode {
            // Demo amounts are pinned; settings changes don't apply.
            return;
        }
        self.amounts = amounts;
        self.recompute_max_prescaled_blur();
    }

    /// Starts a blur tween from the current progress toward sharp or fully
    /// blurred. `focus` marks whether the detail-viewport blend applies
    /// while the artwork is in focus.
    pub fn set_blurred(&mut self, blurred: bool, focus: bool, now: Instant) {
        if focus && !blurred && !self.demo_mode {
            self.detail.clear_all();
        }
        self.blur_related_to_detail = focus;
        self.is_blurred = blurred;
        let end = if blurred { self.keyframes as f32 } else { 0.0 };
        self.blur_animator.start_from_current(end, now);
    }

    /// Accepts a freshly decoded artwork. While a crossfade is running the
    /// artwork waits in the one-deep queue; a newer arrival displaces (and
    /// destroys) an older queued one.
    pub fn consume_source(&mut self, ctx: &mut GraphicsContext, source: RegionSource, now: Instant) {
        if self.crossfade_animator.is_running() {
            debug!("crossfade in progress; queueing artwork");
            if let Some(discarded) = self.queued_source.put(source) {
                discarded.destroy();
            }
            return;
        }

        let (width, height) = (source.width(), source.height());
        if width == 0 || height == 0 {
            warn!("ignoring artwork with empty dimensions");
            return;
        }

        if !self.demo_mode {
            self.switching
                .send_replace(Some(SwitchingPhotos::InProgress(self.next.id())));
            self.artwork_size
                .send_replace(Some(ArtworkSize { width, height }));
            self.detail.set_default(
                self.next.id(),
                width as f32 / height as f32,
                self.aspect_ratio,
            );
        }

        let params = self.render_params();
        self.next.load(ctx, &source, &params);
        // Every tile has been read; release the decoded pixels now.
        source.destroy();
        self.recompute_transforms();
        self.crossfade_animator.start(0.0, 1.0, now);
    }

    /// Advances the animators and draws the frame. Returns whether another
    /// frame should be scheduled immediately.
    pub fn draw_frame(
        &mut self,
        ctx: &mut GraphicsContext,
        target: &wgpu::TextureView,
        now: Instant,
    ) -> bool {
        let crossfade_tick = self.crossfade_animator.tick(now);
        self.blur_animator.tick(now);

        if crossfade_tick == Tick::Finished {
            // May immediately start the next crossfade from the queue.
            self.finish_crossfade(ctx, now);
        }

        if self.blur_related_to_detail {
            self.recompute_transforms();
        }

        let blur_progress = self.blur_animator.current_value();
        let mut dim = self.current.dim_amount() as f32;
        let mut draws: Vec<PictureDraw<'_>> = Vec::with_capacity(4);
        self.current.draw_frame(1.0, blur_progress, &mut draws);
        if self.crossfade_animator.is_running() {
            let fade = self.crossfade_animator.current_value();
            dim = interpolate(dim, self.next.dim_amount() as f32, fade);
            self.next.draw_frame(fade, blur_progress, &mut draws);
        }
        // Dimming tracks the blur: it only fully applies once the artwork
        // has blurred back out of focus.
        let overlay_alpha = (dim / 255.0) * (blur_progress / self.keyframes as f32);

        ctx.begin_frame();
        let mut plan: Vec<(&TiledPicture, u32)> = Vec::with_capacity(draws.len());
        for draw in &draws {
            let uniform = DrawUniform {
                transform: draw.transform,
                tint: [0.0, 0.0, 0.0, draw.alpha],
            };
            if let Some(offset) = ctx.push_uniform(&uniform) {
                plan.push((draw.picture, offset));
            }
        }
        let overlay_offset = (overlay_alpha > 0.0)
            .then(|| {
                ctx.push_uniform(&DrawUniform {
                    transform: matrix::IDENTITY,
                    tint: [0.0, 0.0, 0.0, overlay_alpha],
                })
            })
            .flatten();

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("frame-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rpass.set_pipeline(ctx.picture_pipeline());
            for (picture, offset) in &plan {
                rpass.set_bind_group(0, ctx.uniform_bind_group(), &[*offset]);
                picture.draw(&mut rpass);
            }
            if let Some(offset) = overlay_offset {
                rpass.set_pipeline(ctx.overlay_pipeline());
                rpass.set_bind_group(0, ctx.uniform_bind_group(), &[offset]);
                self.overlay.draw(&mut rpass);
            }
        }
        ctx.queue.submit([encoder.finish()]);

        self.crossfade_animator.is_running() || self.blur_animator.is_running()
    }

    fn finish_crossfade(&mut self, ctx: &mut GraphicsContext, now: Instant) {
        std::mem::swap(&mut self.current, &mut self.next);
        self.next.destroy_pictures();
        if !self.demo_mode {
            self.switching
                .send_replace(Some(SwitchingPhotos::Done(self.current.id())));
        }
        info!(slot = self.current.id(), "crossfade complete");
        if let Some(source) = self.queued_source.take() {
            self.consume_source(ctx, source, now);
        }
    }

    fn recompute_max_prescaled_blur(&mut self) {
        // The blur amount maps to a pixel radius relative to the render
        // height; the prescale sample size keeps the effective radius
        // within what the blur pass supports.
        let max_blur_px =
            (self.current_height as f32 * self.amounts.blur as f32 * 0.0001) as u32;
        let mut sample = 4u32;
        while max_blur_px / sample > MAX_SUPPORTED_BLUR_PIXELS {
            sample <<= 1;
        }
        self.blurred_sample_size = sample;
        self.max_prescaled_blur_px = max_blur_px / sample;
    }

    fn render_params(&self) -> RenderParams {
        RenderParams {
            max_dim: self.amounts.dim,
            max_grey: self.amounts.grey,
            max_prescaled_blur_px: self.max_prescaled_blur_px,
            blurred_sample_size: self.blurred_sample_size,
            render_height: self.current_height,
            demo_mode: self.demo_mode,
        }
    }

    fn view_state(&self) -> ViewState {
        let keyframes = self.keyframes as f32;
        ViewState {
            screen_aspect: self.aspect_ratio,
            normal_offset_x: self.normal_offset_x,
            focus_amount: (keyframes - self.blur_animator.current_value()) / keyframes,
            focus_active: self.blur_related_to_detail,
            publish_default: !self.demo_mode,
        }
    }

    fn recompute_transforms(&mut self) {
        let view = self.view_state();
        self.current.recompute_transform(&view, &mut self.detail);
        self.next.recompute_transform(&view, &mut self.detail);
    }
}

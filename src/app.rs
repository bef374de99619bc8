//! Winit shell: owns the window, the surface, and the render loop, and
//! bridges controller commands onto the render thread. Animation is
//! self-scheduling — a frame requests the next one only while something is
//! still moving.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use tokio::sync::mpsc::Sender;
use tracing::{info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowAttributes, WindowId},
};

use crate::config::Configuration;
use crate::events::{ControlEvent, Notifier, RendererCommand, UserEvent};
use crate::handoff::SingleSlot;
use crate::region::RegionSource;
use crate::render::context::GraphicsContext;
use crate::render::renderer::BlurRenderer;

const DEMO_CYCLE: Duration = Duration::from_secs(35);
const DEMO_FOCUS_DELAY: Duration = Duration::from_secs(2);
const DEMO_FOCUS_TIME: Duration = Duration::from_secs(6);
const OFFSET_STEP: f32 = 0.05;

/// Runs the wallpaper until the window closes.
pub fn run(
    event_loop: EventLoop<UserEvent>,
    cfg: Configuration,
    commands: Receiver<RendererCommand>,
    control: Sender<ControlEvent>,
    notifier: Notifier,
) -> Result<()> {
    let mut app = WallpaperApp::new(cfg, commands, control, notifier);
    event_loop.run_app(&mut app)?;
    Ok(())
}

struct Gpu {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    ctx: GraphicsContext,
}

/// Demo mode sweeps the pan offset back and forth and periodically pulls
/// the artwork into focus.
struct DemoState {
    started: Instant,
    focused: bool,
}

impl DemoState {
    const fn new(now: Instant) -> Self {
        Self {
            started: now,
            focused: false,
        }
    }

    /// Triangle sweep across [0, 1], reversing direction each cycle.
    fn offset(&self, now: Instant) -> f32 {
        let cycle = DEMO_CYCLE.as_secs_f32();
        let elapsed = now.duration_since(self.started).as_secs_f32();
        let sweep = (elapsed / cycle) as u32;
        let t = (elapsed % cycle) / cycle;
        if sweep % 2 == 0 { t } else { 1.0 - t }
    }

    /// `Some(blurred)` when the focus window of the cycle opens or closes.
    fn focus_transition(&mut self, now: Instant) -> Option<bool> {
        let cycle = DEMO_CYCLE.as_secs_f32();
        let within = now.duration_since(self.started).as_secs_f32() % cycle;
        let focus_start = DEMO_FOCUS_DELAY.as_secs_f32();
        let focus_end = focus_start + DEMO_FOCUS_TIME.as_secs_f32();
        let should_focus = within >= focus_start && within < focus_end;
        if should_focus == self.focused {
            return None;
        }
        self.focused = should_focus;
        Some(!should_focus)
    }
}

struct WallpaperApp {
    cfg: Configuration,
    commands: Receiver<RendererCommand>,
    control: Sender<ControlEvent>,
    notifier: Option<Notifier>,

    window: Option<Arc<Window>>,
    gpu: Option<Gpu>,
    renderer: Option<BlurRenderer>,

    /// One-deep buffer for artwork that arrives before the surface exists.
    queued_source: SingleSlot<RegionSource>,
    pending_commands: Vec<RendererCommand>,

    demo: Option<DemoState>,
    offset_x: f32,
    locked: bool,
    detail_open: bool,
}

impl WallpaperApp {
    fn new(
        cfg: Configuration,
        commands: Receiver<RendererCommand>,
        control: Sender<ControlEvent>,
        notifier: Notifier,
    ) -> Self {
        let demo = cfg.demo_mode.then(|| DemoState::new(Instant::now()));
        Self {
            cfg,
            commands,
            control,
            notifier: Some(notifier),
            window: None,
            gpu: None,
            renderer: None,
            queued_source: SingleSlot::new(),
            pending_commands: Vec::new(),
            demo,
            offset_x: 0.0,
            locked: false,
            detail_open: false,
        }
    }

    fn apply_command(&mut self, command: RendererCommand) {
        match command {
            RendererCommand::Consume(source) => {
                if let (Some(gpu), Some(renderer)) = (&mut self.gpu, &mut self.renderer) {
                    renderer.consume_source(&mut gpu.ctx, source, Instant::now());
                } else if let Some(discarded) = self.queued_source.put(source) {
                    // Not visible yet: keep only the newest artwork.
                    discarded.destroy();
                }
            }
            RendererCommand::SetAmounts(amounts) => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.set_amounts(amounts);
                } else {
                    self.pending_commands.push(RendererCommand::SetAmounts(amounts));
                }
            }
            RendererCommand::SetBlurred { blurred, focus } => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.set_blurred(blurred, focus, Instant::now());
                } else {
                    self.pending_commands
                        .push(RendererCommand::SetBlurred { blurred, focus });
                }
            }
        }
    }

    fn drain_commands(&mut self) {
        // Artwork is handed over through a single slot: if several decodes
        // piled up, only the newest survives and the rest are destroyed.
        let mut arrived: SingleSlot<RegionSource> = SingleSlot::new();
        while let Ok(command) = self.commands.try_recv() {
            match command {
                RendererCommand::Consume(source) => {
                    if let Some(discarded) = arrived.put(source) {
                        discarded.destroy();
                    }
                }
                other => self.apply_command(other),
            }
        }
        if let Some(source) = arrived.take() {
            self.apply_command(RendererCommand::Consume(source));
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn draw(&mut self) {
        let (Some(gpu), Some(renderer), Some(window)) =
            (&mut self.gpu, &mut self.renderer, &self.window)
        else {
            return;
        };
        let now = Instant::now();

        if let Some(demo) = &mut self.demo {
            renderer.set_normal_offset_x(demo.offset(now));
            if let Some(blurred) = demo.focus_transition(now) {
                renderer.set_blurred(blurred, false, now);
            }
        }

        let frame = match gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(&gpu.ctx.device, &gpu.config);
                window.request_redraw();
                return;
            }
            Err(err) => {
                warn!("surface unavailable: {err}");
                return;
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let still_animating = renderer.draw_frame(&mut gpu.ctx, &view, now);
        frame.present();

        if still_animating || self.demo.is_some() {
            window.request_redraw();
        }
    }

    fn nudge_offset(&mut self, delta: f32) {
        self.offset_x = (self.offset_x + delta).clamp(0.0, 1.0);
        if let Some(renderer) = &mut self.renderer {
            renderer.set_normal_offset_x(self.offset_x);
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn send_control(&self, event: ControlEvent) {
        if self.control.try_send(event).is_err() {
            warn!("controller busy; dropping {event:?}");
        }
    }
}

impl ApplicationHandler<UserEvent> for WallpaperApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attrs = WindowAttributes::default().with_title("mural");
        let window = Arc::new(event_loop.create_window(attrs).expect("create window"));
        window.set_fullscreen(Some(Fullscreen::Borderless(window.current_monitor())));
        window.set_cursor_visible(false);
        self.window = Some(window.clone());

        let gpu = pollster::block_on(init_gpu(window.clone())).expect("GPU init");
        let PhysicalSize { width, height } = window.inner_size();
        let notifier = self.notifier.take().expect("renderer already initialized");
        let renderer = BlurRenderer::new(&gpu.ctx, &self.cfg, notifier, width.max(1), height.max(1));
        info!(width, height, "render surface ready");
        self.gpu = Some(gpu);
        self.renderer = Some(renderer);

        // Replay whatever arrived while the surface was down: settings
        // first, then the queued artwork (flushed exactly once).
        for command in std::mem::take(&mut self.pending_commands) {
            self.apply_command(command);
        }
        if let Some(source) = self.queued_source.take() {
            self.apply_command(RendererCommand::Consume(source));
        }
        window.request_redraw();
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            UserEvent::CommandsReady => self.drain_commands(),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.clone() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Released {
                    return;
                }
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::Escape | KeyCode::KeyQ) => event_loop.exit(),
                    PhysicalKey::Code(KeyCode::KeyN | KeyCode::Space) => {
                        self.send_control(ControlEvent::NextArtwork);
                    }
                    PhysicalKey::Code(KeyCode::KeyB) => {
                        if let Some(renderer) = &mut self.renderer {
                            let blurred = !renderer.is_blurred();
                            renderer.set_blurred(blurred, false, Instant::now());
                        }
                        window.request_redraw();
                    }
                    PhysicalKey::Code(KeyCode::KeyL) => {
                        self.locked = !self.locked;
                        self.send_control(ControlEvent::LockStateChanged(self.locked));
                    }
                    PhysicalKey::Code(KeyCode::KeyD) => {
                        self.detail_open = !self.detail_open;
                        self.send_control(if self.detail_open {
                            ControlEvent::DetailViewOpened
                        } else {
                            ControlEvent::DetailViewClosed
                        });
                    }
                    PhysicalKey::Code(KeyCode::ArrowLeft) => self.nudge_offset(-OFFSET_STEP),
                    PhysicalKey::Code(KeyCode::ArrowRight) => self.nudge_offset(OFFSET_STEP),
                    _ => {}
                }
            }
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                if let Some(gpu) = &mut self.gpu
                    && width > 0
                    && height > 0
                {
                    gpu.config.width = width;
                    gpu.config.height = height;
                    gpu.surface.configure(&gpu.ctx.device, &gpu.config);
                    if let Some(renderer) = &mut self.renderer {
                        renderer.resize(width, height);
                    }
                    window.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => self.draw(),
            _ => {}
        }
    }
}

async fn init_gpu(window: Arc<Window>) -> Result<Gpu> {
    let instance = wgpu::Instance::default();
    let surface = instance
        .create_surface(window.clone())
        .context("create surface")?;

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        })
        .await
        .context("no compatible GPU adapter found")?;

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("mural-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        })
        .await
        .context("request wgpu device")?;

    let caps = surface.get_capabilities(&adapter);
    let format = caps
        .formats
        .iter()
        .copied()
        .find(wgpu::TextureFormat::is_srgb)
        .unwrap_or(caps.formats[0]);
    let PhysicalSize { width, height } = window.inner_size();
    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: width.max(1),
        height: height.max(1),
        present_mode: wgpu::PresentMode::AutoVsync,
        alpha_mode: caps.alpha_modes[0],
        view_formats: vec![],
        desired_maximum_frame_latency: 1,
    };
    surface.configure(&device, &config);

    Ok(Gpu {
        surface,
        config,
        ctx: GraphicsContext::new(device, queue, format),
    })
}

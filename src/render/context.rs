//! Renderer-owned graphics context: device, queue, pipelines, and the
//! per-frame uniform arena. All GPU state lives here and is passed
//! explicitly to the tile and overlay drawers; nothing is global.

use bytemuck::{Pod, Zeroable};
use image::RgbaImage;
use tracing::warn;
use wgpu::util::DeviceExt;

use crate::render::matrix::Mat4;

/// Hard cap on the per-tile texture edge; the device limit may be lower.
pub const MAX_TILE_SIZE: u32 = 512;

const UNIFORM_SLOTS: u32 = 64;
const UNIFORM_STRIDE: u64 = 256;

/// Per-draw uniform shared by the picture and overlay pipelines. Pictures
/// read `tint.a` as their alpha; the overlay reads the full tint color.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct DrawUniform {
    pub transform: Mat4,
    pub tint: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
}

pub struct GraphicsContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    /// Tile edge length: min(512, device max texture dimension).
    pub tile_size: u32,
    picture_pipeline: wgpu::RenderPipeline,
    overlay_pipeline: wgpu::RenderPipeline,
    tile_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    next_slot: u32,
}

impl GraphicsContext {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        let tile_size = MAX_TILE_SIZE.min(device.limits().max_texture_dimension_2d);

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("draw-uniform-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<DrawUniform>() as u64
                    ),
                },
                count: None,
            }],
        });

        let tile_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tile-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("tile-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("draw-uniforms"),
            size: u64::from(UNIFORM_SLOTS) * UNIFORM_STRIDE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("draw-uniform-bind"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniform_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<DrawUniform>() as u64),
                }),
            }],
        });

        let vertex_layout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
        };

        let picture_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("picture-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/picture.wgsl").into()),
        });
        let overlay_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("overlay-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/overlay.wgsl").into()),
        });

        let picture_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("picture-pipeline-layout"),
                bind_group_layouts: &[&frame_layout, &tile_layout],
                push_constant_ranges: &[],
            });
        let overlay_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("overlay-pipeline-layout"),
                bind_group_layouts: &[&frame_layout],
                push_constant_ranges: &[],
            });

        let make_pipeline = |label: &str,
                             layout: &wgpu::PipelineLayout,
                             shader: &wgpu::ShaderModule|
         -> wgpu::RenderPipeline {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: shader,
                    entry_point: Some("vs_main"),
                    buffers: std::slice::from_ref(&vertex_layout),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let picture_pipeline = make_pipeline(
            "picture-pipeline",
            &picture_pipeline_layout,
            &picture_shader,
        );
        let overlay_pipeline = make_pipeline(
            "overlay-pipeline",
            &overlay_pipeline_layout,
            &overlay_shader,
        );

        Self {
            device,
            queue,
            tile_size,
            picture_pipeline,
            overlay_pipeline,
            tile_layout,
            sampler,
            uniform_buffer,
            uniform_bind_group,
            next_slot: 0,
        }
    }

    pub const fn picture_pipeline(&self) -> &wgpu::RenderPipeline {
        &self.picture_pipeline
    }

    pub const fn overlay_pipeline(&self) -> &wgpu::RenderPipeline {
        &self.overlay_pipeline
    }

    pub const fn uniform_bind_group(&self) -> &wgpu::BindGroup {
        &self.uniform_bind_group
    }

    /// Resets the uniform arena for a new frame.
    pub fn begin_frame(&mut self) {
        self.next_slot = 0;
    }

    /// Writes one draw uniform and returns its dynamic offset, or `None` if
    /// the frame issued more draws than the arena holds (the draw is then
    /// skipped rather than failing the frame).
    pub fn push_uniform(&mut self, uniform: &DrawUniform) -> Option<u32> {
        if self.next_slot >= UNIFORM_SLOTS {
            warn!("draw uniform arena exhausted; skipping draw");
            return None;
        }
        let offset = u64::from(self.next_slot) * UNIFORM_STRIDE;
        self.queue
            .write_buffer(&self.uniform_buffer, offset, bytemuck::bytes_of(uniform));
        self.next_slot += 1;
        Some(offset as u32)
    }

    /// Uploads a bitmap as one tile texture and returns its bind group.
    pub fn upload_tile(&self, image: &RgbaImage) -> wgpu::BindGroup {
        let (w, h) = image.dimensions();
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("tile"),
            size: wgpu::Extent3d {
                width: w,
                height: h,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            texture.as_image_copy(),
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * w),
                rows_per_image: Some(h),
            },
            wgpu::Extent3d {
                width: w,
                height: h,
                depth_or_array_layers: 1,
            },
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tile-bind"),
            layout: &self.tile_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    /// Creates an immutable vertex buffer for one quad.
    pub fn quad_buffer(&self, vertices: &[Vertex; 6]) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("quad"),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            })
    }
}

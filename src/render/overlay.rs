//! Full-screen color overlay used for the dim tint.

use crate::render::context::{GraphicsContext, Vertex};

pub struct ColorOverlay {
    vertices: wgpu::Buffer,
}

impl ColorOverlay {
    pub fn new(ctx: &GraphicsContext) -> Self {
        let quad = |x: f32, y: f32| Vertex {
            pos: [x, y],
            uv: [0.0, 0.0],
        };
        let vertices = ctx.quad_buffer(&[
            quad(-1.0, 1.0),
            quad(-1.0, -1.0),
            quad(1.0, -1.0),
            quad(-1.0, 1.0),
            quad(1.0, -1.0),
            quad(1.0, 1.0),
        ]);
        Self { vertices }
    }

    /// Records the overlay draw; pipeline and tint uniform are already set.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertices.slice(..));
        pass.draw(0..6, 0..1);
    }
}

//! One GPU-resident image at one resolution, split into texture-size-bounded
//! tiles.
//!
//! The grid anchors full tiles to the bottom edge: when the image height is
//! not a multiple of the tile size, the leftover is pushed into the top row.
//! Bottom-anchored tiling keeps the seams stable when overlapping draw
//! regions are composited, so only the top row may be partial.

use image::{RgbaImage, imageops};
use tracing::warn;

use crate::mathutil::sample_size;
use crate::region::{PixelRect, RegionSource};
use crate::render::context::{GraphicsContext, Vertex};

/// One tile's position in the grid and its pixel rect within the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub col: u32,
    /// Row 0 is the top row (the only row that may be partial).
    pub row: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Tile layout for a `width` x `height` image with square tiles of
/// `tile_size`, bottom rows anchored to full tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub columns: u32,
    pub rows: u32,
    pub leftover_height: u32,
}

impl TileGrid {
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        debug_assert!(width > 0 && height > 0 && tile_size > 0);
        Self {
            width,
            height,
            tile_size,
            columns: width.div_ceil(tile_size),
            rows: height.div_ceil(tile_size),
            leftover_height: height % tile_size,
        }
    }

    pub const fn tile_count(&self) -> usize {
        (self.columns * self.rows) as usize
    }

    pub fn rect(&self, col: u32, row: u32) -> TileRect {
        debug_assert!(col < self.columns && row < self.rows);
        let x = col * self.tile_size;
        let width = ((col + 1) * self.tile_size).min(self.width) - x;
        let (y, height) = if self.leftover_height == 0 {
            (row * self.tile_size, self.tile_size)
        } else if row == 0 {
            (0, self.leftover_height)
        } else {
            (
                self.leftover_height + (row - 1) * self.tile_size,
                self.tile_size,
            )
        };
        TileRect {
            col,
            row,
            x,
            y,
            width,
            height,
        }
    }

    /// Tile rects in row-major order, top row first.
    pub fn rects(&self) -> impl Iterator<Item = TileRect> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.columns).map(move |col| self.rect(col, row)))
    }
}

/// Vertices for one tile quad, in the picture's [-1, 1] space (two CCW
/// triangles: TL BL BR, TL BR TR).
pub fn tile_vertices(rect: &TileRect, image_width: u32, image_height: u32) -> [Vertex; 6] {
    let w = image_width as f32;
    let h = image_height as f32;
    let left = -1.0 + 2.0 * rect.x as f32 / w;
    let right = -1.0 + 2.0 * (rect.x + rect.width) as f32 / w;
    let top = 1.0 - 2.0 * rect.y as f32 / h;
    let bottom = 1.0 - 2.0 * (rect.y + rect.height) as f32 / h;
    let tl = Vertex {
        pos: [left, top],
        uv: [0.0, 0.0],
    };
    let bl = Vertex {
        pos: [left, bottom],
        uv: [0.0, 1.0],
    };
    let br = Vertex {
        pos: [right, bottom],
        uv: [1.0, 1.0],
    };
    let tr = Vertex {
        pos: [right, top],
        uv: [1.0, 0.0],
    };
    [tl, bl, br, tl, br, tr]
}

struct Tile {
    bind_group: wgpu::BindGroup,
    vertices: wgpu::Buffer,
}

/// A fully GPU-resident image. Tiles whose pixels could not be produced are
/// left unset and skipped at draw time.
pub struct TiledPicture {
    grid: Option<TileGrid>,
    tiles: Vec<Option<Tile>>,
}

impl TiledPicture {
    /// Builds the picture by reading tile regions out of `source`,
    /// downsampled so the image height does not exceed `target_height`.
    pub fn from_region_source(
        ctx: &GraphicsContext,
        source: &RegionSource,
        target_height: u32,
    ) -> Self {
        let (width, height) = (source.width(), source.height());
        if width == 0 || height == 0 || target_height == 0 {
            return Self::empty();
        }
        let sample = sample_size(height, target_height);
        let down_w = width.div_ceil(sample);
        let down_h = height.div_ceil(sample);
        let grid = TileGrid::new(down_w, down_h, ctx.tile_size);

        let mut tiles = Vec::with_capacity(grid.tile_count());
        for rect in grid.rects() {
            let source_rect = PixelRect::new(
                rect.x * sample,
                rect.y * sample,
                ((rect.x + rect.width) * sample).min(width),
                ((rect.y + rect.height) * sample).min(height),
            );
            match source.decode_region(source_rect, sample) {
                Some(pixels) => tiles.push(Some(Tile {
                    bind_group: ctx.upload_tile(&pixels),
                    vertices: ctx.quad_buffer(&tile_vertices(&rect, down_w, down_h)),
                })),
                None => {
                    warn!(
                        col = rect.col,
                        row = rect.row,
                        "tile region decode failed; leaving a gap"
                    );
                    tiles.push(None);
                }
            }
        }
        Self {
            grid: Some(grid),
            tiles,
        }
    }

    /// Builds the picture from an in-memory bitmap (the blurred keyframes).
    pub fn from_bitmap(ctx: &GraphicsContext, bitmap: &RgbaImage) -> Self {
        let (width, height) = bitmap.dimensions();
        if width == 0 || height == 0 {
            return Self::empty();
        }
        let grid = TileGrid::new(width, height, ctx.tile_size);
        let mut tiles = Vec::with_capacity(grid.tile_count());
        for rect in grid.rects() {
            let sub = imageops::crop_imm(bitmap, rect.x, rect.y, rect.width, rect.height)
                .to_image();
            tiles.push(Some(Tile {
                bind_group: ctx.upload_tile(&sub),
                vertices: ctx.quad_buffer(&tile_vertices(&rect, width, height)),
            }));
        }
        Self {
            grid: Some(grid),
            tiles,
        }
    }

    pub const fn empty() -> Self {
        Self {
            grid: None,
            tiles: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.grid.map_or(0, |g| g.width)
    }

    pub fn height(&self) -> u32 {
        self.grid.map_or(0, |g| g.height)
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_none() || self.tiles.iter().all(Option::is_none)
    }

    /// Records draw calls for every present tile. The caller has already set
    /// the pipeline and the per-draw uniform bind group.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        for tile in self.tiles.iter().flatten() {
            pass.set_bind_group(1, &tile.bind_group, &[]);
            pass.set_vertex_buffer(0, tile.vertices.slice(..));
            pass.draw(0..6, 0..1);
        }
    }
}

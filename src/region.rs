//! Rotation-corrected region decoding over a large encoded artwork.
//!
//! A [`RegionSource`] decodes the artwork once on the background worker and
//! then serves subsampled regions of it in *logical* (post-rotation)
//! coordinates. Region requests are remapped into the stored pre-rotation
//! pixel grid, sampled, and rotated back before being returned, so callers
//! never see the storage orientation.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::{RgbaImage, imageops};

use crate::error::Error;
use crate::mathutil::sample_size;

/// Storage-to-display rotation in 90° steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub const fn degrees(self) -> u32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Whether width and height trade places under this rotation.
    pub const fn swaps_axes(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }

    /// Maps the EXIF orientation tag onto a pure rotation. Mirrored
    /// orientations (2, 4, 5, 7) fall back to the nearest rotation.
    pub const fn from_exif_orientation(orientation: u16) -> Self {
        match orientation {
            3 | 4 => Self::Deg180,
            5 | 6 => Self::Deg90,
            7 | 8 => Self::Deg270,
            _ => Self::Deg0,
        }
    }
}

/// Half-open pixel rectangle: `[left, right) x [top, bottom)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl PixelRect {
    pub const fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub const fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub const fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Remaps a logical (post-rotation) rect into the pre-rotation pixel grid of
/// an `original_width` x `original_height` image.
fn map_to_source(rect: PixelRect, rotation: Rotation, ow: u32, oh: u32) -> PixelRect {
    match rotation {
        Rotation::Deg0 => rect,
        Rotation::Deg90 => PixelRect::new(rect.top, oh - rect.right, rect.bottom, oh - rect.left),
        Rotation::Deg180 => PixelRect::new(
            ow - rect.right,
            oh - rect.bottom,
            ow - rect.left,
            oh - rect.top,
        ),
        Rotation::Deg270 => PixelRect::new(ow - rect.bottom, rect.left, ow - rect.top, rect.right),
    }
}

/// One decoded artwork, serving rotation-corrected subsampled regions.
///
/// All pixel access is serialized through an internal lock so a background
/// worker can read regions while the render thread queries dimensions.
pub struct RegionSource {
    path: PathBuf,
    rotation: Rotation,
    original_width: u32,
    original_height: u32,
    pixels: Mutex<Option<RgbaImage>>,
}

impl fmt::Debug for RegionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionSource")
            .field("path", &self.path)
            .field("rotation", &self.rotation)
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

impl RegionSource {
    /// Decodes the artwork at `path`. `rotation` is the storage-to-display
    /// rotation (usually derived from EXIF orientation).
    pub fn open(path: &Path, rotation: Rotation) -> Result<Self, Error> {
        let decoded = image::ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .map_err(|source| Error::Decode {
                path: path.to_path_buf(),
                source,
            })?;
        let pixels = decoded.to_rgba8();
        let (original_width, original_height) = pixels.dimensions();
        if original_width == 0 || original_height == 0 {
            return Err(Error::EmptyImage(path.to_path_buf()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            rotation,
            original_width,
            original_height,
            pixels: Mutex::new(Some(pixels)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Post-rotation width.
    pub const fn width(&self) -> u32 {
        if self.rotation.swaps_axes() {
            self.original_height
        } else {
            self.original_width
        }
    }

    /// Post-rotation height.
    pub const fn height(&self) -> u32 {
        if self.rotation.swaps_axes() {
            self.original_width
        } else {
            self.original_height
        }
    }

    /// Decodes `rect` (logical coordinates) at the given power-of-two
    /// subsampling factor. Returns `None` after [`destroy`](Self::destroy)
    /// or for a degenerate rect.
    pub fn decode_region(&self, rect: PixelRect, sample: u32) -> Option<RgbaImage> {
        let sample = sample.max(1);
        let rect = self.clamp_to_bounds(rect)?;
        let guard = self.pixels.lock().expect("region source lock poisoned");
        let pixels = guard.as_ref()?;

        let source_rect = map_to_source(
            rect,
            self.rotation,
            self.original_width,
            self.original_height,
        );
        let sampled = subsample(pixels, source_rect, sample);
        drop(guard);

        Some(match self.rotation {
            Rotation::Deg0 => sampled,
            Rotation::Deg90 => imageops::rotate90(&sampled),
            Rotation::Deg180 => imageops::rotate180(&sampled),
            Rotation::Deg270 => imageops::rotate270(&sampled),
        })
    }

    /// Decodes the whole artwork subsampled so neither dimension greatly
    /// exceeds the target size.
    pub fn decode_scaled(&self, target_width: u32, target_height: u32) -> Option<RgbaImage> {
        let sample = sample_size(self.width(), target_width)
            .max(sample_size(self.height(), target_height));
        self.decode_region(
            PixelRect::new(0, 0, self.width(), self.height()),
            sample,
        )
    }

    /// Releases the decoded pixels. Idempotent; subsequent region requests
    /// return `None`.
    pub fn destroy(&self) {
        self.pixels
            .lock()
            .expect("region source lock poisoned")
            .take();
    }

    fn clamp_to_bounds(&self, rect: PixelRect) -> Option<PixelRect> {
        let clamped = PixelRect::new(
            rect.left.min(self.width()),
            rect.top.min(self.height()),
            rect.right.min(self.width()),
            rect.bottom.min(self.height()),
        );
        (!clamped.is_empty()).then_some(clamped)
    }
}

/// Takes every `sample`-th pixel of `rect` out of `pixels`. Output
/// dimensions are the rect's, divided by `sample` and rounded up.
fn subsample(pixels: &RgbaImage, rect: PixelRect, sample: u32) -> RgbaImage {
    let out_w = rect.width().div_ceil(sample);
    let out_h = rect.height().div_ceil(sample);
    let mut out = RgbaImage::new(out_w, out_h);
    for y in 0..out_h {
        let src_y = rect.top + y * sample;
        for x in 0..out_w {
            let src_x = rect.left + x * sample;
            out.put_pixel(x, y, *pixels.get_pixel(src_x, src_y));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exif_orientation_maps_to_rotation() {
        assert_eq!(Rotation::from_exif_orientation(1), Rotation::Deg0);
        assert_eq!(Rotation::from_exif_orientation(3), Rotation::Deg180);
        assert_eq!(Rotation::from_exif_orientation(6), Rotation::Deg90);
        assert_eq!(Rotation::from_exif_orientation(8), Rotation::Deg270);
        assert_eq!(Rotation::from_exif_orientation(42), Rotation::Deg0);
    }

    #[test]
    fn full_rect_maps_to_full_source() {
        // 6x4 source; the logical full rect must cover the whole source
        // under every rotation.
        let (ow, oh) = (6, 4);
        for rotation in [
            Rotation::Deg0,
            Rotation::Deg90,
            Rotation::Deg180,
            Rotation::Deg270,
        ] {
            let (lw, lh) = if rotation.swaps_axes() {
                (oh, ow)
            } else {
                (ow, oh)
            };
            let mapped = map_to_source(PixelRect::new(0, 0, lw, lh), rotation, ow, oh);
            assert_eq!(mapped, PixelRect::new(0, 0, ow, oh), "rotation {rotation:?}");
        }
    }

    #[test]
    fn quarter_turn_maps_corner_regions() {
        // Logical top-left corner of a 90°-rotated image comes from the
        // source's bottom-left corner.
        let mapped = map_to_source(PixelRect::new(0, 0, 1, 1), Rotation::Deg90, 6, 4);
        assert_eq!(mapped, PixelRect::new(0, 3, 1, 4));

        let mapped = map_to_source(PixelRect::new(0, 0, 1, 1), Rotation::Deg270, 6, 4);
        assert_eq!(mapped, PixelRect::new(5, 0, 6, 1));

        let mapped = map_to_source(PixelRect::new(0, 0, 1, 1), Rotation::Deg180, 6, 4);
        assert_eq!(mapped, PixelRect::new(5, 3, 6, 4));
    }

    #[test]
    fn subsample_takes_strided_pixels() {
        let mut img = RgbaImage::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                img.put_pixel(x, y, image::Rgba([(y * 4 + x) as u8, 0, 0, 255]));
            }
        }
        let out = subsample(&img, PixelRect::new(0, 0, 4, 4), 2);
        assert_eq!(out.dimensions(), (2, 2));
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(1, 0).0[0], 2);
        assert_eq!(out.get_pixel(0, 1).0[0], 8);
        assert_eq!(out.get_pixel(1, 1).0[0], 10);
    }

    #[test]
    fn odd_sized_subsample_rounds_up() {
        let img = RgbaImage::new(5, 3);
        let out = subsample(&img, PixelRect::new(0, 0, 5, 3), 2);
        assert_eq!(out.dimensions(), (3, 2));
    }
}

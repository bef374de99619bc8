use base64::Engine;
use image::{Rgba, RgbaImage, imageops};

use mural::region::{PixelRect, RegionSource, Rotation};
use mural::tasks::source::read_rotation;

/// A small image with a unique color per pixel so rotations are
/// distinguishable.
fn labeled_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([x as u8, y as u8, (x * 31 + y * 7) as u8, 255])
    })
}

fn write_png(img: &RgbaImage, dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    img.save(&path).unwrap();
    path
}

#[test]
fn dimensions_swap_under_quarter_turns() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(&labeled_image(6, 4), &dir, "art.png");

    let source = RegionSource::open(&path, Rotation::Deg0).unwrap();
    assert_eq!((source.width(), source.height()), (6, 4));

    let source = RegionSource::open(&path, Rotation::Deg90).unwrap();
    assert_eq!((source.width(), source.height()), (4, 6));

    let source = RegionSource::open(&path, Rotation::Deg270).unwrap();
    assert_eq!((source.width(), source.height()), (4, 6));
}

#[test]
fn full_region_decode_equals_whole_image_rotation() {
    let dir = tempfile::tempdir().unwrap();
    let img = labeled_image(6, 4);
    let path = write_png(&img, &dir, "art.png");

    for (rotation, reference) in [
        (Rotation::Deg0, img.clone()),
        (Rotation::Deg90, imageops::rotate90(&img)),
        (Rotation::Deg180, imageops::rotate180(&img)),
        (Rotation::Deg270, imageops::rotate270(&img)),
    ] {
        let source = RegionSource::open(&path, rotation).unwrap();
        let full = PixelRect::new(0, 0, source.width(), source.height());
        let decoded = source.decode_region(full, 1).unwrap();
        assert_eq!(decoded, reference, "rotation {rotation:?}");
    }
}

#[test]
fn sub_region_matches_crop_of_rotated_image() {
    let dir = tempfile::tempdir().unwrap();
    let img = labeled_image(8, 6);
    let path = write_png(&img, &dir, "art.png");

    let source = RegionSource::open(&path, Rotation::Deg90).unwrap();
    // Logical space is 6x8 after the quarter turn.
    let decoded = source
        .decode_region(PixelRect::new(1, 2, 5, 7), 1)
        .unwrap();
    let rotated = imageops::rotate90(&img);
    let expected = imageops::crop_imm(&rotated, 1, 2, 4, 5).to_image();
    assert_eq!(decoded, expected);
}

#[test]
fn subsampled_region_has_ceil_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(&labeled_image(10, 7), &dir, "art.png");
    let source = RegionSource::open(&path, Rotation::Deg0).unwrap();
    let decoded = source
        .decode_region(PixelRect::new(0, 0, 10, 7), 2)
        .unwrap();
    assert_eq!(decoded.dimensions(), (5, 4));
}

#[test]
fn out_of_bounds_rect_is_clamped() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(&labeled_image(6, 4), &dir, "art.png");
    let source = RegionSource::open(&path, Rotation::Deg0).unwrap();
    let decoded = source
        .decode_region(PixelRect::new(4, 2, 100, 100), 1)
        .unwrap();
    assert_eq!(decoded.dimensions(), (2, 2));
    assert!(
        source
            .decode_region(PixelRect::new(50, 50, 60, 60), 1)
            .is_none()
    );
}

#[test]
fn destroy_is_idempotent_and_stops_decoding() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(&labeled_image(6, 4), &dir, "art.png");
    let source = RegionSource::open(&path, Rotation::Deg0).unwrap();
    source.destroy();
    source.destroy();
    // Dimension queries stay valid after teardown; decodes do not.
    assert_eq!(source.width(), 6);
    assert!(
        source
            .decode_region(PixelRect::new(0, 0, 6, 4), 1)
            .is_none()
    );
}

#[test]
fn decode_scaled_respects_the_target_box() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(&labeled_image(200, 100), &dir, "art.png");
    let source = RegionSource::open(&path, Rotation::Deg0).unwrap();
    let scaled = source.decode_scaled(64, 64).unwrap();
    assert!(scaled.width() <= 64);
    assert!(scaled.height() <= 64);
    // Aspect is preserved within sampling granularity.
    assert!(scaled.width() >= scaled.height());
}

#[test]
fn unreadable_artwork_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.png");
    std::fs::write(&path, b"not an image at all").unwrap();
    assert!(RegionSource::open(&path, Rotation::Deg0).is_err());
}

// JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded.
const ORIENT6_JPEG: &str = concat!(
    "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
    "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
);

#[test]
fn exif_orientation_six_reads_as_quarter_turn() {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(ORIENT6_JPEG)
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orient6.jpg");
    std::fs::write(&path, &bytes).unwrap();
    assert_eq!(read_rotation(&path), Rotation::Deg90);

    // Opened with that rotation, the 2x1 JPEG presents as 1x2.
    let source = RegionSource::open(&path, read_rotation(&path)).unwrap();
    assert_eq!((source.width(), source.height()), (1, 2));
}

//! Synthetic raster generators.
//!
//! Tiles carry their source row in the red channel so a test can tell
//! which source row ended up in which destination row.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

/// Creates a tile where every pixel of row `y` is `[y % 256, 0, 0, 255]`.
///
/// # Example
///
/// ```
/// use test_utils::create_row_striped_tile;
///
/// let tile = create_row_striped_tile(4, 300);
/// assert_eq!(tile.get_pixel(3, 2).0, [2, 0, 0, 255]);
/// assert_eq!(tile.get_pixel(0, 257).0, [1, 0, 0, 255]);
/// ```
pub fn create_row_striped_tile(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |_, y| Rgba([(y % 256) as u8, 0, 0, 255]))
}

/// Creates a tile filled with one opaque color.
pub fn create_solid_tile(width: u32, height: u32, color: [u8; 3]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([color[0], color[1], color[2], 255]))
}

/// Encode an image as PNG bytes, the way a map service would send it.
pub fn encode_png(image: &RgbaImage) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image.clone())
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("PNG encoding of an in-memory image failed");
    bytes.into_inner()
}

/// Counts rows whose pixels are all fully transparent within `x..x+width`.
pub fn count_transparent_rows(image: &RgbaImage, x: u32, width: u32) -> usize {
    (0..image.height())
        .filter(|&y| (x..x + width).all(|px| image.get_pixel(px, y).0[3] == 0))
        .count()
}

//! Image decoding for tiles and legends.

use image::RgbaImage;

use wms_common::{ServiceError, ServiceResult};

/// Turns response bytes into pixels.
pub trait ImageCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> ServiceResult<RgbaImage>;
}

/// Decodes whatever the `image` crate recognizes (PNG in practice) to RGBA8.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

impl ImageCodec for PngCodec {
    fn decode(&self, bytes: &[u8]) -> ServiceResult<RgbaImage> {
        image::load_from_memory(bytes)
            .map(|img| img.to_rgba8())
            .map_err(|e| ServiceError::Image(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{create_solid_tile, encode_png};

    #[test]
    fn test_decode_png() {
        let tile = create_solid_tile(3, 2, [1, 2, 3]);
        let decoded = PngCodec.decode(&encode_png(&tile)).unwrap();
        assert_eq!(decoded, tile);
    }

    #[test]
    fn test_decode_garbage() {
        let err = PngCodec.decode(b"<ServiceException/>").unwrap_err();
        assert_eq!(err.kind(), "image");
    }
}

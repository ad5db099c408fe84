//! Shared decode path for the built-in handlers

use bytes::Bytes;
use image::error::LimitErrorKind;
use image::{DynamicImage, ImageError, ImageReader, Limits};
use std::io::Cursor;
use tracing::debug;

use super::traits::HandlerError;
use crate::request::PixelFormat;

/// Decode budget and defaults, taken from the `[decode]` config section
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// Upper bound on bytes the decoder may allocate.
    pub max_alloc: Option<u64>,
    /// Pixel format applied when the request carries no hint.
    pub default_format: Option<PixelFormat>,
}

#[derive(Debug)]
pub struct Decoded {
    pub image: DynamicImage,
    pub exif_rotation: u32,
}

/// Decode `bytes`, converting to the requested pixel format.
pub fn decode(
    bytes: &[u8],
    format: Option<PixelFormat>,
    options: &DecodeOptions,
) -> Result<Decoded, HandlerError> {
    let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;

    let mut limits = Limits::default();
    limits.max_alloc = options.max_alloc;
    reader.limits(limits);

    let image = reader.decode().map_err(map_image_error)?;
    let image = match format.or(options.default_format) {
        Some(format) => convert(image, format),
        None => image,
    };
    let exif_rotation = exif_rotation(bytes);

    debug!(
        width = image.width(),
        height = image.height(),
        exif_rotation,
        "Decoded image"
    );

    Ok(Decoded {
        image,
        exif_rotation,
    })
}

/// [`decode`] on the blocking pool, keeping codec work off the async workers.
pub async fn decode_blocking(
    bytes: Bytes,
    format: Option<PixelFormat>,
    options: DecodeOptions,
) -> Result<Decoded, HandlerError> {
    tokio::task::spawn_blocking(move || decode(&bytes, format, &options))
        .await
        .map_err(|e| HandlerError::Other(format!("decode task failed: {e}")))?
}

fn convert(image: DynamicImage, format: PixelFormat) -> DynamicImage {
    match format {
        PixelFormat::Rgba8 => DynamicImage::ImageRgba8(image.into_rgba8()),
        PixelFormat::Rgb8 => DynamicImage::ImageRgb8(image.into_rgb8()),
        PixelFormat::Luma8 => DynamicImage::ImageLuma8(image.into_luma8()),
        PixelFormat::LumaA8 => DynamicImage::ImageLumaA8(image.into_luma_alpha8()),
    }
}

fn map_image_error(err: ImageError) -> HandlerError {
    match err {
        ImageError::Limits(limit) if matches!(limit.kind(), LimitErrorKind::InsufficientMemory) => {
            HandlerError::OutOfMemory(limit.to_string())
        }
        ImageError::IoError(io) => HandlerError::Io(io),
        other => HandlerError::Decode(other.to_string()),
    }
}

/// Rotation in degrees declared by the EXIF orientation tag, `0` if none.
///
/// Mirrored orientations are not corrected.
pub fn exif_rotation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let Ok(exif) = exif::Reader::new().read_from_container(&mut cursor) else {
        return 0;
    };

    match exif
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
    {
        Some(3) => 180,
        Some(6) => 90,
        Some(8) => 270,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::png_bytes;

    #[test]
    fn test_decode_png() {
        let decoded = decode(&png_bytes(6, 4), None, &DecodeOptions::default()).unwrap();
        assert_eq!((decoded.image.width(), decoded.image.height()), (6, 4));
        assert_eq!(decoded.exif_rotation, 0);
    }

    #[test]
    fn test_decode_applies_pixel_format() {
        let options = DecodeOptions {
            max_alloc: None,
            default_format: Some(PixelFormat::Rgb8),
        };
        let decoded = decode(&png_bytes(2, 2), None, &options).unwrap();
        assert!(matches!(decoded.image, DynamicImage::ImageRgb8(_)));

        let decoded = decode(&png_bytes(2, 2), Some(PixelFormat::Luma8), &options).unwrap();
        assert!(matches!(decoded.image, DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn test_decode_garbage_is_plain_failure() {
        let err = decode(b"definitely not an image", None, &DecodeOptions::default())
            .unwrap_err();
        assert!(matches!(err, HandlerError::Decode(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_decode_over_budget_is_resource_exhaustion() {
        let options = DecodeOptions {
            max_alloc: Some(1024),
            default_format: None,
        };
        let err = decode(&png_bytes(64, 64), None, &options).unwrap_err();
        assert!(err.is_resource_exhaustion(), "unexpected error: {err}");
    }

    #[test]
    fn test_exif_rotation_absent() {
        assert_eq!(exif_rotation(&png_bytes(1, 1)), 0);
        assert_eq!(exif_rotation(b""), 0);
    }
}

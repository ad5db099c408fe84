//! Shared decoded image handle

use image::DynamicImage;
use std::sync::Arc;

/// Decoded image shared between the engine, caches and consumers.
///
/// Identity matters: when no transform is needed the engine hands back the
/// very same `Arc` it was given, so callers compare with [`Arc::ptr_eq`]
/// before disposing of a source.
pub type SharedImage = Arc<DynamicImage>;

/// Number of bytes held by the pixel buffer.
pub fn byte_size(image: &DynamicImage) -> u64 {
    image.as_bytes().len() as u64
}

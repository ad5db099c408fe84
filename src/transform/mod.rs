//! Transform engine: request geometry plus custom transformations
//!
//! [`transform_result`] applies the orientation correction, the requested
//! resize mode and the requested rotation in one resampling pass. When the
//! plan turns out to be a no-op the very same [`SharedImage`] is returned.
//! [`apply_custom_transformations`] then runs the request's custom steps in
//! insertion order.

mod matrix;
mod plan;
mod raster;

pub use matrix::{Matrix, MatrixOp};
pub use plan::{CropWindow, TransformPlan, plan_transform};

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::bitmap::SharedImage;
use crate::request::{Request, Transformation};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("out of memory allocating {width}x{height} image")]
    OutOfMemory { width: u32, height: u32 },

    #[error("transformation '{key}' returned no image")]
    NullResult { key: String },

    #[error("transform matrix is not invertible")]
    Degenerate,
}

impl TransformError {
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, TransformError::OutOfMemory { .. })
    }
}

pub type Result<T> = std::result::Result<T, TransformError>;

/// Limits applied while rendering, taken from the `[decode]` config section
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformOptions {
    /// Upper bound on the bytes of one rendered output buffer.
    pub max_alloc: Option<u64>,
}

/// Apply the built-in geometry of `request` to `source`.
///
/// Returns `source` itself when nothing changes; callers must not treat the
/// result as a separate image in that case.
pub fn transform_result(
    source: SharedImage,
    request: &Request,
    exif_rotation: u32,
    options: &TransformOptions,
) -> Result<SharedImage> {
    let plan = plan_transform(source.width(), source.height(), request, exif_rotation);
    if plan.is_identity() {
        return Ok(source);
    }

    let rendered = raster::render(&source, &plan, options.max_alloc)?;
    debug!(
        from_width = source.width(),
        from_height = source.height(),
        width = rendered.width(),
        height = rendered.height(),
        "Applied geometry"
    );
    Ok(Arc::new(rendered))
}

/// Run each transformation on the output of the previous one.
pub fn apply_custom_transformations(
    mut image: SharedImage,
    transformations: &[Arc<dyn Transformation>],
) -> Result<SharedImage> {
    for transformation in transformations {
        image = transformation
            .transform(image)
            .ok_or_else(|| TransformError::NullResult {
                key: transformation.key(),
            })?;
    }
    Ok(image)
}

/// Geometry first, then custom transformations when the request has any.
pub fn apply(
    source: SharedImage,
    request: &Request,
    exif_rotation: u32,
    options: &TransformOptions,
) -> Result<SharedImage> {
    let image = transform_result(source, request, exif_rotation, options)?;
    match request.transformations() {
        Some(transformations) => apply_custom_transformations(image, transformations),
        None => Ok(image),
    }
}

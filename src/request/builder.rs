use std::num::NonZeroU32;
use std::sync::Arc;
use url::Url;

use super::error::{RequestError, Result};
use super::{ImageSource, PixelFormat, Request, Resize, ScaleMode, Transformation};
use crate::cache::ImageCache;
use crate::handlers::RequestHandler;

/// Builder for [`Request`].
///
/// Mutators that can be misused return `Result` and fail at the call that
/// breaks a rule; `build` checks the remaining cross-field rules.
#[derive(Clone)]
pub struct RequestBuilder {
    source: ImageSource,
    resize: Option<Resize>,
    scale_mode: Option<ScaleMode>,
    rotation_degrees: f32,
    rotation_pivot: Option<(f32, f32)>,
    transformations: Option<Vec<Arc<dyn Transformation>>>,
    pixel_format: Option<PixelFormat>,
    handler: Option<Arc<dyn RequestHandler>>,
    memory_cache: Option<Arc<dyn ImageCache>>,
    disk_cache: Option<Arc<dyn ImageCache>>,
}

impl RequestBuilder {
    fn with_source(source: ImageSource) -> Self {
        Self {
            source,
            resize: None,
            scale_mode: None,
            rotation_degrees: 0.0,
            rotation_pivot: None,
            transformations: None,
            pixel_format: None,
            handler: None,
            memory_cache: None,
            disk_cache: None,
        }
    }

    /// Start building a request for the given URI.
    pub fn from_uri(uri: Url) -> Self {
        Self::with_source(ImageSource::Uri(uri))
    }

    /// Start building a request from a URI string.
    pub fn parse_uri(uri: &str) -> Result<Self> {
        Ok(Self::from_uri(parse(uri)?))
    }

    /// Start building a request for a numeric resource id.
    pub fn from_resource(resource_id: u32) -> Result<Self> {
        Ok(Self::with_source(ImageSource::Resource(non_zero(resource_id)?)))
    }

    pub(super) fn from_request(request: &Request) -> Self {
        Self {
            source: request.source.clone(),
            resize: request.resize,
            scale_mode: request.scale_mode,
            rotation_degrees: request.rotation_degrees,
            rotation_pivot: request.rotation_pivot,
            // Fresh Vec so the derived request never shares the original's list
            transformations: request.transformations.as_ref().map(|t| t.to_vec()),
            pixel_format: request.pixel_format,
            handler: request.handler.clone(),
            memory_cache: request.memory_cache.clone(),
            disk_cache: request.disk_cache.clone(),
        }
    }

    pub fn has_size(&self) -> bool {
        self.resize.is_some()
    }

    /// Set the target URI, clearing any resource id.
    pub fn set_uri(mut self, uri: Url) -> Self {
        self.source = ImageSource::Uri(uri);
        self
    }

    /// Set the target resource id, clearing any URI.
    pub fn set_resource_id(mut self, resource_id: u32) -> Result<Self> {
        self.source = ImageSource::Resource(non_zero(resource_id)?);
        Ok(self)
    }

    /// Resize the image to the specified size in pixels.
    pub fn resize(self, width: u32, height: u32) -> Result<Self> {
        self.resize_with(width, height, false)
    }

    /// Resize only when the source exceeds the target in either dimension.
    pub fn resize_only_if_bigger(self, width: u32, height: u32) -> Result<Self> {
        self.resize_with(width, height, true)
    }

    fn resize_with(mut self, width: u32, height: u32, only_if_bigger: bool) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RequestError::InvalidSize { width, height });
        }
        self.resize = Some(Resize {
            width,
            height,
            only_if_bigger,
        });
        Ok(self)
    }

    /// Clear the resize along with center crop or center inside.
    ///
    /// Resize-by-max-side stays set, so `build` reports it as missing a size.
    pub fn clear_resize(mut self) -> Self {
        self.resize = None;
        if matches!(
            self.scale_mode,
            Some(ScaleMode::CenterCrop | ScaleMode::CenterInside)
        ) {
            self.scale_mode = None;
        }
        self
    }

    /// Scale so the longer source side matches the matching target side.
    pub fn resize_by_max_side(self) -> Result<Self> {
        self.enable(ScaleMode::ResizeByMaxSide)
    }

    pub fn clear_resize_by_max_side(self) -> Self {
        self.disable(ScaleMode::ResizeByMaxSide)
    }

    /// Fill the resize bounds and crop whatever overflows them.
    pub fn center_crop(self) -> Result<Self> {
        self.enable(ScaleMode::CenterCrop)
    }

    pub fn clear_center_crop(self) -> Self {
        self.disable(ScaleMode::CenterCrop)
    }

    /// Scale so both dimensions fit inside the resize bounds.
    pub fn center_inside(self) -> Result<Self> {
        self.enable(ScaleMode::CenterInside)
    }

    pub fn clear_center_inside(self) -> Self {
        self.disable(ScaleMode::CenterInside)
    }

    fn enable(mut self, mode: ScaleMode) -> Result<Self> {
        match self.scale_mode {
            Some(active) if active != mode => Err(RequestError::ConflictingScaleMode {
                requested: mode,
                active,
            }),
            _ => {
                self.scale_mode = Some(mode);
                Ok(self)
            }
        }
    }

    fn disable(mut self, mode: ScaleMode) -> Self {
        if self.scale_mode == Some(mode) {
            self.scale_mode = None;
        }
        self
    }

    /// Rotate the image by the specified degrees around the origin.
    pub fn rotate(mut self, degrees: f32) -> Self {
        self.rotation_degrees = degrees;
        self.rotation_pivot = None;
        self
    }

    /// Rotate the image by the specified degrees around a pivot point.
    pub fn rotate_about(mut self, degrees: f32, pivot_x: f32, pivot_y: f32) -> Self {
        self.rotation_degrees = degrees;
        self.rotation_pivot = Some((pivot_x, pivot_y));
        self
    }

    pub fn clear_rotation(mut self) -> Self {
        self.rotation_degrees = 0.0;
        self.rotation_pivot = None;
        self
    }

    /// Append a custom transformation, run after the built-in geometry.
    pub fn transform(mut self, transformation: Arc<dyn Transformation>) -> Self {
        self.transformations
            .get_or_insert_with(|| Vec::with_capacity(2))
            .push(transformation);
        self
    }

    pub fn pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = Some(format);
        self
    }

    /// Load with this handler instead of probing the registry.
    pub fn handler(mut self, handler: Arc<dyn RequestHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn memory_cache(mut self, cache: Arc<dyn ImageCache>) -> Self {
        self.memory_cache = Some(cache);
        self
    }

    pub fn disk_cache(mut self, cache: Arc<dyn ImageCache>) -> Self {
        self.disk_cache = Some(cache);
        self
    }

    /// Create the immutable [`Request`].
    pub fn build(self) -> Result<Request> {
        if let Some(mode) = self.scale_mode {
            if self.resize.is_none() {
                return Err(RequestError::MissingResize(mode));
            }
        }

        Ok(Request {
            source: self.source,
            resize: self.resize,
            scale_mode: self.scale_mode,
            rotation_degrees: self.rotation_degrees,
            rotation_pivot: self.rotation_pivot,
            transformations: self.transformations,
            pixel_format: self.pixel_format,
            handler: self.handler,
            memory_cache: self.memory_cache,
            disk_cache: self.disk_cache,
            id: 0,
            started: None,
        })
    }
}

fn non_zero(resource_id: u32) -> Result<NonZeroU32> {
    NonZeroU32::new(resource_id).ok_or(RequestError::ZeroResourceId)
}

fn parse(uri: &str) -> Result<Url> {
    let trimmed = uri.trim();
    if trimmed.is_empty() {
        return Err(RequestError::InvalidUri {
            uri: uri.to_string(),
            reason: "empty".to_string(),
        });
    }
    Url::parse(trimmed).map_err(|e| RequestError::InvalidUri {
        uri: uri.to_string(),
        reason: e.to_string(),
    })
}

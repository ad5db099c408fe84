//! Immutable image request descriptors
//!
//! A [`Request`] names one image (a URI or a numeric resource id) plus the
//! transform plan that should be applied to it. Requests are produced by
//! [`RequestBuilder`], which validates every mutation, and are never changed
//! afterwards; use [`Request::build_upon`] to derive a variant.
//!
//! Two requests that produce the same output share a fingerprint
//! ([`Request::key`]); the dispatcher coalesces them into a single hunter.

mod builder;
mod error;
mod key;
mod transformation;

pub use builder::RequestBuilder;
pub use error::{RequestError, Result};
pub use transformation::Transformation;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use url::Url;

use crate::cache::ImageCache;
use crate::handlers::RequestHandler;

/// Requests older than this are labelled in seconds rather than millis.
const TOO_LONG_LOG: Duration = Duration::from_secs(5);

/// Process-wide request id counter; the only global besides the hunter sequence.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// What to load. The two identities are mutually exclusive by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageSource {
    Uri(Url),
    Resource(NonZeroU32),
}

/// Geometry modes; at most one can be active on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScaleMode {
    CenterCrop,
    CenterInside,
    ResizeByMaxSide,
}

impl fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScaleMode::CenterCrop => "centerCrop",
            ScaleMode::CenterInside => "centerInside",
            ScaleMode::ResizeByMaxSide => "resizeByMaxSide",
        })
    }
}

/// Target size in pixels; both dimensions are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resize {
    pub width: u32,
    pub height: u32,
    pub only_if_bigger: bool,
}

/// Decode pixel format hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Rgba8,
    Rgb8,
    Luma8,
    LumaA8,
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PixelFormat::Rgba8 => "rgba8",
            PixelFormat::Rgb8 => "rgb8",
            PixelFormat::Luma8 => "luma8",
            PixelFormat::LumaA8 => "lumaa8",
        })
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rgba8" => Ok(PixelFormat::Rgba8),
            "rgb8" => Ok(PixelFormat::Rgb8),
            "luma8" => Ok(PixelFormat::Luma8),
            "lumaa8" => Ok(PixelFormat::LumaA8),
            other => Err(format!("unknown pixel format: {other}")),
        }
    }
}

/// Immutable data about an image and the transformations applied to it.
#[derive(Clone)]
pub struct Request {
    pub(crate) source: ImageSource,
    pub(crate) resize: Option<Resize>,
    pub(crate) scale_mode: Option<ScaleMode>,
    pub(crate) rotation_degrees: f32,
    pub(crate) rotation_pivot: Option<(f32, f32)>,
    /// `None` when no custom step was ever added, which is not the same as empty.
    pub(crate) transformations: Option<Vec<Arc<dyn Transformation>>>,
    pub(crate) pixel_format: Option<PixelFormat>,
    pub(crate) handler: Option<Arc<dyn RequestHandler>>,
    pub(crate) memory_cache: Option<Arc<dyn ImageCache>>,
    pub(crate) disk_cache: Option<Arc<dyn ImageCache>>,
    pub(crate) id: u64,
    pub(crate) started: Option<Instant>,
}

impl Request {
    pub fn builder_from_uri(uri: Url) -> RequestBuilder {
        RequestBuilder::from_uri(uri)
    }

    pub fn builder_from_resource(resource_id: u32) -> Result<RequestBuilder> {
        RequestBuilder::from_resource(resource_id)
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    pub fn uri(&self) -> Option<&Url> {
        match &self.source {
            ImageSource::Uri(uri) => Some(uri),
            ImageSource::Resource(_) => None,
        }
    }

    pub fn resource_id(&self) -> Option<u32> {
        match self.source {
            ImageSource::Resource(id) => Some(id.get()),
            ImageSource::Uri(_) => None,
        }
    }

    /// `0` when no resize was requested.
    pub fn target_width(&self) -> u32 {
        self.resize.map_or(0, |r| r.width)
    }

    /// `0` when no resize was requested.
    pub fn target_height(&self) -> u32 {
        self.resize.map_or(0, |r| r.height)
    }

    pub fn resize_only_if_bigger(&self) -> bool {
        self.resize.is_some_and(|r| r.only_if_bigger)
    }

    pub fn scale_mode(&self) -> Option<ScaleMode> {
        self.scale_mode
    }

    pub fn center_crop(&self) -> bool {
        self.scale_mode == Some(ScaleMode::CenterCrop)
    }

    pub fn center_inside(&self) -> bool {
        self.scale_mode == Some(ScaleMode::CenterInside)
    }

    pub fn resize_by_max_side(&self) -> bool {
        self.scale_mode == Some(ScaleMode::ResizeByMaxSide)
    }

    pub fn rotation_degrees(&self) -> f32 {
        self.rotation_degrees
    }

    pub fn rotation_pivot(&self) -> Option<(f32, f32)> {
        self.rotation_pivot
    }

    pub fn has_rotation_pivot(&self) -> bool {
        self.rotation_pivot.is_some()
    }

    /// Read-only view of the custom transformations, in insertion order.
    pub fn transformations(&self) -> Option<&[Arc<dyn Transformation>]> {
        self.transformations.as_deref()
    }

    pub fn pixel_format(&self) -> Option<PixelFormat> {
        self.pixel_format
    }

    pub fn handler_override(&self) -> Option<&Arc<dyn RequestHandler>> {
        self.handler.as_ref()
    }

    pub fn memory_cache(&self) -> Option<&Arc<dyn ImageCache>> {
        self.memory_cache.as_ref()
    }

    pub fn disk_cache(&self) -> Option<&Arc<dyn ImageCache>> {
        self.disk_cache.as_ref()
    }

    pub fn has_size(&self) -> bool {
        self.resize.is_some()
    }

    pub fn needs_matrix_transform(&self) -> bool {
        self.has_size() || self.rotation_degrees != 0.0
    }

    pub fn has_custom_transformations(&self) -> bool {
        self.transformations.is_some()
    }

    pub fn needs_transformation(&self) -> bool {
        self.needs_matrix_transform() || self.has_custom_transformations()
    }

    /// Fingerprint over every field that affects the produced image.
    pub fn key(&self) -> String {
        key::create_key(self)
    }

    pub fn build_upon(&self) -> RequestBuilder {
        RequestBuilder::from_request(self)
    }

    /// Short name for logs: the URI path or the resource id in hex.
    pub fn name(&self) -> String {
        match &self.source {
            ImageSource::Uri(uri) => uri.path().to_string(),
            ImageSource::Resource(id) => format!("{:x}", id.get()),
        }
    }

    /// Runtime id assigned on submission, `0` before that.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Assigns the runtime id and submission time. Owner-only.
    pub(crate) fn stamp(&mut self) {
        self.id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
        self.started = Some(Instant::now());
    }

    pub fn plain_id(&self) -> String {
        format!("[R{}]", self.id)
    }

    /// `[R<id>]+<age>` with the age in ms, or in seconds once it is long.
    pub fn log_id(&self) -> String {
        let age = self.started.map(|t| t.elapsed()).unwrap_or_default();
        format_log_id(&self.plain_id(), age)
    }
}

fn format_log_id(plain_id: &str, age: Duration) -> String {
    if age > TOO_LONG_LOG {
        format!("{plain_id}+{}s", age.as_secs())
    } else {
        format!("{plain_id}+{}ms", age.as_millis())
    }
}

impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Request {}

impl std::hash::Hash for Request {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Request{")?;
        match &self.source {
            ImageSource::Resource(id) => write!(f, "{id}")?,
            ImageSource::Uri(uri) => write!(f, "{uri}")?,
        }
        for transformation in self.transformations().unwrap_or_default() {
            write!(f, " {}", transformation.key())?;
        }
        if let Some(resize) = self.resize {
            write!(f, " resize({},{})", resize.width, resize.height)?;
        }
        if let Some(mode) = self.scale_mode {
            write!(f, " {mode}")?;
        }
        if self.rotation_degrees != 0.0 {
            write!(f, " rotation({}", self.rotation_degrees)?;
            if let Some((px, py)) = self.rotation_pivot {
                write!(f, " @ {px},{py}")?;
            }
            f.write_str(")")?;
        }
        if let Some(format) = self.pixel_format {
            write!(f, " {format}")?;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("key", &self.key())
            .field("has_handler_override", &self.handler.is_some())
            .finish()
    }
}

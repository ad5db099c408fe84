//! Request handlers: the pluggable fetch-and-decode strategies
//!
//! Each handler answers two questions about a [`Request`](crate::request::Request):
//! can it serve it, and what image does it decode to.
//!
//! ## Key Components
//!
//! - [`RequestHandler`] - Trait implemented by every strategy
//! - [`HandlerRegistry`] - Ordered set of handlers with first-match resolution
//! - [`TierPolicy`] - Picks the cheapest stored representation covering a target size
//! - Built-ins, in probe order: [`ResourceHandler`], [`GalleryHandler`],
//!   [`AssetHandler`], [`FileHandler`], [`NetworkHandler`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use snapfetch::handlers::HandlerRegistry;
//!
//! let registry = HandlerRegistry::with_builtins(&config, resources)?;
//! let handler = registry.resolve(&request).expect("unrecognized request");
//! let loaded = handler.load(&request).await?;
//! ```

mod asset;
mod decode;
mod file;
mod gallery;
mod network;
mod registry;
mod resource;
mod tier;
mod traits;
pub(crate) mod types;

pub use asset::AssetHandler;
pub use decode::{DecodeOptions, Decoded, decode, decode_blocking, exif_rotation};
pub use file::FileHandler;
pub use gallery::GalleryHandler;
pub use network::NetworkHandler;
pub use registry::{HandlerRegistry, RegistryError};
pub use resource::{ResourceHandler, ResourceTable};
pub use tier::{SizeTier, TierPolicy};
pub use traits::{HandlerError, RequestHandler};
pub use types::{LoadResult, LoadedFrom};

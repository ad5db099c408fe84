pub mod bitmap;
pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod handlers;
pub mod humanize;
pub mod hunter;
pub mod request;
pub mod stats;
pub mod transform;

#[cfg(test)]
pub(crate) mod test_support;

pub use bitmap::SharedImage;
pub use cache::{ImageCache, MemoryCache, NoCache};
pub use config::Config;
pub use engine::{Engine, EngineError, Ticket};
pub use handlers::{LoadResult, LoadedFrom, RequestHandler};
pub use hunter::{Delivery, HuntError, Priority};
pub use request::{Request, RequestBuilder, Transformation};
pub use stats::{Stats, StatsSnapshot};

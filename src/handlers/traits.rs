use async_trait::async_trait;
use thiserror::Error;

use super::types::LoadResult;
use crate::request::Request;

/// Handler failures, grouped by how the engine reacts to them
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Read failure; transient.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unsuccessful response; transient.
    #[error("bad response: {0}")]
    Response(String),

    /// Transport failure; transient.
    #[error("network error: {0}")]
    Network(String),

    /// Allocation failed while decoding; never retried.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("unsupported request: {0}")]
    Unsupported(String),

    #[error("handler failed: {0}")]
    Other(String),
}

impl HandlerError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HandlerError::Io(_) | HandlerError::Response(_) | HandlerError::Network(_)
        )
    }

    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, HandlerError::OutOfMemory(_))
    }
}

/// Fetch-and-decode strategy for one kind of image source
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Cheap, side-effect free check run during resolution.
    fn can_handle(&self, request: &Request) -> bool;

    /// Fetch and decode the image.
    async fn load(&self, request: &Request) -> Result<LoadResult, HandlerError>;

    /// Whether the dispatcher should re-run transient failures from this handler.
    fn retryable(&self) -> bool {
        false
    }
}

use async_trait::async_trait;
use std::path::PathBuf;

use super::decode::DecodeOptions;
use super::file::{load_path, resolve_below};
use super::traits::{HandlerError, RequestHandler};
use super::types::LoadResult;
use crate::request::Request;

const ASSET_SCHEME: &str = "asset";

/// Serves `asset:///<path>` URIs from the configured asset root
pub struct AssetHandler {
    root: PathBuf,
    options: DecodeOptions,
}

impl AssetHandler {
    pub fn new(root: impl Into<PathBuf>, options: DecodeOptions) -> Self {
        Self {
            root: root.into(),
            options,
        }
    }
}

#[async_trait]
impl RequestHandler for AssetHandler {
    fn name(&self) -> &'static str {
        "asset"
    }

    fn can_handle(&self, request: &Request) -> bool {
        request.uri().is_some_and(|uri| uri.scheme() == ASSET_SCHEME)
    }

    async fn load(&self, request: &Request) -> Result<LoadResult, HandlerError> {
        let uri = request
            .uri()
            .ok_or_else(|| HandlerError::Unsupported(request.to_string()))?;
        let path = resolve_below(&self.root, uri.path())?;
        load_path(&path, request, self.options).await
    }
}

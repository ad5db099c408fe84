use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use super::decode::DecodeOptions;
use super::file::{load_path, resolve_below};
use super::tier::{SizeTier, TierPolicy};
use super::traits::{HandlerError, RequestHandler};
use super::types::LoadResult;
use crate::request::Request;

const GALLERY_SCHEME: &str = "gallery";
const THUMBNAIL_DIR: &str = ".thumbnails";

/// Serves `gallery://<name>` URIs from a media store.
///
/// The store keeps precomputed thumbnails next to the originals:
///
/// ```text
/// <root>/<name>
/// <root>/.thumbnails/micro/<name>
/// <root>/.thumbnails/mini/<name>
/// ```
///
/// The cheapest tier covering the request's target size is read; a missing
/// thumbnail falls through to the next larger tier.
pub struct GalleryHandler {
    root: PathBuf,
    policy: TierPolicy,
    options: DecodeOptions,
}

impl GalleryHandler {
    pub fn new(root: impl Into<PathBuf>, policy: TierPolicy, options: DecodeOptions) -> Self {
        Self {
            root: root.into(),
            policy,
            options,
        }
    }

    fn tier_root(&self, tier: SizeTier) -> PathBuf {
        match tier {
            SizeTier::Full => self.root.clone(),
            SizeTier::Micro | SizeTier::Mini => {
                self.root.join(THUMBNAIL_DIR).join(tier.to_string())
            }
        }
    }

    fn media_name(request: &Request) -> Option<String> {
        let uri = request.uri()?;
        let host = uri.host_str().unwrap_or_default();
        Some(format!("{host}{}", uri.path()))
    }
}

#[async_trait]
impl RequestHandler for GalleryHandler {
    fn name(&self) -> &'static str {
        "gallery"
    }

    fn can_handle(&self, request: &Request) -> bool {
        request.uri().is_some_and(|uri| uri.scheme() == GALLERY_SCHEME)
    }

    async fn load(&self, request: &Request) -> Result<LoadResult, HandlerError> {
        let name = Self::media_name(request)
            .ok_or_else(|| HandlerError::Unsupported(request.to_string()))?;

        let mut tier = Some(self.policy.select_for(request));
        while let Some(current) = tier {
            let path = resolve_below(&self.tier_root(current), &name)?;
            match load_path(&path, request, self.options).await {
                Err(HandlerError::NotFound(_)) if current != SizeTier::Full => {
                    debug!(tier = %current, name = %name, "Representation missing, trying larger tier");
                    tier = current.next_larger();
                }
                result => {
                    debug!(tier = %current, name = %name, "Loaded gallery representation");
                    return result;
                }
            }
        }

        Err(HandlerError::NotFound(name))
    }
}

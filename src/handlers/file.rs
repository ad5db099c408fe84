use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use super::decode::{DecodeOptions, decode_blocking};
use super::traits::{HandlerError, RequestHandler};
use super::types::{LoadResult, LoadedFrom};
use crate::request::Request;

const FILE_SCHEME: &str = "file";

/// Join a URI path below `root`, refusing anything that would climb out of it.
pub(super) fn resolve_below(root: &Path, relative: &str) -> Result<PathBuf, HandlerError> {
    let relative = Path::new(relative.trim_start_matches('/'));
    let mut resolved = root.to_path_buf();
    let mut has_name = false;

    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                has_name = true;
            }
            Component::CurDir => {}
            _ => {
                return Err(HandlerError::Unsupported(format!(
                    "path escapes its root: {}",
                    relative.display()
                )));
            }
        }
    }

    if !has_name {
        return Err(HandlerError::Unsupported("empty path".to_string()));
    }
    Ok(resolved)
}

/// Read a whole file; a missing file is a permanent failure.
pub(super) async fn read_file(path: &Path) -> Result<Bytes, HandlerError> {
    match tokio::fs::read(path).await {
        Ok(contents) => Ok(Bytes::from(contents)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(HandlerError::NotFound(path.display().to_string()))
        }
        Err(e) => Err(HandlerError::Io(e)),
    }
}

pub(super) async fn load_path(
    path: &Path,
    request: &Request,
    options: DecodeOptions,
) -> Result<LoadResult, HandlerError> {
    let encoded = read_file(path).await?;
    let decoded = decode_blocking(encoded, request.pixel_format(), options).await?;
    Ok(LoadResult::new(Arc::new(decoded.image), LoadedFrom::Disk)
        .with_exif_rotation(decoded.exif_rotation))
}

/// Serves `file://` URIs from the local filesystem
pub struct FileHandler {
    options: DecodeOptions,
}

impl FileHandler {
    pub fn new(options: DecodeOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl RequestHandler for FileHandler {
    fn name(&self) -> &'static str {
        "file"
    }

    fn can_handle(&self, request: &Request) -> bool {
        request.uri().is_some_and(|uri| uri.scheme() == FILE_SCHEME)
    }

    async fn load(&self, request: &Request) -> Result<LoadResult, HandlerError> {
        let path = request
            .uri()
            .and_then(|uri| uri.to_file_path().ok())
            .ok_or_else(|| HandlerError::Unsupported(request.to_string()))?;
        load_path(&path, request, self.options).await
    }
}

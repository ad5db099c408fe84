use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::decode::{DecodeOptions, decode_blocking};
use super::traits::{HandlerError, RequestHandler};
use super::types::{LoadResult, LoadedFrom};
use crate::request::Request;

pub(crate) const RESOURCE_SCHEME: &str = "resource";

/// Encoded images compiled into or registered with the process, by numeric id
#[derive(Clone, Default)]
pub struct ResourceTable {
    entries: Arc<RwLock<HashMap<u32, Bytes>>>,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: u32, encoded: impl Into<Bytes>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, encoded.into());
    }

    pub fn get(&self, id: u32) -> Option<Bytes> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Serves numeric resource ids and `resource://<id>` URIs
pub struct ResourceHandler {
    table: ResourceTable,
    options: DecodeOptions,
}

impl ResourceHandler {
    pub fn new(table: ResourceTable, options: DecodeOptions) -> Self {
        Self { table, options }
    }

    fn resource_id(request: &Request) -> Option<u32> {
        if let Some(id) = request.resource_id() {
            return Some(id);
        }
        let uri = request.uri()?;
        if uri.scheme() != RESOURCE_SCHEME {
            return None;
        }
        uri.host_str()?.parse().ok()
    }
}

#[async_trait]
impl RequestHandler for ResourceHandler {
    fn name(&self) -> &'static str {
        "resource"
    }

    fn can_handle(&self, request: &Request) -> bool {
        Self::resource_id(request).is_some()
    }

    async fn load(&self, request: &Request) -> Result<LoadResult, HandlerError> {
        let id = Self::resource_id(request)
            .ok_or_else(|| HandlerError::Unsupported(request.to_string()))?;
        let encoded = self
            .table
            .get(id)
            .ok_or_else(|| HandlerError::NotFound(format!("resource {id}")))?;

        let decoded = decode_blocking(encoded, request.pixel_format(), self.options).await?;
        Ok(LoadResult::new(Arc::new(decoded.image), LoadedFrom::Disk)
            .with_exif_rotation(decoded.exif_rotation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestBuilder;
    use crate::test_support::png_bytes;

    fn handler() -> ResourceHandler {
        let table = ResourceTable::new();
        table.insert(7, png_bytes(3, 2));
        ResourceHandler::new(table, DecodeOptions::default())
    }

    #[test]
    fn test_can_handle() {
        let handler = handler();
        let by_id = RequestBuilder::from_resource(7).unwrap().build().unwrap();
        let by_uri = RequestBuilder::parse_uri("resource://7").unwrap().build().unwrap();
        let bad_uri = RequestBuilder::parse_uri("resource://icon").unwrap().build().unwrap();
        let other = RequestBuilder::parse_uri("file:///tmp/a.png").unwrap().build().unwrap();

        assert!(handler.can_handle(&by_id));
        assert!(handler.can_handle(&by_uri));
        assert!(!handler.can_handle(&bad_uri));
        assert!(!handler.can_handle(&other));
    }

    #[tokio::test]
    async fn test_load_registered_resource() {
        let request = RequestBuilder::from_resource(7).unwrap().build().unwrap();
        let loaded = handler().load(&request).await.unwrap();

        let image = loaded.image.unwrap();
        assert_eq!((image.width(), image.height()), (3, 2));
        assert_eq!(loaded.loaded_from, LoadedFrom::Disk);
    }

    #[tokio::test]
    async fn test_missing_resource_is_not_found() {
        let request = RequestBuilder::from_resource(8).unwrap().build().unwrap();
        let err = handler().load(&request).await.unwrap_err();
        assert!(matches!(err, HandlerError::NotFound(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_table_is_shared_between_clones() {
        let table = ResourceTable::new();
        let clone = table.clone();
        clone.insert(1, vec![1u8, 2, 3]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(1).unwrap().as_ref(), &[1, 2, 3]);
    }
}

use std::sync::Arc;
use thiserror::Error;

use super::asset::AssetHandler;
use super::file::FileHandler;
use super::gallery::GalleryHandler;
use super::network::NetworkHandler;
use super::resource::{ResourceHandler, ResourceTable};
use super::traits::{HandlerError, RequestHandler};
use crate::config::Config;
use crate::request::Request;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to build handler '{name}': {source}")]
    Build {
        name: &'static str,
        #[source]
        source: HandlerError,
    },
}

/// Ordered handler list with first-match resolution.
///
/// Built-ins come first, cheapest and most specific first with the network
/// handler last; custom handlers are probed after them in registration order.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn RequestHandler>>,
}

impl HandlerRegistry {
    /// Empty registry; resolution fails until something is registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in handlers, configured from `config`
    pub fn with_builtins(config: &Config, resources: ResourceTable) -> Result<Self, RegistryError> {
        let options = config.decode_options();
        let network = NetworkHandler::new(&config.network, options)
            .map_err(|source| RegistryError::Build {
                name: "network",
                source,
            })?;

        let mut registry = Self::new();
        registry.register(Arc::new(ResourceHandler::new(resources, options)));
        registry.register(Arc::new(GalleryHandler::new(
            &config.handlers.gallery_root,
            config.tier_policy(),
            options,
        )));
        registry.register(Arc::new(AssetHandler::new(
            &config.handlers.asset_root,
            options,
        )));
        registry.register(Arc::new(FileHandler::new(options)));
        registry.register(Arc::new(network));
        Ok(registry)
    }

    /// Append a handler; it is probed after every handler already present.
    pub fn register(&mut self, handler: Arc<dyn RequestHandler>) {
        self.handlers.push(handler);
    }

    /// The request's own handler override if set, otherwise the first
    /// handler whose probe accepts it.
    pub fn resolve(&self, request: &Request) -> Option<Arc<dyn RequestHandler>> {
        if let Some(handler) = request.handler_override() {
            return Some(handler.clone());
        }
        self.handlers
            .iter()
            .find(|handler| handler.can_handle(request))
            .cloned()
    }

    /// Handler names in probe order
    pub fn names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
